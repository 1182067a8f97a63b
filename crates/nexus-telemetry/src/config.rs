//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for a NexusEngine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression such as `nexus_core=debug`)
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to emit one JSON object per line instead of plain text
    pub json_logs: bool,

    /// Whether to include worker thread names in each line
    pub thread_names: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "nexus-engine".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            thread_names: true,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NEXUS_SERVICE_NAME`: Service name (default: nexus-engine)
    /// - `NEXUS_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `NEXUS_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `NEXUS_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `NEXUS_THREAD_NAMES`: Include thread names (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("NEXUS_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("NEXUS_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: env::var("NEXUS_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            json_logs: env::var("NEXUS_JSON_LOGS")
                .map(|v| flag(&v))
                .unwrap_or(is_container),

            thread_names: env::var("NEXUS_THREAD_NAMES")
                .map(|v| flag(&v))
                .unwrap_or(defaults.thread_names),
        }
    }

    /// Same configuration under a different service name.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Self::from_env()
        }
    }
}
