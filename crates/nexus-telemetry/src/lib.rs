//! # Nexus Telemetry
//!
//! Structured logging for NexusEngine processes.
//!
//! The engine crate only emits `tracing` events; this crate decides where
//! they go. Binaries call [`init_telemetry`] once at startup and hold the
//! returned guard.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nexus_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // Engine logs are now written to stdout
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NEXUS_SERVICE_NAME` | `nexus-engine` | Service name in the startup line |
//! | `NEXUS_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `NEXUS_JSON_LOGS` | `false` | One JSON object per line |
//! | `NEXUS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `NEXUS_THREAD_NAMES` | `true` | Include worker thread names |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{build_filter, init_tracing, TracingGuard};

#[doc(hidden)]
pub use tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for the process.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    init_tracing(&config)
}

/// Log an event tagged with the emitting component.
///
/// ```rust,ignore
/// log_event!(info, "runtime", "Engine started", workers = 8);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}
