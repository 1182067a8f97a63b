//! Runtime configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use nexus_core::{EngineConfig, EngineConfigBuilder, EngineError};

/// Environment parsing failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Settings for one run of the demo binary.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    /// Operations submitted by the mixed workload
    pub workload_ops: usize,
}

fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidNumber { var, value }),
        },
        Err(_) => Ok(None),
    }
}

impl RuntimeConfig {
    pub const DEFAULT_WORKLOAD_OPS: usize = 10_000;

    /// Load configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `ENGINE_THREADS`: Worker threads (default: available parallelism)
    /// - `ENGINE_QUEUE_CAPACITY`: Queue capacity (default: 100000)
    /// - `ENGINE_BATCH_SIZE`: Largest batch submission (default: 1024, or the
    ///   queue capacity when that is smaller)
    /// - `ENGINE_MAX_QUBITS`: Largest simulated register (default: 26)
    /// - `ENGINE_TIMEOUT_MS`: Per-task timeout (default: 5000)
    /// - `ENGINE_SHUTDOWN_TIMEOUT_MS`: Worker join timeout (default: 10000)
    /// - `NEXUS_WORKLOAD_OPS`: Operations in the demo workload (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();
        let mut builder = EngineConfigBuilder::new();

        let threads = parse_var("ENGINE_THREADS")?.unwrap_or(defaults.num_threads);
        builder = builder.num_threads(threads);
        let capacity = parse_var("ENGINE_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity);
        // An unset batch size follows a smaller queue down
        let batch = parse_var("ENGINE_BATCH_SIZE")?
            .unwrap_or_else(|| defaults.batch_size.min(capacity.max(1)));
        builder = builder.queue_capacity(capacity).batch_size(batch);
        if let Some(qubits) = parse_var("ENGINE_MAX_QUBITS")? {
            builder = builder.max_qubits(qubits);
        }
        if let Some(ms) = parse_var("ENGINE_TIMEOUT_MS")? {
            builder = builder.operation_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var("ENGINE_SHUTDOWN_TIMEOUT_MS")? {
            builder = builder.shutdown_timeout(Duration::from_millis(ms));
        }

        Ok(Self {
            engine: builder.build()?,
            workload_ops: parse_var("NEXUS_WORKLOAD_OPS")?.unwrap_or(Self::DEFAULT_WORKLOAD_OPS),
        })
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            workload_ops: Self::DEFAULT_WORKLOAD_OPS,
        }
    }
}
