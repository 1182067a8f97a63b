//! Engine configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use nexus_core::EngineConfigBuilder;
//!
//! let config = EngineConfigBuilder::new()
//!     .num_threads(8)
//!     .queue_capacity(10_000)
//!     .operation_timeout(Duration::from_millis(250))
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;
use crate::modules::quantum::MAX_QUBITS;

/// Fewest worker threads accepted.
pub const MIN_THREADS: usize = 1;
/// Most worker threads accepted.
pub const MAX_THREADS: usize = 256;

/// Default register cap: 2^26 amplitudes, 1 GiB of state vector.
pub const DEFAULT_MAX_QUBITS: u32 = 26;

/// Engine configuration, fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker threads used by `start` (1 to 256)
    pub num_threads: usize,
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// Largest accepted `submit_batch`
    pub batch_size: usize,
    /// Per-task deadline, measured from submission
    pub operation_timeout: Duration,
    /// How long `stop` waits for workers to exit
    pub shutdown_timeout: Duration,
    /// Latency samples retained for percentiles
    pub metrics_window: usize,
    /// Elements per pooled scratch buffer
    pub buffer_block_size: usize,
    /// Pooled scratch buffers per element type
    pub buffer_blocks: usize,
    /// Largest register a quantum task may allocate (at most 32)
    pub max_qubits: u32,
}

/// Available hardware parallelism, clamped to the accepted thread range.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(MIN_THREADS, MAX_THREADS)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: default_threads(),
            queue_capacity: 100_000,
            batch_size: 1_024,
            operation_timeout: Duration::from_millis(5_000),
            shutdown_timeout: Duration::from_secs(10),
            metrics_window: 1_000_000,
            buffer_block_size: 16_384,
            buffer_blocks: 32,
            max_qubits: DEFAULT_MAX_QUBITS,
        }
    }
}

impl EngineConfig {
    /// Check a worker count against the accepted range.
    pub fn validate_threads(threads: usize) -> Result<(), EngineError> {
        if !(MIN_THREADS..=MAX_THREADS).contains(&threads) {
            return Err(EngineError::InvalidConfig(format!(
                "thread count must be between {} and {}, got {}",
                MIN_THREADS, MAX_THREADS, threads
            )));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        Self::validate_threads(self.num_threads)?;

        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > self.queue_capacity {
            return Err(EngineError::InvalidConfig(format!(
                "batch size must be between 1 and the queue capacity ({}), got {}",
                self.queue_capacity, self.batch_size
            )));
        }
        if self.operation_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "operation timeout must be non-zero".to_string(),
            ));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "shutdown timeout must be non-zero".to_string(),
            ));
        }
        if self.max_qubits == 0 || self.max_qubits > MAX_QUBITS {
            return Err(EngineError::InvalidConfig(format!(
                "max qubits must be between 1 and {}, got {}",
                MAX_QUBITS, self.max_qubits
            )));
        }
        if self.metrics_window == 0 {
            return Err(EngineError::InvalidConfig(
                "metrics window must hold at least one sample".to_string(),
            ));
        }
        Ok(())
    }

    pub fn operation_timeout_ms(&self) -> u64 {
        u64::try_from(self.operation_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn metrics_window(mut self, samples: usize) -> Self {
        self.config.metrics_window = samples;
        self
    }

    pub fn buffer_pool(mut self, block_size: usize, blocks: usize) -> Self {
        self.config.buffer_block_size = block_size;
        self.config.buffer_blocks = blocks;
        self
    }

    pub fn max_qubits(mut self, qubits: u32) -> Self {
        self.config.max_qubits = qubits;
        self
    }

    /// Build with validation
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
