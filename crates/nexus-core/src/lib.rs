//! # Nexus Core
//!
//! Multi-threaded compute engine. Callers submit typed operation requests;
//! a fixed pool of worker threads drains a bounded queue, dispatches each
//! task to an operation module, and delivers one result per task.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): requests, outputs, tasks, lifecycle states
//! - **Ports Layer** (`ports/`): `OperationModule` and `Plugin` traits
//! - **Modules** (`modules/`): binary, matrix, quantum and hash modules plus
//!   the `Dispatcher` table
//! - **Runtime**: `BoundedQueue`, worker pool, `PluginRegistry`,
//!   `MetricsCollector`, `BufferPools`
//! - **Facade**: `Engine`
//!
//! ## Guarantees
//!
//! - Every admitted task yields exactly one `TaskResult`, including tasks
//!   cancelled by `stop`.
//! - Submission never blocks: a full queue fails fast with `QueueFull`.
//! - A module or plugin that panics fails its own task only.
//! - Metrics record one sample per executed task.
//!
//! ## Usage Example
//!
//! ```ignore
//! use nexus_core::{Engine, EngineConfigBuilder, OperationRequest};
//!
//! let config = EngineConfigBuilder::new().num_threads(4).build()?;
//! let engine = Engine::new(config)?;
//! engine.start(4)?;
//!
//! let result = engine.submit(OperationRequest::binary("xor", 0b1100, Some(0b1010)))?;
//! assert!(result.is_success());
//!
//! let handle = engine.submit_async(OperationRequest::hash("blake3", b"payload".to_vec()))?;
//! let result = handle.await;
//!
//! println!("{}", engine.metrics().to_json()?);
//! engine.stop()?;
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod modules;
pub mod plugins;
pub mod ports;
pub mod queue;
mod workers;

// Re-export main types
pub use config::{
    default_threads, EngineConfig, EngineConfigBuilder, DEFAULT_MAX_QUBITS, MAX_THREADS, MIN_THREADS,
};
pub use domain::{
    BinaryOutput, EngineState, EngineStatus, HashOutput, MatrixResult, MatrixStats, MatrixSummary,
    OperationKind, OperationOutput, OperationRequest, PluginDescriptor, PluginState, QuantumOutput,
    QubitProbability, Task, TaskId, TaskResult, TaskStatus,
};
pub use engine::{Engine, TaskHandle};
pub use error::{EngineError, OperationError, PluginError};
pub use memory::{BufferPool, BufferPools, PoolStats, PooledBuffer};
pub use metrics::{AggregatedMetrics, LatencyPercentiles, MetricSample, MetricsCollector};
pub use modules::{
    BinaryModule, BinaryOp, BitVectorOp, Dispatcher, HashAlgorithm, HashModule, Matrix,
    MatrixArithmetic, MatrixModule, MatrixOp, NullModule, QuantumModule, QuantumState,
};
pub use plugins::PluginRegistry;
pub use ports::{ExecutionContext, OperationModule, Plugin};
pub use queue::{BoundedQueue, QueueError};
