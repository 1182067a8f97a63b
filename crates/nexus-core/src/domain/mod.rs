//! Domain layer: pure data types, no threads or I/O.

pub mod request;
pub mod state;
pub mod task;

pub use request::{
    BinaryOutput, HashOutput, MatrixResult, MatrixStats, MatrixSummary, OperationKind,
    OperationOutput, OperationRequest, QuantumOutput, QubitProbability,
};
pub use state::{EngineState, EngineStatus, PluginDescriptor, PluginState};
pub use task::{Task, TaskId, TaskResult, TaskStatus};
