//! Error types for the engine core.
//!
//! - [`EngineError`]: admission, lifecycle and configuration failures returned
//!   directly to callers.
//! - [`OperationError`]: why a single task failed. Carried inside
//!   [`TaskResult`](crate::domain::TaskResult) and never propagated as a panic.
//! - [`PluginError`]: plugin registry failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::EngineState;
use crate::domain::PluginState;

/// Errors returned by the engine facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine is not running (state: {state})")]
    EngineNotRunning { state: EngineState },

    #[error("Engine already running (state: {state})")]
    AlreadyRunning { state: EngineState },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Queue full at {capacity} tasks")]
    QueueFull { capacity: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Task failed: {0}")]
    TaskFailed(OperationError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Shutdown timed out after {timeout:?}: {unjoined} worker(s) still running")]
    ShutdownTimeout { unjoined: usize, timeout: Duration },

    #[error("Worker spawn failed: {0}")]
    SpawnFailed(String),
}

impl From<OperationError> for EngineError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::InvalidRequest(msg) => EngineError::InvalidRequest(msg),
            OperationError::InvalidShape { rows, cols } => EngineError::InvalidRequest(format!(
                "invalid shape {}x{}: operation requires a square matrix",
                rows, cols
            )),
            OperationError::Timeout { timeout_ms } => EngineError::Timeout { timeout_ms },
            other => EngineError::TaskFailed(other),
        }
    }
}

/// Reason a task did not produce an output.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid shape {rows}x{cols}: operation requires a square matrix")]
    InvalidShape { rows: usize, cols: usize },

    #[error("operation exceeded timeout of {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("engine stopped")]
    EngineStopped,

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("plugin '{plugin}' failed: {message}")]
    PluginFault { plugin: String, message: String },

    #[error("module not available: {0}")]
    ModuleUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from the plugin registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin '{0}' is already registered")]
    DuplicateName(String),

    #[error("Plugin '{0}' not found")]
    NotFound(String),

    #[error("Plugin '{name}' cannot {action} while {state}")]
    InvalidLifecycleTransition {
        name: String,
        state: PluginState,
        action: &'static str,
    },

    #[error("Plugin '{name}' hook failed: {message}")]
    HookFailed { name: String, message: String },
}
