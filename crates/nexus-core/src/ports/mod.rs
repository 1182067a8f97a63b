//! # Ports
//!
//! Trait seams between the engine and the code it runs.
//!
//! - [`OperationModule`]: the capability contract every built-in module and
//!   every plugin implements.
//! - [`Plugin`]: an [`OperationModule`] with lifecycle hooks, registered at
//!   runtime through the [`PluginRegistry`](crate::plugins::PluginRegistry).
//!
//! Which implementation backs each operation kind is decided when the
//! [`Dispatcher`](crate::modules::Dispatcher) is constructed. There is no
//! runtime probing for optional accelerated backends.

use std::time::Instant;

use crate::domain::{OperationOutput, OperationRequest};
use crate::error::OperationError;
use crate::memory::BufferPools;
use crate::modules::quantum::MAX_QUBITS;

/// Per-task execution context handed to modules.
pub struct ExecutionContext<'a> {
    /// Shared scratch buffers.
    pub buffers: &'a BufferPools,
    /// Instant after which the task counts as timed out.
    pub deadline: Option<Instant>,
    /// Configured operation timeout, reported in `Timeout` errors.
    pub timeout_ms: u64,
    /// Largest quantum register this task may allocate.
    pub max_qubits: u32,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(buffers: &'a BufferPools, deadline: Option<Instant>, timeout_ms: u64) -> Self {
        Self {
            buffers,
            deadline,
            timeout_ms,
            max_qubits: MAX_QUBITS,
        }
    }

    pub fn with_max_qubits(mut self, qubits: u32) -> Self {
        self.max_qubits = qubits.min(MAX_QUBITS);
        self
    }

    /// Context without a deadline, for direct module calls.
    pub fn unbounded(buffers: &'a BufferPools) -> Self {
        Self::new(buffers, None, 0)
    }

    /// Cooperative timeout check for long-running loops.
    pub fn check_deadline(&self) -> Result<(), OperationError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(OperationError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
            _ => Ok(()),
        }
    }
}

/// Capability contract shared by built-in modules and plugins.
///
/// Implementations must be stateless across calls or internally synchronized:
/// one instance serves every worker thread. Per-task state (a quantum state
/// vector, a matrix) lives on the stack of `execute`.
pub trait OperationModule: Send + Sync {
    /// Module name, used in logs and errors.
    fn name(&self) -> &str;

    /// Execute one request.
    ///
    /// A request the module cannot handle must produce
    /// `OperationError::InvalidRequest`, never a panic.
    fn execute(
        &self,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError>;
}

/// An operation module supplied at runtime.
///
/// Hooks are invoked once each by the registry, in lifecycle order.
pub trait Plugin: OperationModule {
    fn initialize(&self) -> Result<(), OperationError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OperationError> {
        Ok(())
    }

    /// Free-form status string for introspection.
    fn status(&self) -> String {
        "OK".to_string()
    }
}
