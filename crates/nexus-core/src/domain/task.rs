//! Tasks and task results.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use uuid::Uuid;

use super::request::{OperationKind, OperationOutput, OperationRequest};
use crate::error::{EngineError, OperationError};

/// Unique task identifier.
pub type TaskId = Uuid;

/// One unit of requested computation.
///
/// Owned by the queue until a worker claims it, then by that worker until the
/// result is delivered.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub request: OperationRequest,
    pub submitted_at: Instant,
    /// Wall-clock submission time, for logs and the binding layer.
    pub submitted_wall: SystemTime,
    pub deadline: Option<Instant>,
}

impl Task {
    pub fn new(request: OperationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            submitted_at: Instant::now(),
            submitted_wall: SystemTime::now(),
            deadline: None,
        }
    }

    /// Set a deadline relative to submission.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.submitted_at + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.request.kind()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Outcome of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failure { reason: OperationError },
}

/// Result delivered to whoever awaits the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub kind: OperationKind,
    pub status: TaskStatus,
    pub output: Option<OperationOutput>,
    /// Wall-clock time from dequeue to completion.
    pub latency_us: u64,
}

impl TaskResult {
    pub fn success(
        task_id: TaskId,
        kind: OperationKind,
        output: OperationOutput,
        latency_us: u64,
    ) -> Self {
        Self {
            task_id,
            kind,
            status: TaskStatus::Success,
            output: Some(output),
            latency_us,
        }
    }

    pub fn failure(
        task_id: TaskId,
        kind: OperationKind,
        reason: OperationError,
        latency_us: u64,
    ) -> Self {
        Self {
            task_id,
            kind,
            status: TaskStatus::Failure { reason },
            output: None,
            latency_us,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Success)
    }

    pub fn failure_reason(&self) -> Option<&OperationError> {
        match &self.status {
            TaskStatus::Success => None,
            TaskStatus::Failure { reason } => Some(reason),
        }
    }

    /// Flatten into a `Result` for callers that do not inspect the status.
    pub fn into_output(self) -> Result<OperationOutput, EngineError> {
        match (self.status, self.output) {
            (TaskStatus::Success, Some(output)) => Ok(output),
            (TaskStatus::Success, None) => Err(EngineError::TaskFailed(OperationError::Internal(
                "successful task produced no output".to_string(),
            ))),
            (TaskStatus::Failure { reason }, _) => Err(reason.into()),
        }
    }
}
