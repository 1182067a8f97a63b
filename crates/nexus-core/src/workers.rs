//! Worker threads.
//!
//! A fixed pool of named OS threads shares one [`BoundedQueue`]. Each worker
//! loops: block on `pop`, run the task through the [`Executor`], deliver the
//! [`TaskResult`] over the job's oneshot channel. Closing the queue ends the
//! loop once the current task is finished.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::domain::{OperationOutput, OperationRequest, Task, TaskResult};
use crate::error::{EngineError, OperationError};
use crate::memory::BufferPools;
use crate::metrics::MetricsCollector;
use crate::modules::Dispatcher;
use crate::plugins::PluginRegistry;
use crate::ports::ExecutionContext;
use crate::queue::BoundedQueue;

/// A queued task together with the channel its result is delivered on.
pub(crate) struct Job {
    pub task: Task,
    pub responder: oneshot::Sender<TaskResult>,
}

impl Job {
    pub fn new(task: Task) -> (Self, oneshot::Receiver<TaskResult>) {
        let (responder, rx) = oneshot::channel();
        (Self { task, responder }, rx)
    }

    /// Deliver a failure without executing the task.
    pub fn cancel(self, reason: OperationError) {
        let result = TaskResult::failure(self.task.id, self.task.kind(), reason, 0);
        // The submitter may have given up waiting
        let _ = self.responder.send(result);
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs single tasks: module lookup, panic isolation, timeout accounting,
/// metric recording.
pub(crate) struct Executor {
    pub dispatcher: Arc<Dispatcher>,
    pub plugins: Arc<PluginRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub buffers: Arc<BufferPools>,
    pub timeout: Duration,
    pub max_qubits: u32,
}

impl Executor {
    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Execute `task` and record exactly one metric sample for it.
    pub fn run(&self, task: &Task) -> TaskResult {
        let started = Instant::now();
        let kind = task.kind();

        let outcome = if task.is_expired(started) {
            debug!(task_id = %task.id, "[Workers] task expired in queue");
            Err(OperationError::Timeout {
                timeout_ms: self.timeout_ms(),
            })
        } else {
            match self.execute(task) {
                Ok(_) if task.is_expired(Instant::now()) => Err(OperationError::Timeout {
                    timeout_ms: self.timeout_ms(),
                }),
                other => other,
            }
        };

        let elapsed = started.elapsed();
        self.metrics
            .record_operation(kind, elapsed, outcome.is_ok());
        let latency_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        match outcome {
            Ok(output) => TaskResult::success(task.id, kind, output, latency_us),
            Err(reason) => {
                debug!(
                    task_id = %task.id,
                    kind = %kind,
                    op = task.request.op_name(),
                    %reason,
                    "[Workers] task failed"
                );
                TaskResult::failure(task.id, kind, reason, latency_us)
            }
        }
    }

    fn execute(&self, task: &Task) -> Result<OperationOutput, OperationError> {
        let ctx = ExecutionContext::new(&self.buffers, task.deadline, self.timeout_ms())
            .with_max_qubits(self.max_qubits);

        if let OperationRequest::Plugin { name, .. } = &task.request {
            return self.plugins.execute(name, &task.request, &ctx);
        }

        let kind = task.kind();
        let module = self
            .dispatcher
            .module_for(kind)
            .ok_or_else(|| OperationError::ModuleUnavailable(format!("no {} module", kind)))?;

        panic::catch_unwind(AssertUnwindSafe(|| module.execute(&task.request, &ctx)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(task_id = %task.id, module = module.name(), %message, "[Workers] module panicked");
                Err(OperationError::Internal(format!(
                    "{} module panicked: {}",
                    module.name(),
                    message
                )))
            })
    }
}

/// Counts live worker threads so shutdown can wait with a deadline.
#[derive(Default)]
struct LiveWorkers {
    count: Mutex<usize>,
    drained: Condvar,
}

struct LiveGuard(Arc<LiveWorkers>);

impl LiveGuard {
    fn enter(live: &Arc<LiveWorkers>) -> Self {
        *live.count.lock() += 1;
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.drained.notify_all();
        }
    }
}

/// Fixed-size pool of worker threads.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    live: Arc<LiveWorkers>,
}

impl WorkerPool {
    /// Spawn `size` workers consuming `queue`.
    ///
    /// If any spawn fails, the queue is closed, the workers already started
    /// are joined, and `SpawnFailed` is returned.
    pub fn spawn(
        size: usize,
        queue: Arc<BoundedQueue<Job>>,
        executor: Arc<Executor>,
    ) -> Result<Self, EngineError> {
        let live = Arc::new(LiveWorkers::default());
        let mut handles = Vec::with_capacity(size);

        for id in 0..size {
            let guard = LiveGuard::enter(&live);
            let worker_queue = Arc::clone(&queue);
            let worker_executor = Arc::clone(&executor);

            let spawned = thread::Builder::new()
                .name(format!("nexus-worker-{}", id))
                .spawn(move || {
                    let _guard = guard;
                    worker_loop(id, &worker_queue, &worker_executor);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = id, error = %e, "[Workers] failed to spawn worker thread");
                    for job in queue.close() {
                        job.cancel(OperationError::EngineStopped);
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(EngineError::SpawnFailed(e.to_string()));
                }
            }
        }

        debug!(workers = size, "[Workers] pool started");
        Ok(Self { handles, live })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Number of worker threads that have not yet exited.
    pub fn live(&self) -> usize {
        *self.live.count.lock()
    }

    /// Wait up to `timeout` for every worker to exit. The queue must already
    /// be closed.
    pub fn join(self, timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + timeout;
        let unjoined = {
            let mut count = self.live.count.lock();
            while *count > 0 {
                if self.live.drained.wait_until(&mut count, deadline).timed_out() {
                    break;
                }
            }
            *count
        };

        if unjoined > 0 {
            // Stragglers are detached; their handles drop here
            return Err(EngineError::ShutdownTimeout { unjoined, timeout });
        }

        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if let Err(payload) = handle.join() {
                error!(
                    worker = %name,
                    message = %panic_message(payload.as_ref()),
                    "[Workers] worker thread panicked"
                );
            }
        }
        Ok(())
    }
}

fn worker_loop(id: usize, queue: &BoundedQueue<Job>, executor: &Executor) {
    debug!(worker = id, "[Workers] worker started");

    while let Some(job) = queue.pop() {
        executor.metrics.record_queue_depth(queue.len());

        let Job { task, responder } = job;
        let result = executor.run(&task);
        if responder.send(result).is_err() {
            debug!(worker = id, task_id = %task.id, "[Workers] result receiver dropped");
        }
    }

    debug!(worker = id, "[Workers] worker exiting");
}
