//! # Engine
//!
//! The facade callers hold (usually as `Arc<Engine>`): lifecycle control,
//! task admission, result delivery, metrics and plugin management.
//!
//! ```text
//!            start                pause
//! STOPPED ──────────► RUNNING ◄──────────► PAUSED
//!    ▲                   │       resume       │
//!    └──── stop ─────────┴────────────────────┘
//!                        │ shutdown timeout
//!                        ▼
//!                      ERROR
//! ```
//!
//! Lifecycle calls serialize on one mutex. The state itself is an atomic so
//! `status` and the admission check never take a lock.

use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::domain::{
    EngineState, EngineStatus, OperationKind, OperationRequest, PluginDescriptor, PluginState,
    Task, TaskId, TaskResult,
};
use crate::error::{EngineError, OperationError};
use crate::memory::BufferPools;
use crate::metrics::{AggregatedMetrics, MetricsCollector};
use crate::modules::Dispatcher;
use crate::plugins::PluginRegistry;
use crate::ports::Plugin;
use crate::queue::{BoundedQueue, QueueError};
use crate::workers::{Executor, Job, WorkerPool};

/// Pending result of an admitted task.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: TaskId,
    kind: OperationKind,
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    fn orphaned(task_id: TaskId, kind: OperationKind) -> TaskResult {
        TaskResult::failure(task_id, kind, OperationError::EngineStopped, 0)
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from inside an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> TaskResult {
        let (task_id, kind) = (self.task_id, self.kind);
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Self::orphaned(task_id, kind))
    }
}

impl Future for TaskHandle {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<TaskResult> {
        let (task_id, kind) = (self.task_id, self.kind);
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Self::orphaned(task_id, kind)))
    }
}

/// The compute engine.
pub struct Engine {
    config: EngineConfig,
    state: AtomicU8,
    /// Serializes lifecycle transitions and owns the running pool.
    lifecycle: Mutex<Option<WorkerPool>>,
    queue: RwLock<Option<Arc<BoundedQueue<Job>>>>,
    worker_count: AtomicUsize,
    started_at: RwLock<Option<Instant>>,
    dispatcher: Arc<Dispatcher>,
    plugins: Arc<PluginRegistry>,
    metrics: Arc<MetricsCollector>,
    buffers: Arc<BufferPools>,
}

impl Engine {
    /// Engine with the built-in modules.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_dispatcher(config, Dispatcher::builtin())
    }

    /// Engine with a caller-chosen dispatch table.
    pub fn with_dispatcher(config: EngineConfig, dispatcher: Dispatcher) -> Result<Self, EngineError> {
        config.validate()?;
        info!(modules = ?dispatcher, "[Engine] Dispatch table configured");

        Ok(Self {
            metrics: Arc::new(MetricsCollector::new(config.metrics_window)),
            buffers: Arc::new(BufferPools::new(config.buffer_block_size, config.buffer_blocks)),
            config,
            state: AtomicU8::new(EngineState::Stopped as u8),
            lifecycle: Mutex::new(None),
            queue: RwLock::new(None),
            worker_count: AtomicUsize::new(0),
            started_at: RwLock::new(None),
            dispatcher: Arc::new(dispatcher),
            plugins: Arc::new(PluginRegistry::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state (lock-free).
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `Stopped → Running` with `thread_count` workers.
    pub fn start(&self, thread_count: usize) -> Result<(), EngineError> {
        let mut pool_slot = self.lifecycle.lock();
        let state = self.state();
        if state != EngineState::Stopped {
            return Err(EngineError::AlreadyRunning { state });
        }
        EngineConfig::validate_threads(thread_count)?;

        let queue = Arc::new(BoundedQueue::new(self.config.queue_capacity));
        let executor = Arc::new(Executor {
            dispatcher: Arc::clone(&self.dispatcher),
            plugins: Arc::clone(&self.plugins),
            metrics: Arc::clone(&self.metrics),
            buffers: Arc::clone(&self.buffers),
            timeout: self.config.operation_timeout,
            max_qubits: self.config.max_qubits,
        });
        let pool = WorkerPool::spawn(thread_count, Arc::clone(&queue), executor)?;

        *self.queue.write() = Some(queue);
        *self.started_at.write() = Some(Instant::now());
        self.worker_count.store(pool.size(), Ordering::Release);
        *pool_slot = Some(pool);
        self.set_state(EngineState::Running);

        info!(
            workers = thread_count,
            queue_capacity = self.config.queue_capacity,
            timeout_ms = self.config.operation_timeout_ms(),
            "[Engine] Started"
        );
        Ok(())
    }

    /// `Running | Paused → Stopped`.
    ///
    /// Queued tasks are failed with "engine stopped"; in-flight tasks finish.
    /// Blocks until every worker exits or the shutdown timeout passes, in
    /// which case the engine moves to `Error`.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut pool_slot = self.lifecycle.lock();
        let state = self.state();
        if !matches!(state, EngineState::Running | EngineState::Paused) {
            return Err(EngineError::EngineNotRunning { state });
        }
        self.set_state(EngineState::Stopped);

        let cancelled = match self.queue.write().take() {
            Some(queue) => {
                let pending = queue.close();
                let count = pending.len();
                for job in pending {
                    job.cancel(OperationError::EngineStopped);
                }
                count
            }
            None => 0,
        };

        let joined = match pool_slot.take() {
            Some(pool) => pool.join(self.config.shutdown_timeout),
            None => Ok(()),
        };
        self.worker_count.store(0, Ordering::Release);
        *self.started_at.write() = None;
        self.metrics.record_queue_depth(0);

        if let Err(e) = joined {
            self.set_state(EngineState::Error);
            error!(error = %e, cancelled, "[Engine] Shutdown timed out, engine is in ERROR state");
            return Err(e);
        }

        info!(cancelled, "[Engine] Stopped");
        Ok(())
    }

    /// `Running → Paused`: workers stop taking tasks and submissions are
    /// rejected. Tasks already executing finish.
    pub fn pause(&self) -> Result<(), EngineError> {
        let _guard = self.lifecycle.lock();
        let state = self.state();
        if state != EngineState::Running {
            return Err(EngineError::EngineNotRunning { state });
        }
        if let Some(queue) = self.queue.read().as_ref() {
            queue.pause();
        }
        self.set_state(EngineState::Paused);
        info!("[Engine] Paused");
        Ok(())
    }

    /// `Paused → Running`.
    pub fn resume(&self) -> Result<(), EngineError> {
        let _guard = self.lifecycle.lock();
        let state = self.state();
        match state {
            EngineState::Paused => {}
            EngineState::Running => return Err(EngineError::AlreadyRunning { state }),
            _ => return Err(EngineError::EngineNotRunning { state }),
        }
        if let Some(queue) = self.queue.read().as_ref() {
            queue.resume();
        }
        self.set_state(EngineState::Running);
        info!("[Engine] Resumed");
        Ok(())
    }

    fn admission_queue(&self) -> Result<Arc<BoundedQueue<Job>>, EngineError> {
        let state = self.state();
        if !state.accepts_tasks() {
            debug!(%state, "[Engine] Rejected submission, engine not running");
            return Err(EngineError::EngineNotRunning { state });
        }
        self.queue.read().clone().ok_or(EngineError::EngineNotRunning {
            state: self.state(),
        })
    }

    fn new_job(&self, request: OperationRequest) -> (Job, TaskHandle) {
        let task = Task::new(request).with_timeout(self.config.operation_timeout);
        let (task_id, kind) = (task.id, task.kind());
        let (job, rx) = Job::new(task);
        (job, TaskHandle { task_id, kind, rx })
    }

    fn map_rejection<T>(&self, err: QueueError<T>) -> EngineError {
        match err {
            QueueError::Full { capacity, .. } => {
                debug!(capacity, "[Engine] Rejected submission, queue full");
                EngineError::QueueFull { capacity }
            }
            QueueError::Closed { .. } => EngineError::EngineNotRunning {
                state: self.state(),
            },
        }
    }

    /// Enqueue a request and return a handle to its result. Never blocks.
    pub fn submit_async(&self, request: OperationRequest) -> Result<TaskHandle, EngineError> {
        let queue = self.admission_queue()?;
        let (job, handle) = self.new_job(request);

        let depth = queue.try_push(job).map_err(|e| self.map_rejection(e))?;
        self.metrics.record_queue_depth(depth);
        debug!(task_id = %handle.task_id, kind = %handle.kind, depth, "[Engine] Task queued");
        Ok(handle)
    }

    /// Enqueue a request and block until its result is available.
    ///
    /// Admission errors are returned directly; execution failures arrive
    /// inside the [`TaskResult`]. Must not be called from an async context.
    pub fn submit(&self, request: OperationRequest) -> Result<TaskResult, EngineError> {
        Ok(self.submit_async(request)?.wait())
    }

    /// Enqueue up to `batch_size` requests at once: either all are admitted
    /// or none are.
    pub fn submit_batch(
        &self,
        requests: Vec<OperationRequest>,
    ) -> Result<Vec<TaskHandle>, EngineError> {
        if requests.len() > self.config.batch_size {
            return Err(EngineError::InvalidRequest(format!(
                "batch of {} requests exceeds batch size {}",
                requests.len(),
                self.config.batch_size
            )));
        }
        let queue = self.admission_queue()?;

        let (jobs, handles): (Vec<Job>, Vec<TaskHandle>) =
            requests.into_iter().map(|r| self.new_job(r)).unzip();
        let depth = queue
            .try_push_batch(jobs)
            .map_err(|e| self.map_rejection(e))?;
        self.metrics.record_queue_depth(depth);
        debug!(count = handles.len(), depth, "[Engine] Batch queued");
        Ok(handles)
    }

    /// Point-in-time status.
    pub fn status(&self) -> EngineStatus {
        let started_at = *self.started_at.read();
        EngineStatus {
            state: self.state(),
            queue_depth: self.queue_depth(),
            queue_capacity: self.config.queue_capacity,
            worker_count: self.worker_count.load(Ordering::Acquire),
            uptime: started_at.map_or(Duration::ZERO, |at| at.elapsed()),
        }
    }

    fn queue_depth(&self) -> usize {
        self.queue.read().as_ref().map_or(0, |q| q.len())
    }

    /// Aggregate the collected metrics.
    pub fn metrics(&self) -> AggregatedMetrics {
        self.metrics.record_queue_depth(self.queue_depth());
        self.metrics.aggregate()
    }

    /// The collector itself, for windowed views and reset.
    pub fn metrics_collector(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn buffers(&self) -> &BufferPools {
        &self.buffers
    }

    /// The plugin registry, for fine-grained lifecycle control.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn register_plugin(
        &self,
        descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), EngineError> {
        Ok(self.plugins.register(descriptor, plugin)?)
    }

    pub fn list_plugins(&self) -> Vec<PluginDescriptor> {
        self.plugins.list()
    }

    /// Initialize (if needed) and activate a registered plugin.
    pub fn load_plugin(&self, name: &str) -> Result<(), EngineError> {
        let state = self
            .plugins
            .descriptor(name)
            .map(|d| d.state)
            .ok_or_else(|| crate::error::PluginError::NotFound(name.to_string()))?;
        if state == PluginState::Registered {
            self.plugins.initialize(name)?;
        }
        self.plugins.activate(name)?;
        info!(plugin = %name, "[Engine] Plugin loaded");
        Ok(())
    }

    /// Shut down (if running) and remove a plugin.
    pub fn unload_plugin(&self, name: &str) -> Result<PluginDescriptor, EngineError> {
        let running = self
            .plugins
            .descriptor(name)
            .is_some_and(|d| matches!(d.state, PluginState::Initialized | PluginState::Active));
        if running {
            self.plugins.shutdown(name)?;
        }
        let descriptor = self.plugins.unregister(name)?;
        info!(plugin = %name, "[Engine] Plugin unloaded");
        Ok(descriptor)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if matches!(self.state(), EngineState::Running | EngineState::Paused) {
            if let Err(e) = self.stop() {
                error!(error = %e, "[Engine] Stop on drop failed");
            }
        }
        self.plugins.shutdown_all();
    }
}
