//! # Integration Tests
//!
//! Engine-level behavior that spans the queue, the worker pool, the modules,
//! the plugin registry and the metrics collector.

pub mod admission;
pub mod lifecycle;
pub mod modules;
pub mod plugins;

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

use nexus_core::{
    Engine, EngineConfigBuilder, ExecutionContext, OperationError, OperationModule,
    OperationOutput, OperationRequest, Plugin, PluginDescriptor,
};

/// Engine with small, test-friendly limits. Not started.
pub fn test_engine(threads: usize, queue_capacity: usize) -> Engine {
    let config = EngineConfigBuilder::new()
        .num_threads(threads)
        .queue_capacity(queue_capacity)
        .batch_size(queue_capacity.min(64))
        .shutdown_timeout(Duration::from_secs(5))
        .metrics_window(10_000)
        .buffer_pool(4_096, 8)
        .build()
        .expect("test config is valid");
    Engine::new(config).expect("engine builds")
}

#[derive(Default)]
struct GateState {
    open: bool,
    entered: usize,
}

/// Plugin whose executions block until the gate is opened.
///
/// Lets a test pin workers in place so it can observe queue behavior.
#[derive(Default)]
pub struct GatePlugin {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatePlugin {
    pub const NAME: &'static str = "gate";

    /// Register and load a fresh gate on `engine`.
    pub fn install(engine: &Engine) -> Arc<Self> {
        let gate = Arc::new(Self::default());
        engine
            .register_plugin(PluginDescriptor::new(Self::NAME, "0.1.0", "tests"), gate.clone())
            .expect("gate registers");
        engine.load_plugin(Self::NAME).expect("gate loads");
        gate
    }

    pub fn request() -> OperationRequest {
        OperationRequest::plugin(Self::NAME, serde_json::json!("hold"))
    }

    /// Block until `count` executions are inside the gate.
    pub fn wait_entered(&self, count: usize) {
        let mut state = self.state.lock();
        while state.entered < count {
            self.changed.wait_for(&mut state, Duration::from_millis(50));
        }
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }
}

impl OperationModule for GatePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(
        &self,
        request: &OperationRequest,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let mut state = self.state.lock();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
        match request {
            OperationRequest::Plugin { payload, .. } => Ok(OperationOutput::Plugin(payload.clone())),
            _ => Err(OperationError::InvalidRequest("gate only runs plugin requests".into())),
        }
    }
}

impl Plugin for GatePlugin {}
