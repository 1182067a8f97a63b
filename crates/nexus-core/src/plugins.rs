//! # Plugin Registry
//!
//! Runtime registry of named [`Plugin`] modules.
//!
//! ```text
//! register ──► Registered ──initialize──► Initialized ──activate──► Active
//!                   │                          ▲  ◄──deactivate──     │
//!                   │                          └──────shutdown────────┴──► ShutDown
//!                   └───── hook error ──► Failed
//! ```
//!
//! A hook that errors or panics moves the plugin to `Failed`, so no hook is
//! ever invoked twice.
//!
//! Only `Active` plugins execute requests. Hooks and executions run under
//! `catch_unwind`: a plugin that errors or panics produces a failure for its
//! own task and nothing else.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{OperationOutput, OperationRequest, PluginDescriptor, PluginState};
use crate::error::{OperationError, PluginError};
use crate::ports::{ExecutionContext, Plugin};
use crate::workers::panic_message;

struct PluginEntry {
    descriptor: Mutex<PluginDescriptor>,
    plugin: Arc<dyn Plugin>,
}

impl PluginEntry {
    fn state(&self) -> PluginState {
        self.descriptor.lock().state
    }
}

/// Registry of plugins keyed by unique name.
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<BTreeMap<String, Arc<PluginEntry>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under `descriptor.name`. The descriptor's state is
    /// reset to `Registered`.
    pub fn register(
        &self,
        mut descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), PluginError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&descriptor.name) {
            return Err(PluginError::DuplicateName(descriptor.name));
        }

        descriptor.state = PluginState::Registered;
        let name = descriptor.name.clone();
        info!(
            plugin = %name,
            version = %descriptor.version,
            author = %descriptor.author,
            "[Plugins] Registering plugin"
        );
        entries.insert(
            name,
            Arc::new(PluginEntry {
                descriptor: Mutex::new(descriptor),
                plugin,
            }),
        );
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<Arc<PluginEntry>, PluginError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Move `name` from one of `from` to `to`, running `hook` in between.
    /// A failed hook leaves the plugin in `Failed`.
    ///
    /// The descriptor lock is held across the hook so concurrent lifecycle
    /// calls on the same plugin serialize.
    fn transition<H>(
        &self,
        name: &str,
        action: &'static str,
        from: &[PluginState],
        to: PluginState,
        hook: H,
    ) -> Result<(), PluginError>
    where
        H: FnOnce(&dyn Plugin) -> Result<(), OperationError>,
    {
        let entry = self.entry(name)?;
        let mut descriptor = entry.descriptor.lock();
        if !from.contains(&descriptor.state) {
            return Err(PluginError::InvalidLifecycleTransition {
                name: name.to_string(),
                state: descriptor.state,
                action,
            });
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(entry.plugin.as_ref())))
            .unwrap_or_else(|payload| {
                Err(OperationError::Internal(format!(
                    "panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        if let Err(e) = outcome {
            warn!(plugin = %name, action, error = %e, "[Plugins] Lifecycle hook failed");
            descriptor.state = PluginState::Failed;
            return Err(PluginError::HookFailed {
                name: name.to_string(),
                message: e.to_string(),
            });
        }

        debug!(plugin = %name, from = %descriptor.state, to = %to, "[Plugins] State change");
        descriptor.state = to;
        Ok(())
    }

    /// Run the plugin's `initialize` hook. Allowed once, from `Registered`.
    pub fn initialize(&self, name: &str) -> Result<(), PluginError> {
        self.transition(
            name,
            "initialize",
            &[PluginState::Registered],
            PluginState::Initialized,
            |plugin| plugin.initialize(),
        )
    }

    pub fn activate(&self, name: &str) -> Result<(), PluginError> {
        self.transition(
            name,
            "activate",
            &[PluginState::Initialized],
            PluginState::Active,
            |_| Ok(()),
        )
    }

    pub fn deactivate(&self, name: &str) -> Result<(), PluginError> {
        self.transition(
            name,
            "deactivate",
            &[PluginState::Active],
            PluginState::Initialized,
            |_| Ok(()),
        )
    }

    /// Run the plugin's `shutdown` hook. Allowed once, after `initialize`.
    pub fn shutdown(&self, name: &str) -> Result<(), PluginError> {
        self.transition(
            name,
            "shutdown",
            &[PluginState::Initialized, PluginState::Active],
            PluginState::ShutDown,
            |plugin| plugin.shutdown(),
        )
    }

    /// Remove a plugin that is not running. Returns its final descriptor.
    pub fn unregister(&self, name: &str) -> Result<PluginDescriptor, PluginError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let state = entry.state();
        if matches!(state, PluginState::Initialized | PluginState::Active) {
            return Err(PluginError::InvalidLifecycleTransition {
                name: name.to_string(),
                state,
                action: "unregister",
            });
        }

        let descriptor = entry.descriptor.lock().clone();
        entries.remove(name);
        info!(plugin = %name, "[Plugins] Unregistered plugin");
        Ok(descriptor)
    }

    /// Execute a request on an active plugin.
    ///
    /// Plugin errors and panics come back as `PluginFault`.
    pub fn execute(
        &self,
        name: &str,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let entry = self.entry(name).map_err(|e| match e {
            PluginError::NotFound(_) => {
                OperationError::InvalidRequest(format!("plugin '{}' is not registered", name))
            }
            other => OperationError::Internal(other.to_string()),
        })?;

        let state = entry.state();
        if state != PluginState::Active {
            return Err(OperationError::ModuleUnavailable(format!(
                "plugin '{}' is {}",
                name, state
            )));
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.plugin.execute(request, ctx)))
            .unwrap_or_else(|payload| {
                Err(OperationError::Internal(format!(
                    "panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        outcome.map_err(|e| {
            warn!(plugin = %name, error = %e, "[Plugins] Plugin execution failed");
            match e {
                OperationError::Timeout { .. } | OperationError::PluginFault { .. } => e,
                other => OperationError::PluginFault {
                    plugin: name.to_string(),
                    message: other.to_string(),
                },
            }
        })
    }

    /// Descriptors of every registered plugin, ordered by name.
    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.descriptor.lock().clone())
            .collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.entries
            .read()
            .get(name)
            .map(|entry| entry.descriptor.lock().clone())
    }

    /// The plugin's own status string.
    pub fn status(&self, name: &str) -> Result<String, PluginError> {
        let entry = self.entry(name)?;
        let status = panic::catch_unwind(AssertUnwindSafe(|| entry.plugin.status()))
            .unwrap_or_else(|payload| {
                format!("status panicked: {}", panic_message(payload.as_ref()))
            });
        Ok(status)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down every initialized or active plugin. Failures are logged and
    /// do not stop the sweep.
    pub fn shutdown_all(&self) {
        let names: Vec<String> = self.entries.read().keys().cloned().collect();
        for name in names {
            let running = self
                .descriptor(&name)
                .is_some_and(|d| matches!(d.state, PluginState::Initialized | PluginState::Active));
            if running {
                if let Err(e) = self.shutdown(&name) {
                    warn!(plugin = %name, error = %e, "[Plugins] Shutdown failed");
                }
            }
        }
    }
}
