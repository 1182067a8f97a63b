//! Bundled demo plugins.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use nexus_core::{
    Engine, EngineError, ExecutionContext, OperationError, OperationModule, OperationOutput,
    OperationRequest, Plugin, PluginDescriptor,
};

const AUTHOR: &str = "NexusEngine Team";

fn payload(request: &OperationRequest) -> Result<&Value, OperationError> {
    match request {
        OperationRequest::Plugin { payload, .. } => Ok(payload),
        other => Err(OperationError::InvalidRequest(format!(
            "expected a plugin request, got {}",
            other.kind()
        ))),
    }
}

/// Echoes a status document with a timestamp and call count.
#[derive(Default)]
pub struct ExamplePlugin {
    calls: AtomicU64,
}

impl ExamplePlugin {
    pub const NAME: &'static str = "example_plugin";

    pub fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new(Self::NAME, "1.0.0", AUTHOR)
            .with_description("Example plugin demonstrating the plugin interface")
    }
}

impl OperationModule for ExamplePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(
        &self,
        request: &OperationRequest,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let echo = payload(request)?.clone();
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(OperationOutput::Plugin(json!({
            "status": "success",
            "timestamp_ms": timestamp_ms,
            "calls": calls,
            "echo": echo,
        })))
    }
}

impl Plugin for ExamplePlugin {
    fn initialize(&self) -> Result<(), OperationError> {
        info!(plugin = Self::NAME, "[ExamplePlugin] Initialized");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OperationError> {
        info!(
            plugin = Self::NAME,
            calls = self.calls.load(Ordering::Relaxed),
            "[ExamplePlugin] Shutdown"
        );
        Ok(())
    }

    fn status(&self) -> String {
        format!("ACTIVE ({} calls)", self.calls.load(Ordering::Relaxed))
    }
}

/// Gate-count analysis of a circuit description.
///
/// The payload is `{"gates": ["h", "x", "x", "cnot", ...]}`. Adjacent pairs of
/// identical self-inverse gates cancel; the reported optimized depth is the
/// gate count after repeated cancellation.
#[derive(Default)]
pub struct QuantumOptimizerPlugin;

impl QuantumOptimizerPlugin {
    pub const NAME: &'static str = "quantum_optimizer";

    pub fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new(Self::NAME, "1.1.0", AUTHOR)
            .with_description("Quantum circuit optimization and analysis")
    }

    fn self_inverse(gate: &str) -> bool {
        matches!(gate, "h" | "x" | "y" | "z" | "cnot" | "swap")
    }

    /// Cancel adjacent identical self-inverse gates.
    pub fn optimize<'a>(gates: &[&'a str]) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::with_capacity(gates.len());
        for &gate in gates {
            match out.last() {
                Some(&last) if last == gate && Self::self_inverse(gate) => {
                    out.pop();
                }
                _ => out.push(gate),
            }
        }
        out
    }
}

impl OperationModule for QuantumOptimizerPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(
        &self,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let gates: Vec<String> = payload(request)?
            .get("gates")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                OperationError::InvalidRequest("payload must contain a \"gates\" array".into())
            })?
            .iter()
            .map(|g| {
                g.as_str()
                    .map(str::to_lowercase)
                    .ok_or_else(|| OperationError::InvalidRequest("gate names must be strings".into()))
            })
            .collect::<Result<_, _>>()?;
        ctx.check_deadline()?;

        let names: Vec<&str> = gates.iter().map(String::as_str).collect();
        let optimized = Self::optimize(&names);
        let original_depth = names.len();
        let optimized_depth = optimized.len();
        let reduction_percent = if original_depth == 0 {
            0.0
        } else {
            100.0 * (original_depth - optimized_depth) as f64 / original_depth as f64
        };

        Ok(OperationOutput::Plugin(json!({
            "original_depth": original_depth,
            "optimized_depth": optimized_depth,
            "reduction_percent": reduction_percent,
            "optimized": optimized,
        })))
    }
}

impl Plugin for QuantumOptimizerPlugin {
    fn initialize(&self) -> Result<(), OperationError> {
        info!(plugin = Self::NAME, "[QuantumOptimizer] Loading gate tables");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OperationError> {
        info!(plugin = Self::NAME, "[QuantumOptimizer] Unloading");
        Ok(())
    }
}

/// Register and load every bundled plugin.
pub fn install_bundled(engine: &Engine) -> Result<(), EngineError> {
    engine.register_plugin(ExamplePlugin::descriptor(), Arc::new(ExamplePlugin::default()))?;
    engine.register_plugin(
        QuantumOptimizerPlugin::descriptor(),
        Arc::new(QuantumOptimizerPlugin),
    )?;
    engine.load_plugin(ExamplePlugin::NAME)?;
    engine.load_plugin(QuantumOptimizerPlugin::NAME)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::BufferPools;

    #[test]
    fn test_optimizer_cancels_adjacent_pairs() {
        assert_eq!(
            QuantumOptimizerPlugin::optimize(&["h", "x", "x", "h", "t"]),
            vec!["t"]
        );
        assert_eq!(
            QuantumOptimizerPlugin::optimize(&["t", "t", "cnot"]),
            vec!["t", "t", "cnot"]
        );
    }

    #[test]
    fn test_optimizer_reports_depths() {
        let buffers = BufferPools::new(16, 1);
        let ctx = ExecutionContext::unbounded(&buffers);
        let request = OperationRequest::plugin(
            QuantumOptimizerPlugin::NAME,
            json!({"gates": ["H", "H", "x", "cnot"]}),
        );
        let OperationOutput::Plugin(out) = QuantumOptimizerPlugin.execute(&request, &ctx).unwrap()
        else {
            panic!("expected plugin output");
        };
        assert_eq!(out["original_depth"], 4);
        assert_eq!(out["optimized_depth"], 2);
        assert_eq!(out["reduction_percent"], 50.0);
    }

    #[test]
    fn test_optimizer_rejects_bad_payload() {
        let buffers = BufferPools::new(16, 1);
        let ctx = ExecutionContext::unbounded(&buffers);
        let request = OperationRequest::plugin(QuantumOptimizerPlugin::NAME, json!({"depth": 3}));
        assert!(matches!(
            QuantumOptimizerPlugin.execute(&request, &ctx),
            Err(OperationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_example_plugin_counts_calls() {
        let buffers = BufferPools::new(16, 1);
        let ctx = ExecutionContext::unbounded(&buffers);
        let plugin = ExamplePlugin::default();
        let request = OperationRequest::plugin(ExamplePlugin::NAME, json!("ping"));
        plugin.execute(&request, &ctx).unwrap();
        let OperationOutput::Plugin(out) = plugin.execute(&request, &ctx).unwrap() else {
            panic!("expected plugin output");
        };
        assert_eq!(out["calls"], 2);
        assert_eq!(out["echo"], "ping");
        assert_eq!(plugin.status(), "ACTIVE (2 calls)");
    }
}
