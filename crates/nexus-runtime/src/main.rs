//! # NexusEngine Runtime
//!
//! Demo entry point.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`NEXUS_*` variables)
//! 2. Load engine configuration (`ENGINE_*` variables)
//! 3. Register and load the bundled plugins
//! 4. Start the worker pool
//! 5. Run the mixed workload, print metrics as JSON
//! 6. Stop the engine

use std::sync::Arc;

use anyhow::{Context, Result};

use nexus_core::Engine;
use nexus_runtime::{install_bundled, run_mixed, RuntimeConfig};
use nexus_telemetry::{init_telemetry, log_event, TelemetryConfig};

const WORKLOAD_SEED: u64 = 0x6e65_7875_73;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize logging")?;

    let config = RuntimeConfig::from_env().context("Invalid runtime configuration")?;
    log_event!(
        info,
        "runtime",
        "Starting NexusEngine runtime",
        threads = config.engine.num_threads,
        queue_capacity = config.engine.queue_capacity,
        batch_size = config.engine.batch_size,
        max_qubits = config.engine.max_qubits,
        workload_ops = config.workload_ops
    );

    let engine = Arc::new(Engine::new(config.engine.clone()).context("Failed to create engine")?);
    install_bundled(&engine).context("Failed to load bundled plugins")?;
    for plugin in engine.list_plugins() {
        log_event!(
            info,
            "runtime",
            "Plugin ready",
            plugin = %plugin.name,
            version = %plugin.version,
            state = %plugin.state
        );
    }

    engine
        .start(config.engine.num_threads)
        .context("Failed to start engine")?;
    log_event!(info, "runtime", "Engine started", workers = engine.status().worker_count);

    let report = run_mixed(Arc::clone(&engine), config.workload_ops, WORKLOAD_SEED).await?;
    if report.rejected > 0 {
        log_event!(
            warn,
            "runtime",
            "Some operations were rejected by backpressure",
            rejected = report.rejected
        );
    }

    let metrics = engine.metrics();
    println!(
        "{}",
        metrics.to_json().context("Failed to serialize metrics")?
    );

    let stopper = Arc::clone(&engine);
    let stopped = tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .context("Stop task panicked")?;
    if let Err(e) = &stopped {
        log_event!(error, "runtime", "Engine failed to stop cleanly", error = %e);
    }
    stopped.context("Failed to stop engine")?;
    log_event!(info, "runtime", "Engine stopped", state = %engine.state());

    log_event!(
        info,
        "runtime",
        "NexusEngine runtime finished",
        total_operations = metrics.total_operations,
        error_rate = metrics.error_rate,
        p99_us = metrics.latency_us.p99
    );
    Ok(())
}
