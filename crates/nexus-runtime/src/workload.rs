//! Mixed benchmark workload.
//!
//! Drives the engine through all three submission paths: blocking `submit`
//! from a blocking thread, `submit_async` handles awaited together, and
//! `submit_batch`.

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use nexus_telemetry::log_event;
use tracing::debug;

use nexus_core::{Engine, EngineError, OperationRequest, TaskHandle, TaskResult};

use crate::plugins::{ExamplePlugin, QuantumOptimizerPlugin};

const BINARY_OPS: &[&str] = &[
    "xor",
    "and",
    "or",
    "not",
    "shl",
    "rotr",
    "popcount",
    "hamming",
    "leading_zeros",
    "trailing_zeros",
];
const BIT_VECTOR_OPS: &[&str] = &["xor", "and", "or", "not"];
const MATRIX_OPS: &[&str] = &["zeros", "ones", "identity", "random"];
const MATRIX_COMPUTE_OPS: &[&str] = &["add", "multiply", "determinant", "inverse", "statistics"];
const QUANTUM_OPS: &[&str] = &[
    "superposition",
    "hadamard",
    "pauli_x",
    "bell",
    "measure",
    "entanglement",
];
const HASH_ALGOS: &[&str] = &[
    "sha256",
    "sha3_256",
    "blake2b_256",
    "blake3",
    "murmur3",
    "xxhash64",
    "siphash",
];

/// Deterministic request generator.
pub struct RequestMix {
    rng: StdRng,
}

impl RequestMix {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.gen_range(0..options.len())]
    }

    fn square(&mut self, n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|_| (0..n).map(|_| self.rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    pub fn next_request(&mut self) -> OperationRequest {
        match self.rng.gen_range(0..100u32) {
            0..=29 => {
                let op = self.pick(BINARY_OPS);
                OperationRequest::binary(op, self.rng.gen(), Some(self.rng.gen_range(0..64)))
            }
            30..=34 => {
                let op = self.pick(BIT_VECTOR_OPS);
                let len = self.rng.gen_range(1..=256);
                let a = (0..len).map(|_| self.rng.gen()).collect();
                let b = (0..len).map(|_| self.rng.gen()).collect();
                OperationRequest::bit_vector(op, a, b)
            }
            35..=44 => {
                let op = self.pick(MATRIX_OPS);
                let n = self.rng.gen_range(4..=64);
                OperationRequest::matrix(op, n, n)
            }
            45..=49 => {
                let op = self.pick(MATRIX_COMPUTE_OPS);
                let n = self.rng.gen_range(2..=16);
                let a = self.square(n);
                let b = self.square(n);
                OperationRequest::matrix_binary(op, a, b)
            }
            50..=64 => {
                let op = self.pick(QUANTUM_OPS);
                let qubits = self.rng.gen_range(2..=12);
                OperationRequest::quantum(op, qubits, Some(0))
            }
            65..=94 => {
                let algo = self.pick(HASH_ALGOS);
                let len = self.rng.gen_range(16..=4_096);
                let payload: Vec<u8> = (0..len).map(|_| self.rng.gen()).collect();
                OperationRequest::hash(algo, payload)
            }
            96..=99 => OperationRequest::plugin(
                QuantumOptimizerPlugin::NAME,
                json!({"gates": ["h", "x", "x", "cnot", "t", "h", "h"]}),
            ),
            _ => OperationRequest::plugin(ExamplePlugin::NAME, json!({"source": "workload"})),
        }
    }
}

/// Outcome counts for one workload run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rejected at admission (queue full)
    pub rejected: usize,
    pub elapsed: Duration,
}

impl WorkloadReport {
    fn tally(&mut self, result: &TaskResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: WorkloadReport) {
        self.submitted += other.submitted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.rejected += other.rejected;
    }
}

fn admit(
    report: &mut WorkloadReport,
    admitted: Result<TaskHandle, EngineError>,
) -> Result<Option<TaskHandle>, EngineError> {
    report.submitted += 1;
    match admitted {
        Ok(handle) => Ok(Some(handle)),
        Err(EngineError::QueueFull { .. }) => {
            report.rejected += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Blocking submissions, run on a blocking thread.
fn run_sync(engine: &Engine, mix: &mut RequestMix, ops: usize) -> Result<WorkloadReport, EngineError> {
    let mut report = WorkloadReport::default();
    for _ in 0..ops {
        report.submitted += 1;
        match engine.submit(mix.next_request()) {
            Ok(result) => report.tally(&result),
            Err(EngineError::QueueFull { .. }) => report.rejected += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

async fn run_async(
    engine: &Engine,
    mix: &mut RequestMix,
    ops: usize,
) -> Result<WorkloadReport, EngineError> {
    let mut report = WorkloadReport::default();
    let mut handles = Vec::with_capacity(ops);
    for _ in 0..ops {
        if let Some(handle) = admit(&mut report, engine.submit_async(mix.next_request()))? {
            handles.push(handle);
        }
    }
    for result in join_all(handles).await {
        report.tally(&result);
    }
    Ok(report)
}

async fn run_batches(
    engine: &Engine,
    mix: &mut RequestMix,
    ops: usize,
) -> Result<WorkloadReport, EngineError> {
    let mut report = WorkloadReport::default();
    let batch_size = engine.config().batch_size.max(1);
    let mut remaining = ops;

    while remaining > 0 {
        let count = remaining.min(batch_size);
        remaining -= count;
        let requests: Vec<_> = (0..count).map(|_| mix.next_request()).collect();

        report.submitted += count;
        match engine.submit_batch(requests) {
            Ok(handles) => {
                for result in join_all(handles).await {
                    report.tally(&result);
                }
            }
            Err(EngineError::QueueFull { .. }) => report.rejected += count,
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Run `ops` operations split across the three submission paths.
pub async fn run_mixed(engine: Arc<Engine>, ops: usize, seed: u64) -> anyhow::Result<WorkloadReport> {
    let started = Instant::now();
    let sync_ops = ops / 4;
    let batch_ops = ops / 4;
    let async_ops = ops - sync_ops - batch_ops;

    let sync_engine = Arc::clone(&engine);
    let sync_task = tokio::task::spawn_blocking(move || {
        let mut mix = RequestMix::seeded(seed);
        run_sync(&sync_engine, &mut mix, sync_ops)
    });

    let mut mix = RequestMix::seeded(seed.wrapping_add(1));
    let mut report = run_async(&engine, &mut mix, async_ops).await?;
    debug!(?report, "[Workload] Async phase finished");

    report.merge(run_batches(&engine, &mut mix, batch_ops).await?);
    report.merge(sync_task.await??);
    report.elapsed = started.elapsed();

    log_event!(
        info,
        "workload",
        "Workload finished",
        submitted = report.submitted,
        succeeded = report.succeeded,
        failed = report.failed,
        rejected = report.rejected,
        elapsed_ms = report.elapsed.as_millis() as u64
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{EngineConfigBuilder, OperationKind};

    #[test]
    fn test_request_mix_is_deterministic() {
        let mut a = RequestMix::seeded(7);
        let mut b = RequestMix::seeded(7);
        for _ in 0..50 {
            assert_eq!(a.next_request(), b.next_request());
        }
    }

    #[test]
    fn test_request_mix_covers_builtin_kinds() {
        let mut mix = RequestMix::seeded(42);
        let kinds: std::collections::BTreeSet<OperationKind> =
            (0..500).map(|_| mix.next_request().kind()).collect();
        assert!(kinds.contains(&OperationKind::Binary));
        assert!(kinds.contains(&OperationKind::Matrix));
        assert!(kinds.contains(&OperationKind::Quantum));
        assert!(kinds.contains(&OperationKind::Hash));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mixed_workload_accounts_for_every_operation() {
        let config = EngineConfigBuilder::new()
            .num_threads(2)
            .queue_capacity(1_024)
            .batch_size(16)
            .build()
            .unwrap();
        let engine = Arc::new(Engine::new(config).unwrap());
        crate::plugins::install_bundled(&engine).unwrap();
        engine.start(2).unwrap();

        let report = run_mixed(Arc::clone(&engine), 200, 1).await.unwrap();
        assert_eq!(report.submitted, 200);
        assert_eq!(report.succeeded + report.failed + report.rejected, 200);
        assert_eq!(
            engine.metrics().total_operations as usize,
            report.succeeded + report.failed
        );

        engine.stop().unwrap();
    }
}
