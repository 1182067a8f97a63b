//! # NexusEngine Benchmarks
//!
//! | Group | What it measures |
//! |-------|------------------|
//! | `modules` | Single-task module cost, no queueing |
//! | `submission` | Round trip through queue and workers |
//! | `metrics` | Aggregation cost over a full window |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::time::Duration;

use nexus_core::{
    BufferPools, Engine, EngineConfigBuilder, ExecutionContext, HashModule, MatrixModule,
    MetricsCollector, OperationKind, OperationModule, OperationRequest, QuantumModule,
};
use nexus_runtime::RequestMix;

fn bench_modules(c: &mut Criterion) {
    let mut group = c.benchmark_group("modules");
    let buffers = BufferPools::default();
    let ctx = ExecutionContext::unbounded(&buffers);

    for size in [1_024usize, 65_536, 1 << 20] {
        let payload: Vec<u8> = (0..size).map(|_| rand::thread_rng().gen()).collect();
        group.throughput(Throughput::Bytes(size as u64));
        for algo in ["sha256", "blake2b_256", "blake3", "murmur3", "xxhash64"] {
            let request = OperationRequest::hash(algo, payload.clone());
            group.bench_with_input(BenchmarkId::new(algo, size), &request, |b, request| {
                b.iter(|| black_box(HashModule.execute(request, &ctx).is_ok()))
            });
        }
    }

    group.throughput(Throughput::Elements(1));
    for n in [64usize, 256, 1_024] {
        let request = OperationRequest::matrix("random", n, n);
        group.bench_with_input(BenchmarkId::new("matrix_random", n), &request, |b, request| {
            b.iter(|| black_box(MatrixModule.execute(request, &ctx).is_ok()))
        });
    }

    for qubits in [8u32, 16, 20] {
        let request = OperationRequest::quantum("hadamard", qubits, Some(0));
        group.bench_with_input(
            BenchmarkId::new("quantum_hadamard", qubits),
            &request,
            |b, request| b.iter(|| black_box(QuantumModule.execute(request, &ctx).is_ok())),
        );
    }

    group.finish();
}

fn bench_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission");
    group.measurement_time(Duration::from_secs(10));

    for threads in [1usize, 4] {
        let config = EngineConfigBuilder::new()
            .num_threads(threads)
            .queue_capacity(100_000)
            .build()
            .expect("bench config");
        let engine = Engine::new(config).expect("engine");
        engine.start(threads).expect("start");

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("submit_binary", threads), |b| {
            b.iter(|| {
                black_box(
                    engine
                        .submit(OperationRequest::binary("xor", 0xdead, Some(0xbeef)))
                        .map(|r| r.is_success()),
                )
            })
        });

        let batch = 512usize;
        let mut mix = RequestMix::seeded(9);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(BenchmarkId::new("mixed_batch_512", threads), |b| {
            b.iter(|| {
                let requests: Vec<_> = (0..batch).map(|_| mix.next_request()).collect();
                let handles = engine.submit_batch(requests).expect("batch admitted");
                black_box(handles.into_iter().map(|h| h.wait()).count())
            })
        });

        engine.stop().expect("stop");
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    let mut rng = rand::thread_rng();

    for samples in [10_000usize, 1_000_000] {
        let collector = MetricsCollector::new(samples);
        for _ in 0..samples {
            collector.record_operation(
                OperationKind::Hash,
                Duration::from_micros(rng.gen_range(1..5_000)),
                rng.gen_bool(0.99),
            );
        }
        group.bench_with_input(BenchmarkId::new("aggregate", samples), &collector, |b, c| {
            b.iter(|| black_box(c.aggregate().latency_us.p99))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_modules, bench_submission, bench_metrics);
criterion_main!(benches);
