//! Latency and throughput metrics.
//!
//! Workers record one [`MetricSample`] per finished task. Totals and per-kind
//! counts are lock-free atomics; latencies are kept in a bounded rolling
//! window (oldest samples evicted first) behind a `parking_lot::Mutex` held
//! only for a push or a copy.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsCollector::new(1_000_000);
//! metrics.record_operation(OperationKind::Hash, Duration::from_micros(42), true);
//! println!("{}", metrics.aggregate().to_json()?);
//! ```

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::domain::OperationKind;

/// One finished task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub latency_us: u64,
    pub success: bool,
    pub kind: OperationKind,
    pub timestamp: Instant,
}

impl MetricSample {
    pub fn new(kind: OperationKind, latency: Duration, success: bool) -> Self {
        Self {
            latency_us: u64::try_from(latency.as_micros()).unwrap_or(u64::MAX),
            success,
            kind,
            timestamp: Instant::now(),
        }
    }
}

/// Latency order statistics in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencyPercentiles {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

impl LatencyPercentiles {
    /// Compute from an ascending slice.
    fn from_sorted(sorted: &[u64]) -> Self {
        if sorted.is_empty() {
            return Self::default();
        }
        let sum: u128 = sorted.iter().map(|&v| u128::from(v)).sum();
        Self {
            p50: percentile(sorted, 0.50),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
            p999: percentile(sorted, 0.999),
            mean: sum as f64 / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Order statistic at `p` over an ascending slice: 0-indexed
/// `floor(p * n)`, clamped to the last element. Zero for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (p * sorted.len() as f64).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Aggregated view of the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMetrics {
    pub total_operations: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub latency_us: LatencyPercentiles,
    pub throughput_ops_sec: f64,
    pub operations_by_kind: BTreeMap<OperationKind, u64>,
    pub queue_depth: usize,
    pub uptime_seconds: f64,
    /// Samples the latency statistics were computed over.
    pub sample_count: usize,
}

impl AggregatedMetrics {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

const KIND_COUNT: usize = OperationKind::ALL.len();

fn kind_index(kind: OperationKind) -> usize {
    match kind {
        OperationKind::Binary => 0,
        OperationKind::Matrix => 1,
        OperationKind::Quantum => 2,
        OperationKind::Hash => 3,
        OperationKind::Plugin => 4,
    }
}

fn error_rate(total: u64, errors: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    errors as f64 / total as f64
}

/// Thread-safe metrics accumulator shared by every worker.
pub struct MetricsCollector {
    window: usize,
    samples: Mutex<VecDeque<MetricSample>>,
    total_operations: AtomicU64,
    total_errors: AtomicU64,
    by_kind: [AtomicU64; KIND_COUNT],
    queue_depth: AtomicUsize,
    started_at: RwLock<Instant>,
}

impl MetricsCollector {
    /// Collector retaining at most `window` latency samples.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: Mutex::new(VecDeque::new()),
            total_operations: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            by_kind: Default::default(),
            queue_depth: AtomicUsize::new(0),
            started_at: RwLock::new(Instant::now()),
        }
    }

    pub fn record(&self, sample: MetricSample) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        if !sample.success {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.by_kind[kind_index(sample.kind)].fetch_add(1, Ordering::Relaxed);

        let mut samples = self.samples.lock();
        if samples.len() >= self.window {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn record_operation(&self, kind: OperationKind, latency: Duration, success: bool) {
        self.record(MetricSample::new(kind, latency, success));
    }

    /// Update the queue-depth gauge.
    pub fn record_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.read().elapsed()
    }

    fn operations_by_kind(&self) -> BTreeMap<OperationKind, u64> {
        OperationKind::ALL
            .iter()
            .map(|kind| (*kind, self.by_kind[kind_index(*kind)].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Aggregate every retained sample.
    ///
    /// Copies the latencies under the lock and sorts the copy afterwards:
    /// O(n log n) in the number of retained samples per call. Recording is
    /// never blocked by the sort.
    pub fn aggregate(&self) -> AggregatedMetrics {
        let mut latencies: Vec<u64> = self.samples.lock().iter().map(|s| s.latency_us).collect();
        latencies.sort_unstable();

        let total = self.total_operations();
        let errors = self.total_errors();
        let uptime = self.uptime().as_secs_f64();

        AggregatedMetrics {
            total_operations: total,
            total_errors: errors,
            error_rate: error_rate(total, errors),
            latency_us: LatencyPercentiles::from_sorted(&latencies),
            throughput_ops_sec: if uptime > 0.0 { total as f64 / uptime } else { 0.0 },
            operations_by_kind: self.operations_by_kind(),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            sample_count: latencies.len(),
        }
    }

    /// Aggregate only samples recorded within the last `period`.
    ///
    /// Counts and throughput come from the matching samples instead of the
    /// lifetime counters. Same cost profile as [`aggregate`](Self::aggregate).
    pub fn windowed(&self, period: Duration) -> AggregatedMetrics {
        let cutoff = Instant::now().checked_sub(period);
        let recent: Vec<MetricSample> = self
            .samples
            .lock()
            .iter()
            .filter(|s| cutoff.map_or(true, |cutoff| s.timestamp >= cutoff))
            .copied()
            .collect();

        let mut latencies: Vec<u64> = recent.iter().map(|s| s.latency_us).collect();
        latencies.sort_unstable();

        let total = recent.len() as u64;
        let errors = recent.iter().filter(|s| !s.success).count() as u64;
        let mut by_kind = BTreeMap::new();
        for sample in &recent {
            *by_kind.entry(sample.kind).or_insert(0u64) += 1;
        }

        let uptime = self.uptime();
        let span = period.min(uptime).as_secs_f64();

        AggregatedMetrics {
            total_operations: total,
            total_errors: errors,
            error_rate: error_rate(total, errors),
            latency_us: LatencyPercentiles::from_sorted(&latencies),
            throughput_ops_sec: if span > 0.0 { total as f64 / span } else { 0.0 },
            operations_by_kind: by_kind,
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            uptime_seconds: uptime.as_secs_f64(),
            sample_count: latencies.len(),
        }
    }

    /// Clear every sample and counter and restart the throughput clock.
    pub fn reset(&self) {
        let mut samples = self.samples.lock();
        samples.clear();
        self.total_operations.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        for counter in &self.by_kind {
            counter.store(0, Ordering::Relaxed);
        }
        *self.started_at.write() = Instant::now();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}
