//! Observability metrics: query latency, mutation counts, build history.
//!
//! Recording takes no lock. Latencies go into a fixed log-scale histogram,
//! so memory stays constant however many queries a collection serves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Exact buckets for 0..4us, then 4 sub-buckets per power of two.
const SUB_BUCKETS: usize = 4;
const LATENCY_BUCKETS: usize = SUB_BUCKETS + 62 * SUB_BUCKETS;

fn bucket_of(us: u64) -> usize {
    if us < SUB_BUCKETS as u64 {
        return us as usize;
    }
    let octave = 63 - us.leading_zeros() as usize;
    let sub = ((us >> (octave - 2)) & 0b11) as usize;
    SUB_BUCKETS + (octave - 2) * SUB_BUCKETS + sub
}

/// Exclusive upper bound of `bucket`, in microseconds.
fn bucket_upper_us(bucket: usize) -> u64 {
    if bucket < SUB_BUCKETS {
        return bucket as u64 + 1;
    }
    let octave = (bucket - SUB_BUCKETS) / SUB_BUCKETS + 2;
    let sub = ((bucket - SUB_BUCKETS) % SUB_BUCKETS) as u64;
    let width = 1u64 << (octave - 2);
    (SUB_BUCKETS as u64 + sub + 1).saturating_mul(width)
}

/// Log-scale latency histogram; percentiles are accurate to within 25%.
#[derive(Debug)]
struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKETS],
    count: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
        }
    }

    fn record(&self, duration: Duration) {
        let us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.buckets[bucket_of(us)].fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn mean_us(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum_us.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Upper bound of the bucket holding the `percentile`-th sample.
    fn percentile_us(&self, percentile: f64) -> f64 {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let rank = ((percentile / 100.0) * total as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bucket, &n) in counts.iter().enumerate() {
            seen += n;
            if seen >= rank {
                return bucket_upper_us(bucket) as f64;
            }
        }
        bucket_upper_us(LATENCY_BUCKETS - 1) as f64
    }
}

/// Collects runtime metrics for one collection.
#[derive(Debug)]
pub struct MetricsCollector {
    query_latency: LatencyHistogram,
    total_inserts: AtomicU64,
    total_removes: AtomicU64,
    total_builds: AtomicU64,
    last_build_us: AtomicU64,
}

/// Point-in-time copy of the collected metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub total_inserts: u64,
    pub total_removes: u64,
    pub total_builds: u64,
    pub last_build: Option<Duration>,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            query_latency: LatencyHistogram::new(),
            total_inserts: AtomicU64::new(0),
            total_removes: AtomicU64::new(0),
            total_builds: AtomicU64::new(0),
            last_build_us: AtomicU64::new(0),
        }
    }

    /// Record a query with its duration.
    pub fn record_query(&self, duration: Duration) {
        self.query_latency.record(duration);
    }

    /// Record `count` inserted records.
    pub fn record_inserts(&self, count: usize) {
        self.total_inserts.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a remove operation.
    pub fn record_remove(&self) {
        self.total_removes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published index build.
    pub fn record_build(&self, duration: Duration) {
        let us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.last_build_us.store(us, Ordering::Relaxed);
        self.total_builds.fetch_add(1, Ordering::Release);
    }

    pub fn total_queries(&self) -> u64 {
        self.query_latency.count()
    }

    pub fn total_inserts(&self) -> u64 {
        self.total_inserts.load(Ordering::Relaxed)
    }

    pub fn total_removes(&self) -> u64 {
        self.total_removes.load(Ordering::Relaxed)
    }

    pub fn total_builds(&self) -> u64 {
        self.total_builds.load(Ordering::Acquire)
    }

    /// Average query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> f64 {
        self.query_latency.mean_us()
    }

    /// Estimate a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        self.query_latency.percentile_us(percentile)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_builds = self.total_builds();
        MetricsSnapshot {
            total_queries: self.total_queries(),
            total_inserts: self.total_inserts(),
            total_removes: self.total_removes(),
            total_builds,
            last_build: (total_builds > 0)
                .then(|| Duration::from_micros(self.last_build_us.load(Ordering::Relaxed))),
            avg_query_latency_us: self.avg_query_latency_us(),
            p50_query_latency_us: self.percentile_query_latency_us(50.0),
            p99_query_latency_us: self.percentile_query_latency_us(99.0),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
