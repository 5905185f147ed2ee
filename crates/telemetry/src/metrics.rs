//! In-process metrics for the URL cache and analytics queue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last-written value.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Millisecond latency histogram.
#[derive(Debug, Default)]
pub struct Histogram {
    /// Upper bounds: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, +inf
    buckets: [AtomicU64; 9],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    const BOUNDS: [u64; 8] = [10, 50, 100, 250, 500, 1000, 2500, 5000];

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// `(upper_bound_ms, count)` pairs; the overflow bucket reports `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, c)| (bound, c.load(Ordering::Relaxed)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    // Analytics queue
    pub events_tracked: Counter,
    pub events_rejected: Counter,
    pub events_dropped_overflow: Counter,
    pub events_sent: Counter,
    pub events_requeued: Counter,
    pub batches_sent: Counter,
    pub send_failures: Counter,
    pub persist_failures: Counter,
    pub queue_depth: Gauge,
    pub flush_latency_ms: Histogram,

    // Signed URL cache
    pub url_cache_hits: Counter,
    pub url_cache_misses: Counter,
    pub url_passthrough: Counter,
    pub url_sign_failures: Counter,
    pub sign_latency_ms: Histogram,
}

/// Point-in-time copy for status logging.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_tracked: u64,
    pub events_sent: u64,
    pub events_requeued: u64,
    pub send_failures: u64,
    pub persist_failures: u64,
    pub queue_depth: u64,
    pub flush_latency_mean_ms: f64,
    pub url_cache_hits: u64,
    pub url_cache_misses: u64,
    pub url_sign_failures: u64,
    pub sign_latency_mean_ms: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_tracked: self.events_tracked.get(),
            events_sent: self.events_sent.get(),
            events_requeued: self.events_requeued.get(),
            send_failures: self.send_failures.get(),
            persist_failures: self.persist_failures.get(),
            queue_depth: self.queue_depth.get(),
            flush_latency_mean_ms: self.flush_latency_ms.mean(),
            url_cache_hits: self.url_cache_hits.get(),
            url_cache_misses: self.url_cache_misses.get(),
            url_sign_failures: self.url_sign_failures.get(),
            sign_latency_mean_ms: self.sign_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
