//! Evaluation metrics
//!
//! Tracks how effective the evaluation cache is: hits, misses, early
//! cutoffs and the time spent recomputing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for evaluation cache behaviour
#[derive(Debug, Default)]
pub struct EvalMetrics {
    /// Number of cache hits
    pub hit_count: AtomicU64,

    /// Number of cache misses
    pub miss_count: AtomicU64,

    /// Recomputations whose result matched the cached one
    pub early_cutoff_count: AtomicU64,

    /// Total time spent recomputing (nanoseconds)
    pub total_recompute_time_ns: AtomicU64,

    /// Number of recomputations
    pub recompute_count: AtomicU64,
}

impl EvalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_early_cutoff(&self) {
        self.early_cutoff_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one recomputation and how long it took
    pub fn record_recompute(&self, duration: Duration) {
        self.recompute_count.fetch_add(1, Ordering::Relaxed);
        self.total_recompute_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.hit_count.store(0, Ordering::Relaxed);
        self.miss_count.store(0, Ordering::Relaxed);
        self.early_cutoff_count.store(0, Ordering::Relaxed);
        self.total_recompute_time_ns.store(0, Ordering::Relaxed);
        self.recompute_count.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            early_cutoffs: self.early_cutoff_count.load(Ordering::Relaxed),
            recomputes: self.recompute_count.load(Ordering::Relaxed),
            total_time_ns: self.total_recompute_time_ns.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub early_cutoffs: u64,
    pub recomputes: u64,
    pub total_time_ns: u64,
}

impl MetricsSnapshot {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Fraction of recomputations that reproduced the cached result
    pub fn early_cutoff_rate(&self) -> f64 {
        if self.recomputes == 0 {
            0.0
        } else {
            self.early_cutoffs as f64 / self.recomputes as f64
        }
    }

    pub fn avg_recompute_time(&self) -> Duration {
        if self.recomputes == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_time_ns / self.recomputes)
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  Hits: {} | Misses: {} | Hit Rate: {:.1}%",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Recomputes: {} | Early Cutoffs: {} | Cutoff Rate: {:.1}%",
            self.recomputes,
            self.early_cutoffs,
            self.early_cutoff_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Avg Time: {:.3}ms | Total Time: {:.3}ms",
            self.avg_recompute_time().as_secs_f64() * 1000.0,
            Duration::from_nanos(self.total_time_ns).as_secs_f64() * 1000.0
        )
    }
}
