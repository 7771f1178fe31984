//! Pruning metrics tracking
//!
//! Thread-safe metrics collection for reconciliation passes using atomic
//! counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Thread-safe metrics for tracking pruning operations
#[derive(Debug, Clone)]
pub struct PruneMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Number of passes that ran to completion
    passes_completed: AtomicUsize,
    /// Number of passes that failed on a store operation
    passes_failed: AtomicUsize,
    /// Total owned records evaluated across passes
    records_evaluated: AtomicUsize,
    /// Records skipped for missing or unparseable revisions
    records_skipped: AtomicUsize,
    /// Records deleted (or counted as deleted in dry-run mode)
    records_deleted: AtomicUsize,
    /// Delete operations that failed
    delete_failures: AtomicUsize,
    /// Total pass duration in milliseconds
    total_duration_ms: AtomicU64,
}

impl Default for PruneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PruneMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                passes_completed: AtomicUsize::new(0),
                passes_failed: AtomicUsize::new(0),
                records_evaluated: AtomicUsize::new(0),
                records_skipped: AtomicUsize::new(0),
                records_deleted: AtomicUsize::new(0),
                delete_failures: AtomicUsize::new(0),
                total_duration_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Record a completed pass and its duration
    pub fn record_pass_completed(&self, duration: Duration) {
        self.inner.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed pass and its duration
    pub fn record_pass_failed(&self, duration: Duration) {
        self.inner.passes_failed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record owned records evaluated in a pass
    pub fn record_records_evaluated(&self, count: usize) {
        self.inner
            .records_evaluated
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record records skipped for unparseable revisions
    pub fn record_records_skipped(&self, count: usize) {
        self.inner
            .records_skipped
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record deleted records
    pub fn record_records_deleted(&self, count: usize) {
        self.inner
            .records_deleted
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failed delete operation
    pub fn record_delete_failure(&self) {
        self.inner.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of completed passes
    pub fn passes_completed(&self) -> usize {
        self.inner.passes_completed.load(Ordering::Relaxed)
    }

    /// Get the number of failed passes
    pub fn passes_failed(&self) -> usize {
        self.inner.passes_failed.load(Ordering::Relaxed)
    }

    /// Get the total records evaluated
    pub fn records_evaluated(&self) -> usize {
        self.inner.records_evaluated.load(Ordering::Relaxed)
    }

    /// Get the total records skipped
    pub fn records_skipped(&self) -> usize {
        self.inner.records_skipped.load(Ordering::Relaxed)
    }

    /// Get the total records deleted
    pub fn records_deleted(&self) -> usize {
        self.inner.records_deleted.load(Ordering::Relaxed)
    }

    /// Get the number of failed deletes
    pub fn delete_failures(&self) -> usize {
        self.inner.delete_failures.load(Ordering::Relaxed)
    }

    /// Get the total pass duration in milliseconds
    pub fn total_duration_ms(&self) -> u64 {
        self.inner.total_duration_ms.load(Ordering::Relaxed)
    }

    /// Calculate the average pass duration
    pub fn avg_pass_duration_ms(&self) -> f64 {
        let total_ms = self.total_duration_ms() as f64;
        let passes = (self.passes_completed() + self.passes_failed()) as f64;

        if passes > 0.0 { total_ms / passes } else { 0.0 }
    }

    /// Get a summary of all metrics
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            passes_completed: self.passes_completed(),
            passes_failed: self.passes_failed(),
            records_evaluated: self.records_evaluated(),
            records_skipped: self.records_skipped(),
            records_deleted: self.records_deleted(),
            delete_failures: self.delete_failures(),
            avg_pass_duration_ms: self.avg_pass_duration_ms(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub passes_completed: usize,
    pub passes_failed: usize,
    pub records_evaluated: usize,
    pub records_skipped: usize,
    pub records_deleted: usize,
    pub delete_failures: usize,
    pub avg_pass_duration_ms: f64,
}

impl MetricsSummary {
    /// Log the metrics summary
    pub fn log(&self) {
        tracing::info!(
            passes_completed = self.passes_completed,
            passes_failed = self.passes_failed,
            records_evaluated = self.records_evaluated,
            records_skipped = self.records_skipped,
            records_deleted = self.records_deleted,
            delete_failures = self.delete_failures,
            avg_pass_duration_ms = self.avg_pass_duration_ms,
            "Pruning metrics summary"
        );
    }
}
