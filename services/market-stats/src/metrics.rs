//! Pipeline counters
//!
//! Cumulative across batches so a long-running caller can expose them
//! Prometheus-style via `export`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::pipeline::BatchReport;

/// Core metrics for the market statistics pipeline.
pub struct PipelineMetrics {
    pub batches_completed: AtomicU64,
    pub batches_failed: AtomicU64,

    // Ingestion
    pub documents_seen: AtomicU64,
    pub documents_rejected: AtomicU64,
    pub coercion_failures: AtomicU64,

    // Aggregation
    pub partitions: AtomicU64,
    pub records_enriched: AtomicU64,
    pub batch_duration_us: Mutex<DurationTracker>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            batches_completed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            documents_seen: AtomicU64::new(0),
            documents_rejected: AtomicU64::new(0),
            coercion_failures: AtomicU64::new(0),
            partitions: AtomicU64::new(0),
            records_enriched: AtomicU64::new(0),
            batch_duration_us: Mutex::new(DurationTracker::new(256)),
        }
    }

    /// Record a completed batch.
    pub fn record_batch(&self, report: &BatchReport, duration_us: u64) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        self.documents_seen
            .fetch_add(report.documents_seen as u64, Ordering::Relaxed);
        self.documents_rejected
            .fetch_add(report.rejected as u64, Ordering::Relaxed);
        self.coercion_failures
            .fetch_add(report.coercion_failures as u64, Ordering::Relaxed);
        self.partitions
            .fetch_add(report.partitions as u64, Ordering::Relaxed);
        self.records_enriched
            .fetch_add(report.records_enriched as u64, Ordering::Relaxed);
        if let Ok(mut tracker) = self.batch_duration_us.lock() {
            tracker.record(duration_us);
        }
    }

    /// Record a batch that failed with an empty-batch or integrity error.
    pub fn record_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Export counters as a BTreeMap for exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("batches_completed".to_string(), self.batches_completed.load(Ordering::Relaxed));
        m.insert("batches_failed".to_string(), self.batches_failed.load(Ordering::Relaxed));
        m.insert("documents_seen".to_string(), self.documents_seen.load(Ordering::Relaxed));
        m.insert("documents_rejected".to_string(), self.documents_rejected.load(Ordering::Relaxed));
        m.insert("coercion_failures".to_string(), self.coercion_failures.load(Ordering::Relaxed));
        m.insert("partitions".to_string(), self.partitions.load(Ordering::Relaxed));
        m.insert("records_enriched".to_string(), self.records_enriched.load(Ordering::Relaxed));
        if let Ok(tracker) = self.batch_duration_us.lock() {
            if let Some(p99) = tracker.percentile(99) {
                m.insert("batch_duration_us_p99".to_string(), p99);
            }
        }
        m
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded sample of batch durations for percentile calculation.
pub struct DurationTracker {
    samples: Vec<u64>,
    max_samples: usize,
}

impl DurationTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
