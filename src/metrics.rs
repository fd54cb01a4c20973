// Scan metrics
//
// Lock-free counters updated by batch workers and summarized once a batch ends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Batch-wide scan counters.
///
/// Uses atomic operations so workers can record without locks.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Logs analyzed with every stage succeeding
    pub logs_scanned: AtomicUsize,

    /// Logs that could not be read or had no recognizable segments
    pub logs_failed: AtomicUsize,

    /// Logs analyzed with at least one degraded stage
    pub logs_partial: AtomicUsize,

    /// Results served from the analysis cache
    pub cache_hits: AtomicUsize,

    /// Total analysis time in milliseconds
    pub total_analysis_time_ms: AtomicU64,

    /// Reports written to disk
    pub reports_written: AtomicUsize,

    /// Times the resource monitor changed the worker count
    pub worker_resizes: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            logs_scanned: AtomicUsize::new(0),
            logs_failed: AtomicUsize::new(0),
            logs_partial: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            total_analysis_time_ms: AtomicU64::new(0),
            reports_written: AtomicUsize::new(0),
            worker_resizes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scanned(&self) {
        self.logs_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.logs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial(&self) {
        self.logs_partial.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report_written(&self) {
        self.reports_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_resize(&self) {
        self.worker_resizes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis_time(&self, duration: Duration) {
        self.total_analysis_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Logs that reached the analyzer, whatever the outcome
    pub fn logs_processed(&self) -> usize {
        self.logs_scanned.load(Ordering::Relaxed)
            + self.logs_failed.load(Ordering::Relaxed)
            + self.logs_partial.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average analysis time per processed log in milliseconds
    pub fn avg_analysis_time_ms(&self) -> f64 {
        let total = self.total_analysis_time_ms.load(Ordering::Relaxed);
        let count = self.logs_processed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Logs: {} scanned, {} partial, {} failed, {} from cache",
            self.logs_scanned.load(Ordering::Relaxed),
            self.logs_partial.load(Ordering::Relaxed),
            self.logs_failed.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total analysis time: {:.2}s (avg: {:.2}ms per log)",
            self.total_analysis_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_analysis_time_ms()
        );
        tracing::info!(
            "Reports written: {}, worker resizes: {}",
            self.reports_written.load(Ordering::Relaxed),
            self.worker_resizes.load(Ordering::Relaxed)
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
