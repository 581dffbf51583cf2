// Performance metrics module
//
// Lightweight counters for imports and Blender runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Import and export counters.
///
/// Uses atomic operations so the same instance can be shared with a front-end
/// thread without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Imports that produced at least one asset
    pub imports_succeeded: AtomicUsize,

    /// Imports that failed for any reason other than the user cancelling
    pub imports_failed: AtomicUsize,

    /// Imports the user cancelled (options prompt or unresponsive Blender)
    pub imports_cancelled: AtomicUsize,

    /// Times the export script actually ran
    pub exports_run: AtomicUsize,

    /// Times a previous export was reused
    pub exports_skipped: AtomicUsize,

    /// Time spent waiting on Blender, in milliseconds
    pub total_blender_time_ms: AtomicU64,

    /// Number of Blender invocations
    pub blender_runs: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            imports_succeeded: AtomicUsize::new(0),
            imports_failed: AtomicUsize::new(0),
            imports_cancelled: AtomicUsize::new(0),
            exports_run: AtomicUsize::new(0),
            exports_skipped: AtomicUsize::new(0),
            total_blender_time_ms: AtomicU64::new(0),
            blender_runs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_import_succeeded(&self) {
        self.imports_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_import_failed(&self) {
        self.imports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_import_cancelled(&self) {
        self.imports_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_run(&self) {
        self.exports_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_skipped(&self) {
        self.exports_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one Blender invocation and how long it took
    pub fn record_blender_run(&self, duration: Duration) {
        self.blender_runs.fetch_add(1, Ordering::Relaxed);
        self.total_blender_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average Blender run time in milliseconds
    pub fn avg_blender_time_ms(&self) -> f64 {
        let total = self.total_blender_time_ms.load(Ordering::Relaxed);
        let count = self.blender_runs.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Import Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Imports: {} succeeded, {} failed, {} cancelled",
            self.imports_succeeded.load(Ordering::Relaxed),
            self.imports_failed.load(Ordering::Relaxed),
            self.imports_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Exports: {} run, {} skipped",
            self.exports_run.load(Ordering::Relaxed),
            self.exports_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Blender time: {:.2}s over {} runs (avg: {:.2}ms)",
            self.total_blender_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.blender_runs.load(Ordering::Relaxed),
            self.avg_blender_time_ms()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.imports_succeeded.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.exports_run.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_import_outcomes() {
        let metrics = Metrics::new();

        metrics.record_import_succeeded();
        metrics.record_import_succeeded();
        metrics.record_import_failed();
        metrics.record_import_cancelled();
        metrics.record_export_run();
        metrics.record_export_skipped();

        assert_eq!(metrics.imports_succeeded.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.imports_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.imports_cancelled.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.exports_run.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.exports_skipped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_blender_time() {
        let metrics = Metrics::new();

        metrics.record_blender_run(Duration::from_millis(100));
        metrics.record_blender_run(Duration::from_millis(200));

        assert_eq!(metrics.total_blender_time_ms.load(Ordering::Relaxed), 300);
        assert_eq!(metrics.avg_blender_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_blender_time_no_runs() {
        let metrics = Metrics::new();
        assert_eq!(metrics.avg_blender_time_ms(), 0.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
