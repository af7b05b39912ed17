// Run metrics module
//
// Lightweight counters for relocation and propagation runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected across relocation and propagation runs.
///
/// Uses atomic operations so the same instance can be shared through an
/// `Arc` by the mirror, the rewriter and the propagation engine.
#[derive(Debug)]
pub struct Metrics {
    /// Files copied into a destination project
    pub files_copied: AtomicUsize,

    /// Copies skipped because the destination was not older
    pub files_skipped: AtomicUsize,

    /// Copies that failed
    pub copy_failures: AtomicUsize,

    /// Path-reference records rewritten
    pub records_rewritten: AtomicUsize,

    /// Path-reference records that could not be rewritten
    pub records_unresolved: AtomicUsize,

    /// Light-link directives dropped by the asset filter
    pub directives_dropped: AtomicUsize,

    /// Render-layer members dropped
    pub members_dropped: AtomicUsize,

    /// Render layers created
    pub layers_created: AtomicUsize,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_copied: AtomicUsize::new(0),
            files_skipped: AtomicUsize::new(0),
            copy_failures: AtomicUsize::new(0),
            records_rewritten: AtomicUsize::new(0),
            records_unresolved: AtomicUsize::new(0),
            directives_dropped: AtomicUsize::new(0),
            members_dropped: AtomicUsize::new(0),
            layers_created: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_copied(&self) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_copy_failure(&self) {
        self.copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rewritten(&self) {
        self.records_rewritten.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved(&self) {
        self.records_unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directives_dropped(&self, count: usize) {
        self.directives_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_member_dropped(&self) {
        self.members_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_layer_created(&self) {
        self.layers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} copied, {} skipped (destination newer), {} failed",
            self.files_copied.load(Ordering::Relaxed),
            self.files_skipped.load(Ordering::Relaxed),
            self.copy_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Path records: {} rewritten, {} unresolved",
            self.records_rewritten.load(Ordering::Relaxed),
            self.records_unresolved.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Lighting: {} layers created, {} members dropped, {} light links dropped",
            self.layers_created.load(Ordering::Relaxed),
            self.members_dropped.load(Ordering::Relaxed),
            self.directives_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
