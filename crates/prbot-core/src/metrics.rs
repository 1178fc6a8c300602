//! Process-wide counters for bot decisions.
//!
//! Counters are bumped at the call site; [`Metrics::flush`] emits them as a
//! single `info!` event at the end of an invocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    checks_run: AtomicU64,
    reviews_dismissed: AtomicU64,
    runs_deleted: AtomicU64,
    runs_rerun: AtomicU64,
    comments_authorized: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            checks_run: AtomicU64::new(0),
            reviews_dismissed: AtomicU64::new(0),
            runs_deleted: AtomicU64::new(0),
            runs_rerun: AtomicU64::new(0),
            comments_authorized: AtomicU64::new(0),
        }
    }

    pub fn inc_checks(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_run", "counter incremented");
    }

    pub fn add_reviews_dismissed(&self, n: u64) {
        self.reviews_dismissed.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "reviews_dismissed", n, "counter incremented");
    }

    pub fn inc_runs_deleted(&self) {
        self.runs_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_deleted", "counter incremented");
    }

    pub fn inc_runs_rerun(&self) {
        self.runs_rerun.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_rerun", "counter incremented");
    }

    pub fn inc_comments_authorized(&self) {
        self.comments_authorized.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "comments_authorized", "counter incremented");
    }

    /// Emit all current counter values as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            checks_run = self.checks_run(),
            reviews_dismissed = self.reviews_dismissed(),
            runs_deleted = self.runs_deleted(),
            runs_rerun = self.runs_rerun(),
            comments_authorized = self.comments_authorized(),
        );
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    pub fn reviews_dismissed(&self) -> u64 {
        self.reviews_dismissed.load(Ordering::Relaxed)
    }

    pub fn runs_deleted(&self) -> u64 {
        self.runs_deleted.load(Ordering::Relaxed)
    }

    pub fn runs_rerun(&self) -> u64 {
        self.runs_rerun.load(Ordering::Relaxed)
    }

    pub fn comments_authorized(&self) -> u64 {
        self.comments_authorized.load(Ordering::Relaxed)
    }
}
