//! High-level recording helpers over the raw Prometheus statics.

use super::prometheus::{
    API_CALLS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, PIPELINE_ITEMS_TOTAL, QUOTA_REMAINING,
    QUOTA_WAITS_TOTAL, QUOTA_WAIT_SECONDS, REVIVAL_SCORE,
};

/// Records revival-scout operational metrics.
///
/// Every method silently does nothing before `init_metrics()` has run, so
/// library code can record unconditionally.
///
/// # Example
///
/// ```ignore
/// use revival_scout::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics()?;
/// let collector = MetricsCollector::new();
/// collector.record_api_call("search", "success");
/// collector.record_revival_score(72.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one data source call.
    ///
    /// `outcome` is one of `success`, `quota_exhausted`, `transient`, `permanent`.
    pub fn record_api_call(&self, category: &str, outcome: &str) {
        if let Some(calls) = API_CALLS_TOTAL.get() {
            calls.with_label_values(&[category, outcome]).inc();
        }

        tracing::trace!(category = category, outcome = outcome, "Recorded API call");
    }

    pub fn set_quota_remaining(&self, category: &str, remaining: u32) {
        if let Some(gauge) = QUOTA_REMAINING.get() {
            gauge.with_label_values(&[category]).set(remaining as f64);
        }
    }

    /// Record a wait for a quota reset.
    pub fn record_quota_wait(&self, category: &str, wait_secs: f64) {
        if let Some(waits) = QUOTA_WAITS_TOTAL.get() {
            waits.with_label_values(&[category]).inc();
        }
        if let Some(duration) = QUOTA_WAIT_SECONDS.get() {
            duration.with_label_values(&[category]).observe(wait_secs);
        }

        tracing::trace!(category = category, wait_secs = wait_secs, "Recorded quota wait");
    }

    pub fn record_job_started(&self) {
        if let Some(gauge) = JOBS_IN_PROGRESS.get() {
            gauge.inc();
        }
    }

    /// Record a job leaving the running state with `status`.
    pub fn record_job_finished(&self, status: &str, was_running: bool) {
        if let Some(jobs) = JOBS_TOTAL.get() {
            jobs.with_label_values(&[status]).inc();
        }
        if was_running {
            if let Some(gauge) = JOBS_IN_PROGRESS.get() {
                gauge.dec();
            }
        }

        tracing::trace!(status = status, "Recorded job completion");
    }

    /// Record one repository processed by a phase.
    pub fn record_item(&self, phase: &str, outcome: &str) {
        if let Some(items) = PIPELINE_ITEMS_TOTAL.get() {
            items.with_label_values(&[phase, outcome]).inc();
        }
    }

    pub fn record_revival_score(&self, score: f64) {
        if let Some(histogram) = REVIVAL_SCORE.get() {
            histogram.observe(score);
        }
    }
}
