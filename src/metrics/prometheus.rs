//! Prometheus metrics registration and export.
//!
//! All metrics live in one registry created by [`init_metrics`]. Until that
//! runs, the statics are empty and recording is a no-op.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all revival-scout metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Data source calls, labeled by quota category and outcome.
pub static API_CALLS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Last observed remaining quota, labeled by category.
pub static QUOTA_REMAINING: OnceLock<GaugeVec> = OnceLock::new();

/// Number of waits for a quota reset, labeled by category.
pub static QUOTA_WAITS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Length of quota waits in seconds, labeled by category.
pub static QUOTA_WAIT_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

/// Jobs that reached a terminal state, labeled by status.
pub static JOBS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Jobs currently running.
pub static JOBS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Repositories processed by a pipeline phase, labeled by phase and outcome.
pub static PIPELINE_ITEMS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Distribution of revival potential scores.
pub static REVIVAL_SCORE: OnceLock<Histogram> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling it more than once is harmless; the first registry wins.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let api_calls_total = CounterVec::new(
        Opts::new("revival_api_calls_total", "Data source calls by outcome"),
        &["category", "outcome"],
    )?;

    let quota_remaining = GaugeVec::new(
        Opts::new("revival_quota_remaining", "Remaining API quota"),
        &["category"],
    )?;

    let quota_waits_total = CounterVec::new(
        Opts::new("revival_quota_waits_total", "Waits for a quota reset"),
        &["category"],
    )?;

    let quota_wait_seconds = HistogramVec::new(
        HistogramOpts::new("revival_quota_wait_seconds", "Quota reset wait duration")
            .buckets(vec![1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["category"],
    )?;

    let jobs_total = CounterVec::new(
        Opts::new("revival_jobs_total", "Jobs by terminal status"),
        &["status"],
    )?;

    let jobs_in_progress = Gauge::new("revival_jobs_in_progress", "Jobs currently running")?;

    let pipeline_items_total = CounterVec::new(
        Opts::new(
            "revival_pipeline_items_total",
            "Repositories processed by pipeline phase",
        ),
        &["phase", "outcome"],
    )?;

    let revival_score = Histogram::with_opts(
        HistogramOpts::new("revival_potential_score", "Distribution of revival scores")
            .buckets(vec![10.0, 20.0, 35.0, 50.0, 65.0, 80.0, 90.0, 100.0]),
    )?;

    registry.register(Box::new(api_calls_total.clone()))?;
    registry.register(Box::new(quota_remaining.clone()))?;
    registry.register(Box::new(quota_waits_total.clone()))?;
    registry.register(Box::new(quota_wait_seconds.clone()))?;
    registry.register(Box::new(jobs_total.clone()))?;
    registry.register(Box::new(jobs_in_progress.clone()))?;
    registry.register(Box::new(pipeline_items_total.clone()))?;
    registry.register(Box::new(revival_score.clone()))?;

    // A concurrent initializer may have won; its metrics stay in place.
    let _ = REGISTRY.set(registry);
    let _ = API_CALLS_TOTAL.set(api_calls_total);
    let _ = QUOTA_REMAINING.set(quota_remaining);
    let _ = QUOTA_WAITS_TOTAL.set(quota_waits_total);
    let _ = QUOTA_WAIT_SECONDS.set(quota_wait_seconds);
    let _ = JOBS_TOTAL.set(jobs_total);
    let _ = JOBS_IN_PROGRESS.set(jobs_in_progress);
    let _ = PIPELINE_ITEMS_TOTAL.set(pipeline_items_total);
    let _ = REVIVAL_SCORE.set(revival_score);

    tracing::info!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
