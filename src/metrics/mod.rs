//! Prometheus metrics for API usage, quota waits, jobs and scores.
//!
//! # Example
//!
//! ```ignore
//! use revival_scout::metrics::{export_metrics, init_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_api_call("core", "success");
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    API_CALLS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, PIPELINE_ITEMS_TOTAL, QUOTA_REMAINING,
    QUOTA_WAITS_TOTAL, QUOTA_WAIT_SECONDS, REGISTRY, REVIVAL_SCORE,
};
