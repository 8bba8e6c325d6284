//! Jobs and the job control API.
//!
//! - **Job**: one collection run with a checked state machine
//! - **JobService**: admits jobs under the per-owner cap, spawns them on the
//!   orchestrator and cancels or joins them
//!
//! # Lifecycle
//!
//! ```text
//!   pending ──► running ──► completed
//!      │           ├──────► failed
//!      │           └──────► cancelled
//!      └──────────────────► cancelled
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use revival_scout::scheduler::{JobFilters, JobService, JobSettings};
//!
//! let service = JobService::new(orchestrator);
//! let filters = JobFilters {
//!     language: Some("Rust".into()),
//!     min_stars: Some(500),
//!     ..Default::default()
//! };
//! let job_id = service
//!     .start_job("alice", "dormant rust", filters, JobSettings::default())
//!     .await?;
//! let job = service.wait_for(job_id).await?;
//! println!("{} high-potential repositories", job.results.high_potential);
//! ```

pub mod job;
pub mod service;

pub use job::{
    validate_repository, validate_request, AnalysisDepth, Job, JobFilters, JobLogEntry,
    JobProgress, JobResults, JobSettings, JobStatus, LogLevel, PipelinePhase,
    DEFAULT_LOG_CAPACITY, MAX_RESULTS_LIMIT,
};
pub use service::JobService;
