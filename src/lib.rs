//! revival-scout: find abandoned GitHub repositories worth reviving.
//!
//! This library searches a repository data source, collects signals through
//! a rate-limited client and scores each repository's revival potential in
//! a three-phase job pipeline.

pub mod cli;
pub mod error;
pub mod github;
pub mod metrics;
pub mod pipeline;
pub mod ratelimit;
pub mod scheduler;
pub mod scoring;
pub mod storage;

pub use error::{JobError, SourceError, StoreError};
pub use pipeline::{PipelineConfig, PipelineOrchestrator};
pub use ratelimit::{RateLimitCache, RateLimitedClient};
pub use scheduler::{Job, JobService, JobStatus};
pub use scoring::{RevivalAssessment, ScoringEngine};
