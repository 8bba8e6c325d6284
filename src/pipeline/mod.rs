//! Collection and analysis pipeline.
//!
//! A job moves through three phases, each owning a slice of the progress bar:
//!
//! 1. **Search** (0-30%): page through search results for the job filters,
//!    drop archived repositories and forks unless asked for, and seed a
//!    minimal, already-scored record per repository.
//! 2. **Collect** (30-80%): fetch metrics, activity and quality signals in
//!    concurrent batches according to the collection depth, rescoring each
//!    record as its groups arrive.
//! 3. **Analyze** (80-100%): rescore every collected record and count the
//!    ones above the high-potential threshold.
//!
//! Cancellation and the job deadline are checked between batches. Failures
//! of a single repository are logged and counted; failures that cannot be
//! pinned on one repository (a search page, the store) fail the job.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use revival_scout::pipeline::{PipelineConfig, PipelineOrchestrator};
//!
//! let config = PipelineConfig::from_env()?;
//! let orchestrator = PipelineOrchestrator::new(client, store.clone(), store, engine, config);
//! let finished = orchestrator.run(job, CancellationToken::new()).await;
//! println!("{}: {} analyzed", finished.status(), finished.results.analyzed);
//! ```
//!
//! # Configuration
//!
//! See [`PipelineConfig`] for the `REVIVAL_*` environment variables.

mod analyze;
mod collect;
pub mod config;
pub mod orchestrator;
mod search;

pub use config::{ConfigError, ConfigOverrides, PipelineConfig, ENV_PREFIX};
pub use orchestrator::PipelineOrchestrator;
