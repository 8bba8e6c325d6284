//! Drives one job through search, collect and analyze.
//!
//! The orchestrator is the only writer of a running job's document. It saves
//! the job after every batch and at every status transition, so a reader
//! polling the store sees progress batch by batch.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::PipelineConfig;
use crate::error::{JobError, StoreError};
use crate::metrics::MetricsCollector;
use crate::ratelimit::RateLimitedClient;
use crate::scheduler::{Job, JobStatus, LogLevel, PipelinePhase};
use crate::scoring::ScoringEngine;
use crate::storage::{JobStore, RepositoryStore};

/// Why a run stopped before completing.
#[derive(Debug)]
pub(crate) enum Halt {
    /// The job's cancellation token fired.
    Cancelled,
    /// A failure not attributable to a single repository.
    Failed(JobError),
}

impl From<JobError> for Halt {
    fn from(err: JobError) -> Self {
        Self::Failed(err)
    }
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        Self::Failed(JobError::Store(err))
    }
}

/// Mutable state of one run.
pub(crate) struct PhaseContext {
    pub(crate) job: Job,
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl PhaseContext {
    fn new(job: Job, cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            job,
            cancel,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Checked between batches: stop if cancelled or past the deadline.
    pub(crate) fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(Halt::Failed(JobError::DeadlineExceeded(
                self.timeout.as_secs(),
            )));
        }
        Ok(())
    }

    /// Sleep for `delay`, waking early on cancellation.
    pub(crate) async fn pause(&self, delay: Duration) -> Result<(), Halt> {
        if !delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Halt::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.checkpoint()
    }

    pub(crate) fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.job.log(level, message, Utc::now());
    }
}

/// Runs jobs against a rate-limited source and the stores.
pub struct PipelineOrchestrator {
    pub(crate) client: Arc<RateLimitedClient>,
    pub(crate) jobs: Arc<dyn JobStore>,
    pub(crate) repositories: Arc<dyn RepositoryStore>,
    pub(crate) engine: Arc<ScoringEngine>,
    pub(crate) config: PipelineConfig,
    pub(crate) metrics: MetricsCollector,
}

impl PipelineOrchestrator {
    pub fn new(
        client: Arc<RateLimitedClient>,
        jobs: Arc<dyn JobStore>,
        repositories: Arc<dyn RepositoryStore>,
        engine: Arc<ScoringEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            jobs,
            repositories,
            engine,
            config,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<RateLimitedClient> {
        &self.client
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn repository_store(&self) -> &Arc<dyn RepositoryStore> {
        &self.repositories
    }

    /// Run `job` to a terminal state and return its final document.
    ///
    /// `job` must be pending. A token cancelled before the run starts moves
    /// the job straight to cancelled. If the stored copy is already terminal
    /// it is returned untouched.
    pub async fn run(&self, job: Job, cancel: CancellationToken) -> Job {
        let job_id = job.id;
        let mut ctx = PhaseContext::new(job, cancel, self.config.job_timeout);

        // A job cancelled between admission and this point is already final.
        match self.jobs.get_job(job_id).await {
            Ok(Some(stored)) if stored.is_terminal() => {
                tracing::info!(
                    job_id = %job_id,
                    status = %stored.status(),
                    "Job already finished, not starting"
                );
                return stored;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "Cannot read stored job state");
            }
        }

        if ctx.cancel.is_cancelled() {
            if let Err(err) = ctx.job.cancel(Utc::now()) {
                tracing::warn!(job_id = %job_id, error = %err, "Cannot cancel job");
            }
            self.finish(&ctx, false).await;
            return ctx.job;
        }

        if let Err(err) = ctx.job.start(Utc::now()) {
            tracing::warn!(job_id = %job_id, error = %err, "Job is not runnable");
            return ctx.job;
        }
        self.metrics.record_job_started();
        tracing::info!(
            job_id = %job_id,
            owner_id = %ctx.job.owner_id,
            depth = %ctx.job.settings.depth,
            max_results = ctx.job.settings.max_results,
            "Job started"
        );

        let outcome = match self.save(&ctx).await {
            Ok(()) => {
                match tokio::time::timeout(self.config.job_timeout, self.run_phases(&mut ctx))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Halt::Failed(JobError::DeadlineExceeded(
                        self.config.job_timeout.as_secs(),
                    ))),
                }
            }
            Err(err) => Err(Halt::from(err)),
        };

        let now = Utc::now();
        let transition = match outcome {
            Ok(()) => ctx.job.complete(now),
            Err(Halt::Cancelled) => {
                ctx.log(LogLevel::Info, "Cancelled at a batch boundary");
                ctx.job.cancel(now)
            }
            Err(Halt::Failed(err)) => {
                tracing::error!(job_id = %job_id, error = %err, "Job failed");
                ctx.log(LogLevel::Error, err.to_string());
                ctx.job.fail(err.to_string(), now)
            }
        };
        if let Err(err) = transition {
            tracing::warn!(job_id = %job_id, error = %err, "Unexpected job transition");
        }

        self.finish(&ctx, true).await;
        ctx.job
    }

    async fn run_phases(&self, ctx: &mut PhaseContext) -> Result<(), Halt> {
        self.search_phase(ctx).await?;
        let collected = self.collect_phase(ctx).await?;
        self.analyze_phase(ctx, &collected).await
    }

    /// Persist the terminal document and record metrics.
    async fn finish(&self, ctx: &PhaseContext, was_running: bool) {
        let status = ctx.job.status();
        if let Err(err) = self.save(ctx).await {
            tracing::error!(
                job_id = %ctx.job.id,
                status = %status,
                error = %err,
                "Failed to persist final job state"
            );
        }
        self.metrics
            .record_job_finished(status.as_str(), was_running);

        match status {
            JobStatus::Completed => tracing::info!(
                job_id = %ctx.job.id,
                found = ctx.job.results.found,
                collected = ctx.job.results.collected,
                analyzed = ctx.job.results.analyzed,
                high_potential = ctx.job.results.high_potential,
                errors = ctx.job.results.errors,
                "Job completed"
            ),
            JobStatus::Cancelled => tracing::info!(
                job_id = %ctx.job.id,
                collected = ctx.job.results.collected,
                "Job cancelled"
            ),
            _ => {}
        }
    }

    pub(crate) async fn save(&self, ctx: &PhaseContext) -> Result<(), StoreError> {
        self.jobs.upsert_job(&ctx.job).await
    }

    /// Update progress for `phase` and persist the job.
    pub(crate) async fn report(
        &self,
        ctx: &mut PhaseContext,
        phase: PipelinePhase,
        current: u64,
        total: u64,
    ) -> Result<(), Halt> {
        ctx.job.set_progress(phase, current, total);
        self.save(ctx).await?;
        Ok(())
    }
}
