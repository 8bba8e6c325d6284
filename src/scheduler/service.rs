//! Job control API: start, inspect, cancel and list collection jobs.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::job::{validate_request, Job, JobFilters, JobSettings};
use crate::error::JobError;
use crate::pipeline::PipelineOrchestrator;
use crate::storage::JobStore;

/// Task handle and cancellation token of a spawned job. The handle is taken
/// while a caller awaits the job.
struct RunningJob {
    cancel: CancellationToken,
    handle: Option<JoinHandle<Job>>,
}

impl RunningJob {
    fn is_live(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(true, |handle| !handle.is_finished())
    }
}

/// Owns the spawned job tasks.
///
/// Admission (the per-owner cap check plus the initial insert) runs under a
/// single async mutex, so two concurrent starts for the same owner cannot
/// both pass the check.
pub struct JobService {
    orchestrator: Arc<PipelineOrchestrator>,
    jobs: Arc<dyn JobStore>,
    admission: tokio::sync::Mutex<()>,
    running: Mutex<HashMap<Uuid, RunningJob>>,
    shutdown: CancellationToken,
}

impl JobService {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        let jobs = Arc::clone(orchestrator.job_store());
        Self {
            orchestrator,
            jobs,
            admission: tokio::sync::Mutex::new(()),
            running: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<PipelineOrchestrator> {
        &self.orchestrator
    }

    /// Validate, admit and spawn a new job.
    ///
    /// # Errors
    ///
    /// - `JobError::Validation` for a malformed request
    /// - `JobError::ConcurrencyLimitExceeded` when the owner already has the
    ///   maximum number of pending or running jobs
    ///
    /// In both cases nothing is written to the store.
    pub async fn start_job(
        &self,
        owner_id: &str,
        name: &str,
        filters: JobFilters,
        settings: JobSettings,
    ) -> Result<Uuid, JobError> {
        validate_request(owner_id, name, &filters, &settings)?;
        if self.shutdown.is_cancelled() {
            return Err(JobError::Validation("job service is shutting down".into()));
        }

        let config = self.orchestrator.config();
        let _admission = self.admission.lock().await;

        let active = self.jobs.count_active_jobs(owner_id).await?;
        let limit = config.max_active_jobs_per_owner;
        if active >= limit {
            warn!(owner_id = owner_id, active, limit, "Job rejected: concurrency limit");
            return Err(JobError::ConcurrencyLimitExceeded {
                owner_id: owner_id.to_string(),
                active,
                limit,
            });
        }

        let job = Job::new(owner_id, name, filters, settings, Utc::now())
            .with_log_capacity(config.log_capacity);
        let job_id = job.id;

        // Registered before the first write so a cancel racing the insert
        // reaches the token instead of the stored document.
        let cancel = self.shutdown.child_token();
        {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            running.retain(|_, entry| entry.is_live());
            running.insert(
                job_id,
                RunningJob {
                    cancel: cancel.clone(),
                    handle: None,
                },
            );
        }

        if let Err(err) = self.jobs.upsert_job(&job).await {
            self.running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&job_id);
            return Err(err.into());
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move { orchestrator.run(job, cancel).await });
        if let Some(entry) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&job_id)
        {
            entry.handle = Some(handle);
        }

        info!(job_id = %job_id, owner_id = owner_id, name = name, "Job admitted");
        Ok(job_id)
    }

    /// Current job document.
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<Job, JobError> {
        self.jobs
            .get_job(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    /// Request cancellation of a job owned by `owner_id`.
    ///
    /// Returns false when the job does not exist, belongs to someone else, or
    /// is already terminal. A job with a task is cancelled through its token
    /// and stops at the next batch boundary; only its orchestrator writes the
    /// cancelled state. A job without a task is marked cancelled directly.
    pub async fn cancel_job(&self, job_id: Uuid, owner_id: &str) -> Result<bool, JobError> {
        let Some(job) = self.jobs.get_job(job_id).await? else {
            return Ok(false);
        };
        if job.owner_id != owner_id || job.is_terminal() {
            return Ok(false);
        }

        if self.signal_task(job_id) {
            return Ok(true);
        }

        // No task: admission also guards pruning, so the stored copy re-read
        // here is current.
        let _admission = self.admission.lock().await;
        if self.signal_task(job_id) {
            return Ok(true);
        }
        let Some(mut job) = self.jobs.get_job(job_id).await? else {
            return Ok(false);
        };
        if job.is_terminal() {
            return Ok(false);
        }
        job.cancel(Utc::now())?;
        self.jobs.upsert_job(&job).await?;
        info!(job_id = %job_id, "Orphaned job cancelled");
        Ok(true)
    }

    /// Fire the token of a job whose task is still running.
    fn signal_task(&self, job_id: Uuid) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.get(&job_id) {
            Some(entry) if entry.is_live() => {
                entry.cancel.cancel();
                info!(job_id = %job_id, "Cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Jobs of `owner_id`, newest first.
    pub async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, JobError> {
        Ok(self.jobs.list_jobs(owner_id, limit).await?)
    }

    /// Wait for a spawned job to finish and return its final document.
    ///
    /// For a job not spawned by this service the stored document is returned.
    pub async fn wait_for(&self, job_id: Uuid) -> Result<Job, JobError> {
        let handle = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&job_id)
            .and_then(|entry| entry.handle.take());

        let Some(handle) = handle else {
            return self.get_job_status(job_id).await;
        };
        let joined = handle.await;
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);

        joined.map_err(|err| JobError::Phase {
            phase: "runtime".to_string(),
            message: format!("job task aborted: {}", err),
        })
    }

    /// Number of spawned jobs whose task has not finished.
    pub fn live_jobs(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// Cancel every live job and join all tasks.
    pub async fn shutdown(&self) -> Vec<Job> {
        info!("Shutting down job service");
        self.shutdown.cancel();

        let entries: Vec<(Uuid, RunningJob)> = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        let mut finished = Vec::with_capacity(entries.len());
        for (job_id, entry) in entries {
            // Awaited by a `wait_for` caller; the token above already fired.
            let Some(handle) = entry.handle else {
                continue;
            };
            match handle.await {
                Ok(job) => finished.push(job),
                Err(e) => error!(job_id = %job_id, error = %e, "Job task panicked during shutdown"),
            }
        }

        info!(joined = finished.len(), "Job service shutdown complete");
        finished
    }
}
