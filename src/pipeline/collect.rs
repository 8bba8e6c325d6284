//! Collect phase: fetch signal groups for every accepted repository.

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use super::orchestrator::{Halt, PhaseContext, PipelineOrchestrator};
use crate::error::{SourceError, StoreError};
use crate::scheduler::{AnalysisDepth, LogLevel, PipelinePhase};
use crate::storage::{RepositoryRecord, SignalUpdate};

/// Why a single repository could not be processed.
#[derive(Debug)]
pub(crate) enum ItemError {
    /// The source rejected or failed the request; the item is skipped.
    Source(SourceError),
    /// The record disappeared from the store; the item is skipped.
    Missing(u64),
    /// Persistence failed; the job fails once the batch settles.
    Store(StoreError),
}

impl From<SourceError> for ItemError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<StoreError> for ItemError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl PipelineOrchestrator {
    /// Fetch signal groups in concurrent batches. Returns the ids that were
    /// collected successfully.
    pub(crate) async fn collect_phase(&self, ctx: &mut PhaseContext) -> Result<Vec<u64>, Halt> {
        let ids = ctx.job.results.repository_ids.clone();
        let depth = ctx.job.settings.depth;
        let total = ids.len() as u64;
        let batch_size = self.config.batch_size.max(1);

        ctx.log(
            LogLevel::Info,
            format!("Collecting {} repositories at {} depth", total, depth),
        );
        tracing::info!(job_id = %ctx.job.id, total, depth = %depth, "Collect phase started");
        self.report(ctx, PipelinePhase::Collect, 0, total).await?;

        let mut collected = Vec::with_capacity(ids.len());
        let mut processed = 0u64;
        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if index > 0 {
                ctx.pause(self.config.batch_delay).await?;
            } else {
                ctx.checkpoint()?;
            }

            let job_id = ctx.job.id;
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|id| self.collect_one(job_id, depth, *id)),
            )
            .await;

            let mut store_failure = None;
            for (id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => {
                        collected.push(*id);
                        ctx.job.results.collected += 1;
                        self.metrics.record_item("collect", "success");
                        tracing::debug!(
                            job_id = %job_id,
                            repository = %record.full_name(),
                            score = record.potential_score(),
                            "Repository collected"
                        );
                    }
                    Err(ItemError::Store(err)) => {
                        self.metrics.record_item("collect", "store_error");
                        store_failure.get_or_insert(err);
                    }
                    Err(err) => {
                        ctx.job.results.errors += 1;
                        self.metrics.record_item("collect", "skipped");
                        let message = describe(*id, &err);
                        tracing::warn!(
                            job_id = %job_id,
                            repository_id = *id,
                            error = %message,
                            "Skipping repository"
                        );
                        ctx.log(LogLevel::Warn, message);
                    }
                }
            }

            processed += batch.len() as u64;
            self.report(ctx, PipelinePhase::Collect, processed, total)
                .await?;
            if let Some(err) = store_failure {
                return Err(Halt::from(err));
            }
        }

        ctx.log(
            LogLevel::Info,
            format!(
                "Collected {} of {} repositories ({} skipped)",
                collected.len(),
                total,
                total - collected.len() as u64
            ),
        );
        tracing::info!(job_id = %ctx.job.id, collected = collected.len(), "Collect phase finished");
        Ok(collected)
    }

    /// Fetch the groups `depth` asks for, merge them into the record and
    /// rescore.
    async fn collect_one(
        &self,
        job_id: Uuid,
        depth: AnalysisDepth,
        id: u64,
    ) -> Result<RepositoryRecord, ItemError> {
        let mut record = self
            .repositories
            .get_repository(id)
            .await?
            .ok_or(ItemError::Missing(id))?;

        let (owner, name) = match record.owner_and_name() {
            Some((owner, name)) => (owner.to_string(), name.to_string()),
            None => {
                return Err(ItemError::Source(SourceError::invalid(format!(
                    "malformed repository name '{}'",
                    record.full_name()
                ))))
            }
        };

        let metrics = self.client.metrics(&owner, &name).await?;
        let activity = if depth.fetches_activity() {
            Some(self.client.activity(&owner, &name).await?)
        } else {
            None
        };
        let quality = if depth.fetches_quality() {
            Some(self.client.quality(&owner, &name).await?)
        } else {
            None
        };

        record.apply(
            SignalUpdate {
                signal: None,
                metrics: Some(metrics),
                activity,
                quality,
            },
            job_id,
            &self.engine,
            Utc::now(),
        );
        self.repositories.upsert_repository(&record).await?;
        Ok(record)
    }
}

/// Log line for a skipped repository.
pub(crate) fn describe(id: u64, err: &ItemError) -> String {
    match err {
        ItemError::Source(source) => format!("Skipping repository {}: {}", id, source),
        ItemError::Missing(missing) => format!("Repository {} is no longer stored", missing),
        ItemError::Store(store) => format!("Failed to persist repository {}: {}", id, store),
    }
}
