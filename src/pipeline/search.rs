//! Search phase: page through search results and seed repository records.

use chrono::Utc;

use super::orchestrator::{Halt, PhaseContext, PipelineOrchestrator};
use crate::error::JobError;
use crate::github::{build_query, validate_repo_name, RepositorySignal};
use crate::scheduler::{LogLevel, PipelinePhase, MAX_RESULTS_LIMIT};
use crate::storage::{RepositoryRecord, SignalUpdate};

impl PipelineOrchestrator {
    /// Accept up to `max_results` repositories into the job.
    ///
    /// Stops at the result cap, an empty or short page, the reported total,
    /// or the 1000-result search window. A page that still fails after
    /// retries fails the job.
    pub(crate) async fn search_phase(&self, ctx: &mut PhaseContext) -> Result<(), Halt> {
        let settings = ctx.job.settings.clone();
        let query = build_query(&ctx.job.filters, settings.include_forks);
        let max_results = settings.max_results.min(MAX_RESULTS_LIMIT) as u64;
        let per_page = self.config.search_page_size;

        ctx.log(LogLevel::Info, format!("Searching: {}", query));
        tracing::info!(job_id = %ctx.job.id, query = %query, "Search phase started");
        self.report(ctx, PipelinePhase::Search, 0, max_results).await?;

        let mut page = 1u32;
        let mut skipped = 0u64;
        loop {
            ctx.checkpoint()?;

            let result = self
                .client
                .search(&query, page, per_page)
                .await
                .map_err(|err| {
                    Halt::Failed(JobError::Phase {
                        phase: PipelinePhase::Search.to_string(),
                        message: format!("page {}: {}", page, err),
                    })
                })?;

            let page_len = result.items.len();
            for signal in result.items {
                if ctx.job.results.found >= max_results {
                    break;
                }
                if (signal.archived && !settings.include_archived)
                    || (signal.fork && !settings.include_forks)
                {
                    skipped += 1;
                    continue;
                }
                self.accept(ctx, signal).await?;
            }

            let found = ctx.job.results.found;
            let target = max_results.min(result.total_count).max(found);
            self.report(ctx, PipelinePhase::Search, found, target).await?;

            let fetched = page as u64 * per_page as u64;
            let exhausted = page_len == 0
                || page_len < per_page as usize
                || fetched >= result.total_count
                || fetched >= MAX_RESULTS_LIMIT as u64;
            if ctx.job.results.found >= max_results || exhausted {
                break;
            }

            page += 1;
            ctx.pause(self.config.batch_delay).await?;
        }

        let found = ctx.job.results.found;
        ctx.log(
            LogLevel::Info,
            format!("Search found {} repositories ({} filtered out)", found, skipped),
        );
        tracing::info!(job_id = %ctx.job.id, found, skipped, "Search phase finished");
        self.report(ctx, PipelinePhase::Search, found, found).await
    }

    /// Record one search hit: create a minimal record, or refresh the signal
    /// of a repository seen by an earlier job. Malformed items are skipped.
    async fn accept(&self, ctx: &mut PhaseContext, signal: RepositorySignal) -> Result<(), Halt> {
        if let Err(reason) = validate_repo_name(&signal.full_name) {
            ctx.job.results.errors += 1;
            ctx.log(LogLevel::Warn, format!("Skipping search result: {}", reason));
            self.metrics.record_item("search", "invalid");
            return Ok(());
        }

        let id = signal.id;
        if ctx.job.results.repository_ids.contains(&id) {
            return Ok(());
        }

        let now = Utc::now();
        let record = match self.repositories.get_repository(id).await? {
            Some(mut existing) => {
                existing.apply(
                    SignalUpdate {
                        signal: Some(signal),
                        ..Default::default()
                    },
                    ctx.job.id,
                    &self.engine,
                    now,
                );
                existing
            }
            None => RepositoryRecord::from_signal(signal, ctx.job.id, &self.engine, now),
        };
        self.repositories.upsert_repository(&record).await?;

        ctx.job.record_found(id);
        self.metrics.record_item("search", "success");
        tracing::debug!(
            job_id = %ctx.job.id,
            repository = %record.full_name(),
            "Repository accepted"
        );
        Ok(())
    }
}
