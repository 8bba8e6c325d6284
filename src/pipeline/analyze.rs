//! Analyze phase: rescore every collected repository.

use chrono::Utc;
use futures::future::join_all;

use super::collect::{describe, ItemError};
use super::orchestrator::{Halt, PhaseContext, PipelineOrchestrator};
use crate::scheduler::{LogLevel, PipelinePhase};

impl PipelineOrchestrator {
    pub(crate) async fn analyze_phase(
        &self,
        ctx: &mut PhaseContext,
        collected: &[u64],
    ) -> Result<(), Halt> {
        let total = collected.len() as u64;
        let batch_size = self.config.batch_size.max(1);
        let threshold = self.config.high_potential_threshold;

        tracing::info!(job_id = %ctx.job.id, total, "Analyze phase started");
        self.report(ctx, PipelinePhase::Analyze, 0, total).await?;

        let mut processed = 0u64;
        for (index, batch) in collected.chunks(batch_size).enumerate() {
            if index > 0 {
                ctx.pause(self.config.batch_delay).await?;
            } else {
                ctx.checkpoint()?;
            }

            let outcomes = join_all(batch.iter().map(|id| self.analyze_one(*id))).await;

            let mut store_failure = None;
            for (id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(score) => {
                        ctx.job.results.analyzed += 1;
                        if score >= threshold {
                            ctx.job.results.high_potential += 1;
                        }
                        self.metrics.record_item("analyze", "success");
                        self.metrics.record_revival_score(score);
                    }
                    Err(ItemError::Store(err)) => {
                        self.metrics.record_item("analyze", "store_error");
                        store_failure.get_or_insert(err);
                    }
                    Err(err) => {
                        ctx.job.results.errors += 1;
                        self.metrics.record_item("analyze", "skipped");
                        ctx.log(LogLevel::Warn, describe(*id, &err));
                    }
                }
            }

            processed += batch.len() as u64;
            self.report(ctx, PipelinePhase::Analyze, processed, total)
                .await?;
            if let Some(err) = store_failure {
                return Err(Halt::from(err));
            }
        }

        let high_potential = ctx.job.results.high_potential;
        ctx.log(
            LogLevel::Info,
            format!(
                "Analyzed {} repositories, {} with high revival potential",
                ctx.job.results.analyzed, high_potential
            ),
        );
        tracing::info!(
            job_id = %ctx.job.id,
            analyzed = ctx.job.results.analyzed,
            high_potential,
            "Analyze phase finished"
        );
        Ok(())
    }

    /// Recompute the assessment from the stored groups and save it.
    async fn analyze_one(&self, id: u64) -> Result<f64, ItemError> {
        let mut record = self
            .repositories
            .get_repository(id)
            .await?
            .ok_or(ItemError::Missing(id))?;
        let score = record.rescore(&self.engine, Utc::now()).potential_score;
        self.repositories.upsert_repository(&record).await?;
        Ok(score)
    }
}
