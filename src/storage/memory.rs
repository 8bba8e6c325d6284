//! In-process store backed by `RwLock`ed maps.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{rank_records, JobStore, RepositoryQuery, RepositoryRecord, RepositoryStore};
use crate::error::StoreError;
use crate::scheduler::Job;

/// Jobs and repository records held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    repositories: RwLock<HashMap<u64, RepositoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn repository_count(&self) -> usize {
        self.repositories.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn upsert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<Job> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn count_active_jobs(&self, owner_id: &str) -> Result<usize, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.owner_id == owner_id && !job.is_terminal())
            .count())
    }
}

#[async_trait]
impl RepositoryStore for MemoryStore {
    async fn get_repository(&self, id: u64) -> Result<Option<RepositoryRecord>, StoreError> {
        Ok(self.repositories.read().await.get(&id).cloned())
    }

    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), StoreError> {
        self.repositories
            .write()
            .await
            .insert(record.id(), record.clone());
        Ok(())
    }

    async fn find_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<Vec<RepositoryRecord>, StoreError> {
        let repositories = self.repositories.read().await;
        let mut found: Vec<RepositoryRecord> = repositories
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        rank_records(&mut found, query.limit);
        Ok(found)
    }
}
