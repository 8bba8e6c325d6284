//! Persistence for jobs and repository records.
//!
//! The pipeline only talks to the [`JobStore`] and [`RepositoryStore`] traits.
//! Every write replaces one whole document, so a reader never sees a job or a
//! record half-updated.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: process-local maps, used by tests and one-off runs
//! - [`SqliteStore`]: SQLite file with one JSON document per row
//!
//! # Usage
//!
//! ```rust,ignore
//! use revival_scout::storage::{RepositoryQuery, RepositoryStore, SqliteStore};
//!
//! let store = SqliteStore::open("revival.db").await?;
//! let top = store
//!     .find_repositories(&RepositoryQuery::new().with_min_score(65.0).with_limit(10))
//!     .await?;
//! ```

pub mod memory;
pub mod record;
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::scheduler::Job;

pub use memory::MemoryStore;
pub use record::{RepositoryRecord, SignalUpdate};
pub use sqlite::SqliteStore;

/// Job persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Insert or replace the whole job document.
    async fn upsert_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Jobs of `owner_id`, newest first, at most `limit`.
    async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Number of pending or running jobs of `owner_id`.
    async fn count_active_jobs(&self, owner_id: &str) -> Result<usize, StoreError>;
}

/// Repository record persistence.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn get_repository(&self, id: u64) -> Result<Option<RepositoryRecord>, StoreError>;

    /// Insert or replace the whole record.
    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), StoreError>;

    /// Records matching `query`, highest potential score first.
    async fn find_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<Vec<RepositoryRecord>, StoreError>;
}

/// Filter for [`RepositoryStore::find_repositories`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryQuery {
    /// Restrict to these repository ids.
    pub ids: Option<Vec<u64>>,
    pub min_score: Option<f64>,
    /// Case-insensitive primary language.
    pub language: Option<String>,
    pub limit: Option<usize>,
}

impl RepositoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, ids: Vec<u64>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes every filter except the limit.
    pub fn matches(&self, record: &RepositoryRecord) -> bool {
        if let Some(ref ids) = self.ids {
            if !ids.contains(&record.id()) {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if record.potential_score() < min {
                return false;
            }
        }
        if let Some(ref language) = self.language {
            let matches = record
                .signal()
                .language
                .as_deref()
                .is_some_and(|l| l.eq_ignore_ascii_case(language));
            if !matches {
                return false;
            }
        }
        true
    }
}

/// Sort by potential score descending, then id, and apply the limit.
pub(crate) fn rank_records(records: &mut Vec<RepositoryRecord>, limit: Option<usize>) {
    records.sort_by(|a, b| {
        b.potential_score()
            .total_cmp(&a.potential_score())
            .then(a.id().cmp(&b.id()))
    });
    if let Some(limit) = limit {
        records.truncate(limit);
    }
}
