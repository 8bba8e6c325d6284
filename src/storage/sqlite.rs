//! SQLite-backed job and repository store.
//!
//! Each job and each repository record is one JSON document in its own row.
//! The columns next to the document exist only for filtering and ordering.

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use super::{JobStore, RepositoryQuery, RepositoryRecord, RepositoryStore};
use crate::error::StoreError;
use crate::scheduler::Job;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              TEXT    PRIMARY KEY,
    owner_id        TEXT    NOT NULL,
    status          TEXT    NOT NULL,
    created_at      TEXT    NOT NULL,
    document        TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_jobs_owner_status ON jobs(owner_id, status);

CREATE TABLE IF NOT EXISTS repositories (
    id              INTEGER PRIMARY KEY,
    full_name       TEXT    NOT NULL,
    language        TEXT,
    potential_score REAL    NOT NULL,
    document        TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_repositories_score ON repositories(potential_score);
"#;

/// Store backed by a SQLite file (or `:memory:`).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = path, "Revival store opened");
        Ok(Self { pool })
    }

    fn decode<T: serde::de::DeserializeOwned>(
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<T, StoreError> {
        let document: String = row.try_get("document")?;
        Ok(serde_json::from_str(&document)?)
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT document FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn upsert_job(&self, job: &Job) -> Result<(), StoreError> {
        let document = serde_json::to_string(job)?;
        sqlx::query(
            "INSERT INTO jobs (id, owner_id, status, created_at, document, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                document = excluded.document,
                updated_at = datetime('now')",
        )
        .bind(job.id.to_string())
        .bind(&job.owner_id)
        .bind(job.status().as_str())
        .bind(job.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            "SELECT document FROM jobs WHERE owner_id = ?1
            ORDER BY created_at DESC, id ASC LIMIT ?2",
        )
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn count_active_jobs(&self, owner_id: &str) -> Result<usize, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS active FROM jobs
            WHERE owner_id = ?1 AND status IN ('pending', 'running')",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        let active: i64 = row.try_get("active")?;
        Ok(active.max(0) as usize)
    }
}

#[async_trait]
impl RepositoryStore for SqliteStore {
    async fn get_repository(&self, id: u64) -> Result<Option<RepositoryRecord>, StoreError> {
        let row = sqlx::query("SELECT document FROM repositories WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), StoreError> {
        let document = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO repositories (id, full_name, language, potential_score, document, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                language = excluded.language,
                potential_score = excluded.potential_score,
                document = excluded.document,
                updated_at = datetime('now')",
        )
        .bind(record.id() as i64)
        .bind(record.full_name())
        .bind(record.signal().language.as_deref().map(str::to_lowercase))
        .bind(record.potential_score())
        .bind(document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<Vec<RepositoryRecord>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT document FROM repositories WHERE 1 = 1");

        if let Some(ref ids) = query.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id as i64);
            }
            separated.push_unseparated(")");
        }
        if let Some(min) = query.min_score {
            qb.push(" AND potential_score >= ").push_bind(min);
        }
        if let Some(ref language) = query.language {
            qb.push(" AND language = ").push_bind(language.to_lowercase());
        }
        qb.push(" ORDER BY potential_score DESC, id ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }
}
