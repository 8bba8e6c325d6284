//! Error types for revival-scout operations.
//!
//! Errors are split by the subsystem that raises them:
//! - Repository data source calls (quota, transient and permanent failures)
//! - Persistence (job and repository stores)
//! - Job control and pipeline execution

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by a repository data source.
///
/// The variant decides how the rate-limited client reacts: quota exhaustion
/// waits for the reset, transient errors are retried with backoff, permanent
/// errors fail immediately.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The API quota for the category is spent until `reset_at`.
    #[error("API quota exhausted{}", reset_suffix(.reset_at))]
    QuotaExhausted { reset_at: Option<DateTime<Utc>> },

    /// A failure that may succeed on retry (5xx, timeouts, dropped connections).
    #[error("Transient source error: {0}")]
    Transient(String),

    /// A failure that will not succeed on retry (404, 422, malformed payloads).
    #[error("Permanent source error{}: {message}", status_suffix(.status))]
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

impl SourceError {
    /// Create a permanent error carrying an HTTP status.
    pub fn permanent(status: u16, message: impl Into<String>) -> Self {
        Self::Permanent {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a permanent error with no HTTP status (decode failures, bad input).
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the error should be retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the error signals quota exhaustion.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }

    /// HTTP status for permanent errors, when known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } => *status,
            _ => None,
        }
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" until {}", at.to_rfc3339()),
        None => String::new(),
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Errors raised by job and repository stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the job control API and the pipeline orchestrator.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job request is malformed; no job was created.
    #[error("Invalid job request: {0}")]
    Validation(String),

    /// The owner already has the maximum number of non-terminal jobs.
    #[error("Owner '{owner_id}' already has {active} active jobs (limit {limit})")]
    ConcurrencyLimitExceeded {
        owner_id: String,
        active: usize,
        limit: usize,
    },

    #[error("Job '{0}' not found")]
    NotFound(Uuid),

    #[error("Invalid job transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// A failure that cannot be attributed to a single repository.
    #[error("{phase} phase failed: {message}")]
    Phase { phase: String, message: String },

    /// The job ran past its configured deadline.
    #[error("Job exceeded its deadline of {0} seconds")]
    DeadlineExceeded(u64),

    #[error("Persistence failure: {0}")]
    Store(#[from] StoreError),
}

impl JobError {
    /// Whether the request was rejected before any job record was written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ConcurrencyLimitExceeded { .. }
        )
    }
}
