//! The repository data source abstraction.

use async_trait::async_trait;
use std::collections::HashMap;

use super::types::{
    ActivitySignals, ApiResponse, QualitySignals, QuotaCategory, RateLimitInfo,
    RepositoryMetrics, SearchPage,
};
use crate::error::SourceError;

/// Number of API calls each operation spends against its quota category.
pub mod cost {
    pub const SEARCH: u32 = 1;
    pub const METRICS: u32 = 2;
    pub const ACTIVITY: u32 = 4;
    pub const QUALITY: u32 = 4;
}

/// A source of repository signals.
///
/// Implementations report quota metadata on every response when they have it
/// and classify failures into [`SourceError`] variants. Callers should route
/// every call through [`crate::ratelimit::RateLimitedClient`].
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Run a repository search. `page` is 1-indexed.
    async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<SearchPage>, SourceError>;

    async fn get_metrics(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<RepositoryMetrics>, SourceError>;

    async fn get_activity(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<ActivitySignals>, SourceError>;

    async fn get_quality(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<QualitySignals>, SourceError>;

    /// Current quota state for every category.
    async fn get_rate_limit(&self) -> Result<HashMap<QuotaCategory, RateLimitInfo>, SourceError>;
}
