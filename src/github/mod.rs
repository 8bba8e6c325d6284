//! Repository data source: GitHub signal types, the source trait and its
//! REST implementation.
//!
//! Signal groups are fetched independently so collection depth can decide
//! how many calls to spend per repository:
//! - [`RepositorySignal`]: the search-result snapshot
//! - [`RepositoryMetrics`]: detailed popularity numbers
//! - [`ActivitySignals`]: commits, releases and pull requests
//! - [`QualitySignals`]: file listings and README text

pub mod client;
pub mod query;
pub mod source;
pub mod types;

pub use client::GitHubClient;
pub use query::{build_query, validate_repo_name, SearchFilters};
pub use source::{cost, RepositorySource};
pub use types::{
    ActivitySignals, ApiResponse, QualitySignals, QuotaCategory, RateLimitInfo,
    RepositoryMetrics, RepositorySignal, SearchPage,
};
