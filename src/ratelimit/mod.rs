//! Rate-limited access to the repository data source.
//!
//! [`RateLimitCache`] is constructed once per process and injected into every
//! [`RateLimitedClient`], so all jobs share the same view of the API quota.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use revival_scout::github::GitHubClient;
//! use revival_scout::ratelimit::{RateLimitCache, RateLimitedClient};
//!
//! let cache = Arc::new(RateLimitCache::default());
//! let client = RateLimitedClient::new(Arc::new(GitHubClient::from_env()), cache);
//! let metrics = client.metrics("rust-lang", "rustlings").await?;
//! ```

pub mod cache;
pub mod client;

pub use cache::{RateLimitCache, DEFAULT_QUOTA_TTL};
pub use client::{
    ClientConfig, ClientStats, ClientTelemetry, RateLimitedClient, DEFAULT_BASE_RETRY_DELAY,
    DEFAULT_MAX_RETRIES,
};
