//! Quota-aware, retrying wrapper around a [`RepositorySource`].

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::cache::RateLimitCache;
use crate::error::SourceError;
use crate::github::{
    cost, ActivitySignals, ApiResponse, QualitySignals, QuotaCategory, RateLimitInfo,
    RepositoryMetrics, RepositorySource, SearchPage,
};
use crate::metrics::MetricsCollector;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Retry and quota-wait settings for [`RateLimitedClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Retries allowed for transient failures. Quota waits never count.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Extra time slept past a reported reset.
    pub reset_buffer: Duration,
    /// Wait used when an exhausted response carries no reset time.
    pub fallback_wait: Duration,
    /// Upper bound for a single quota wait.
    pub max_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_RETRY_DELAY,
            max_delay: Duration::from_secs(60),
            reset_buffer: Duration::from_secs(2),
            fallback_wait: Duration::from_secs(60),
            max_wait: Duration::from_secs(3600),
        }
    }
}

impl ClientConfig {
    /// Backoff before retry number `attempt` (1-indexed): `base * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Counters describing every call made through a client.
#[derive(Debug, Default)]
pub struct ClientTelemetry {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    quota_waits: AtomicU64,
}

/// Point-in-time copy of [`ClientTelemetry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    /// Calls issued to the source, including ones that hit the quota.
    pub attempts: u64,
    pub successes: u64,
    /// Calls that failed with a transient or permanent error.
    pub failures: u64,
    /// Backoff retries scheduled after transient failures.
    pub retries: u64,
    pub quota_waits: u64,
}

impl ClientTelemetry {
    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            quota_waits: self.quota_waits.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Routes every data-source call through quota checks and retries.
///
/// - Before a call, the cached quota for its category is checked; when it is
///   spent the call waits for the reset.
/// - A quota-exhausted response records the reset time, waits, and retries
///   without spending a retry.
/// - Transient failures retry with exponential backoff up to `max_retries`.
/// - Any other failure is returned immediately.
pub struct RateLimitedClient {
    source: Arc<dyn RepositorySource>,
    cache: Arc<RateLimitCache>,
    config: ClientConfig,
    telemetry: ClientTelemetry,
    metrics: MetricsCollector,
}

impl RateLimitedClient {
    pub fn new(source: Arc<dyn RepositorySource>, cache: Arc<RateLimitCache>) -> Self {
        Self {
            source,
            cache,
            config: ClientConfig::default(),
            telemetry: ClientTelemetry::default(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RateLimitCache> {
        &self.cache
    }

    pub fn stats(&self) -> ClientStats {
        self.telemetry.snapshot()
    }

    /// Whether at least `required` calls remain for `category`.
    ///
    /// A cache miss fetches fresh quota state. If that fetch fails the check
    /// is optimistic; the call itself will report exhaustion if needed.
    pub async fn check_quota(&self, category: QuotaCategory, required: u32) -> bool {
        if let Some(remaining) = self.cache.remaining(category, Utc::now()) {
            return remaining >= required;
        }

        if let Err(err) = self.refresh_rate_limits().await {
            tracing::warn!(category = %category, error = %err, "Failed to refresh rate limits");
            return true;
        }

        self.cache
            .remaining(category, Utc::now())
            .map_or(true, |remaining| remaining >= required)
    }

    /// Fetch quota state for every category and store it in the cache.
    pub async fn refresh_rate_limits(
        &self,
    ) -> Result<HashMap<QuotaCategory, RateLimitInfo>, SourceError> {
        let snapshot = self.source.get_rate_limit().await?;
        for (category, info) in &snapshot {
            self.cache.record(*category, info.clone());
            self.metrics
                .set_quota_remaining(category.as_str(), info.remaining);
        }
        Ok(snapshot)
    }

    /// Sleep until `category` resets, if its cached quota is spent.
    ///
    /// The wait lasts until the reported reset plus the safety buffer, capped
    /// at `max_wait`. The cache entry is dropped afterwards so the next check
    /// sees fresh state.
    pub async fn wait_for_reset(&self, category: QuotaCategory) {
        let Some(info) = self.cache.get(category) else {
            return;
        };
        if info.remaining > 0 {
            return;
        }

        let until_reset = (info.reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let wait = (until_reset + self.config.reset_buffer).min(self.config.max_wait);

        ClientTelemetry::bump(&self.telemetry.quota_waits);
        self.metrics
            .record_quota_wait(category.as_str(), wait.as_secs_f64());
        tracing::info!(
            category = %category,
            wait_secs = wait.as_secs(),
            reset_at = %info.reset_at,
            "Quota exhausted, waiting for reset"
        );

        tokio::time::sleep(wait).await;
        self.cache.invalidate(category);
    }

    /// Run `op` under quota control and retry policy.
    ///
    /// `calls` is the number of API calls one invocation spends; it is used
    /// for the quota pre-check and to decrement the cache when the response
    /// carries no quota headers.
    pub async fn execute<T, F, Fut>(
        &self,
        category: QuotaCategory,
        calls: u32,
        max_retries: u32,
        mut op: F,
    ) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse<T>, SourceError>>,
    {
        let mut failed_attempts = 0u32;

        loop {
            if !self.check_quota(category, calls).await {
                self.wait_for_reset(category).await;
            }

            ClientTelemetry::bump(&self.telemetry.attempts);
            match op().await {
                Ok(response) => {
                    match response.rate_limit {
                        Some(info) => {
                            self.metrics
                                .set_quota_remaining(category.as_str(), info.remaining);
                            self.cache.record(category, info);
                        }
                        None => self.cache.consume(category, calls),
                    }
                    ClientTelemetry::bump(&self.telemetry.successes);
                    self.metrics.record_api_call(category.as_str(), "success");
                    return Ok(response.data);
                }
                Err(SourceError::QuotaExhausted { reset_at }) => {
                    self.metrics.record_api_call(category.as_str(), "quota_exhausted");
                    let reset_at = reset_at.unwrap_or_else(|| {
                        Utc::now()
                            + ChronoDuration::from_std(self.config.fallback_wait)
                                .unwrap_or_else(|_| ChronoDuration::seconds(60))
                    });
                    self.cache.mark_exhausted(category, reset_at);
                    self.wait_for_reset(category).await;
                }
                Err(err) if err.is_transient() => {
                    ClientTelemetry::bump(&self.telemetry.failures);
                    self.metrics.record_api_call(category.as_str(), "transient");
                    failed_attempts += 1;
                    if failed_attempts > max_retries {
                        tracing::warn!(
                            category = %category,
                            attempts = failed_attempts,
                            error = %err,
                            "Retries exhausted"
                        );
                        return Err(err);
                    }

                    let delay = self.config.backoff_delay(failed_attempts);
                    tracing::warn!(
                        category = %category,
                        attempt = failed_attempts,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient error, will retry"
                    );
                    ClientTelemetry::bump(&self.telemetry.retries);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    ClientTelemetry::bump(&self.telemetry.failures);
                    self.metrics.record_api_call(category.as_str(), "permanent");
                    return Err(err);
                }
            }
        }
    }

    pub async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, SourceError> {
        let source = self.source.as_ref();
        self.execute(
            QuotaCategory::Search,
            cost::SEARCH,
            self.config.max_retries,
            move || source.search(query, page, per_page),
        )
        .await
    }

    pub async fn metrics(&self, owner: &str, repo: &str) -> Result<RepositoryMetrics, SourceError> {
        let source = self.source.as_ref();
        self.execute(
            QuotaCategory::Core,
            cost::METRICS,
            self.config.max_retries,
            move || source.get_metrics(owner, repo),
        )
        .await
    }

    pub async fn activity(&self, owner: &str, repo: &str) -> Result<ActivitySignals, SourceError> {
        let source = self.source.as_ref();
        self.execute(
            QuotaCategory::Core,
            cost::ACTIVITY,
            self.config.max_retries,
            move || source.get_activity(owner, repo),
        )
        .await
    }

    pub async fn quality(&self, owner: &str, repo: &str) -> Result<QualitySignals, SourceError> {
        let source = self.source.as_ref();
        self.execute(
            QuotaCategory::Core,
            cost::QUALITY,
            self.config.max_retries,
            move || source.get_quality(owner, repo),
        )
        .await
    }
}
