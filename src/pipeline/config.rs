//! Pipeline configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file, and `REVIVAL_*` environment variables. YAML keys and
//! environment variables share names (`batch_size` / `REVIVAL_BATCH_SIZE`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ratelimit::ClientConfig;

/// Prefix of every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "REVIVAL_";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for the pipeline orchestrator and job service.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    // Batching
    /// Repositories processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches and search pages.
    pub batch_delay: Duration,
    /// Results requested per search page (GitHub allows at most 100).
    pub search_page_size: u32,

    // Retry and quota handling
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// How long a cached quota snapshot stays valid.
    pub quota_cache_ttl: Duration,
    /// Extra time slept past a reported quota reset.
    pub reset_buffer: Duration,
    /// Wait used when an exhausted response carries no reset time.
    pub fallback_quota_wait: Duration,
    /// Upper bound for a single quota wait.
    pub max_quota_wait: Duration,

    // Jobs
    /// Non-terminal jobs allowed per owner.
    pub max_active_jobs_per_owner: usize,
    /// Overall deadline for one job.
    pub job_timeout: Duration,
    /// Revival score at or above which a repository counts as high potential.
    pub high_potential_threshold: f64,
    /// Log entries kept per job.
    pub log_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_secs(1),
            search_page_size: 100,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            quota_cache_ttl: Duration::from_secs(300),
            reset_buffer: Duration::from_secs(2),
            fallback_quota_wait: Duration::from_secs(60),
            max_quota_wait: Duration::from_secs(3600),
            max_active_jobs_per_owner: 3,
            job_timeout: Duration::from_secs(2 * 60 * 60),
            high_potential_threshold: 65.0,
            log_capacity: 100,
        }
    }
}

/// Partial configuration as read from YAML or the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub batch_delay_ms: Option<u64>,
    pub search_page_size: Option<u32>,
    pub max_retries: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_secs: Option<u64>,
    pub quota_cache_ttl_secs: Option<u64>,
    pub reset_buffer_secs: Option<u64>,
    pub fallback_quota_wait_secs: Option<u64>,
    pub max_quota_wait_secs: Option<u64>,
    pub max_active_jobs_per_owner: Option<usize>,
    pub job_timeout_secs: Option<u64>,
    pub high_potential_threshold: Option<f64>,
    pub log_capacity: Option<usize>,
}

impl ConfigOverrides {
    /// Read every `REVIVAL_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a full variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn read<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            name: &str,
        ) -> Result<Option<T>, ConfigError> {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key)
                .map(|value| parse_env_value(&value, &key))
                .transpose()
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
        Ok(Self {
            batch_size: read(lookup, "BATCH_SIZE")?,
            batch_delay_ms: read(lookup, "BATCH_DELAY_MS")?,
            search_page_size: read(lookup, "SEARCH_PAGE_SIZE")?,
            max_retries: read(lookup, "MAX_RETRIES")?,
            backoff_base_ms: read(lookup, "BACKOFF_BASE_MS")?,
            backoff_max_secs: read(lookup, "BACKOFF_MAX_SECS")?,
            quota_cache_ttl_secs: read(lookup, "QUOTA_CACHE_TTL_SECS")?,
            reset_buffer_secs: read(lookup, "RESET_BUFFER_SECS")?,
            fallback_quota_wait_secs: read(lookup, "FALLBACK_QUOTA_WAIT_SECS")?,
            max_quota_wait_secs: read(lookup, "MAX_QUOTA_WAIT_SECS")?,
            max_active_jobs_per_owner: read(lookup, "MAX_ACTIVE_JOBS_PER_OWNER")?,
            job_timeout_secs: read(lookup, "JOB_TIMEOUT_SECS")?,
            high_potential_threshold: read(lookup, "HIGH_POTENTIAL_THRESHOLD")?,
            log_capacity: read(lookup, "LOG_CAPACITY")?,
        })
    }

    /// Overlay the values that are set onto `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.batch_delay_ms {
            config.batch_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.search_page_size {
            config.search_page_size = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.backoff_base_ms {
            config.backoff_base = Duration::from_millis(v);
        }
        if let Some(v) = self.backoff_max_secs {
            config.backoff_max = Duration::from_secs(v);
        }
        if let Some(v) = self.quota_cache_ttl_secs {
            config.quota_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = self.reset_buffer_secs {
            config.reset_buffer = Duration::from_secs(v);
        }
        if let Some(v) = self.fallback_quota_wait_secs {
            config.fallback_quota_wait = Duration::from_secs(v);
        }
        if let Some(v) = self.max_quota_wait_secs {
            config.max_quota_wait = Duration::from_secs(v);
        }
        if let Some(v) = self.max_active_jobs_per_owner {
            config.max_active_jobs_per_owner = v;
        }
        if let Some(v) = self.job_timeout_secs {
            config.job_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.high_potential_threshold {
            config.high_potential_threshold = v;
        }
        if let Some(v) = self.log_capacity {
            config.log_capacity = v;
        }
        config
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `REVIVAL_*` environment variables.
    ///
    /// Recognized variables (see [`ConfigOverrides`] for the full list):
    /// - `REVIVAL_BATCH_SIZE`: repositories per batch (default: 10)
    /// - `REVIVAL_BATCH_DELAY_MS`: pause between batches (default: 1000)
    /// - `REVIVAL_MAX_RETRIES`: retries for transient errors (default: 3)
    /// - `REVIVAL_QUOTA_CACHE_TTL_SECS`: quota cache lifetime (default: 300)
    /// - `REVIVAL_MAX_ACTIVE_JOBS_PER_OWNER`: per-owner job cap (default: 3)
    /// - `REVIVAL_JOB_TIMEOUT_SECS`: job deadline (default: 7200)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ConfigOverrides::from_env()?.apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by a YAML file, then by the environment.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigOverrides = if text.trim().is_empty() {
            ConfigOverrides::default()
        } else {
            serde_yaml::from_str(text)?
        };
        let config = ConfigOverrides::from_env()?.apply(file.apply(Self::default()));
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(ConfigError::ValidationFailed(
                "batch_size must be between 1 and 100".to_string(),
            ));
        }

        if self.search_page_size == 0 || self.search_page_size > 100 {
            return Err(ConfigError::ValidationFailed(
                "search_page_size must be between 1 and 100".to_string(),
            ));
        }

        if self.backoff_base.is_zero() || self.backoff_base > self.backoff_max {
            return Err(ConfigError::ValidationFailed(
                "backoff_base must be positive and not exceed backoff_max".to_string(),
            ));
        }

        if self.max_quota_wait < self.reset_buffer {
            return Err(ConfigError::ValidationFailed(
                "max_quota_wait must be at least reset_buffer".to_string(),
            ));
        }

        if self.max_active_jobs_per_owner == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_active_jobs_per_owner must be greater than 0".to_string(),
            ));
        }

        if self.job_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "job_timeout must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.high_potential_threshold) {
            return Err(ConfigError::ValidationFailed(
                "high_potential_threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.log_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "log_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry and wait settings for the rate-limited client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            max_retries: self.max_retries,
            base_delay: self.backoff_base,
            max_delay: self.backoff_max,
            reset_buffer: self.reset_buffer,
            fallback_wait: self.fallback_quota_wait,
            max_wait: self.max_quota_wait,
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_search_page_size(mut self, size: u32) -> Self {
        self.search_page_size = size;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_quota_cache_ttl(mut self, ttl: Duration) -> Self {
        self.quota_cache_ttl = ttl;
        self
    }

    pub fn with_max_active_jobs_per_owner(mut self, max: usize) -> Self {
        self.max_active_jobs_per_owner = max;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_high_potential_threshold(mut self, threshold: f64) -> Self {
        self.high_potential_threshold = threshold;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
