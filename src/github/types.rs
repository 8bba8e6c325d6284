//! Typed signal groups fetched from the repository data source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An API rate-limit bucket tracked independently by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaCategory {
    Core,
    Search,
    Graphql,
}

impl QuotaCategory {
    /// All tracked categories.
    pub const ALL: [QuotaCategory; 3] = [Self::Core, Self::Search, Self::Graphql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Search => "search",
            Self::Graphql => "graphql",
        }
    }
}

impl fmt::Display for QuotaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "search" => Ok(Self::Search),
            "graphql" => Ok(Self::Graphql),
            other => Err(format!("unknown quota category '{}'", other)),
        }
    }
}

/// Quota state for one category as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    pub fn new(limit: u32, remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            limit,
            remaining,
            reset_at,
        }
    }

    /// Remaining quota as of `now`. A bucket whose reset time has passed is
    /// treated as fully replenished.
    pub fn effective_remaining(&self, now: DateTime<Utc>) -> u32 {
        if self.reset_at <= now {
            self.limit.max(self.remaining)
        } else {
            self.remaining
        }
    }
}

/// A data-source response plus the quota metadata that came with it.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, info: Option<RateLimitInfo>) -> Self {
        self.rate_limit = info;
        self
    }
}

/// Snapshot of one repository as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySignal {
    pub id: u64,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    /// Repository size in kilobytes.
    pub size_kb: u64,
    #[serde(default)]
    pub language: Option<String>,
    /// SPDX identifier of the license, if detected.
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepositorySignal {
    /// Owner and name halves of `full_name`.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.full_name.split_once('/')
    }

    /// Days since the last push, falling back to creation time.
    pub fn days_since_push(&self, now: DateTime<Utc>) -> i64 {
        let last = self.pushed_at.unwrap_or(self.created_at);
        (now - last).num_days().max(0)
    }

    /// Age of the repository in fractional years, at least one month.
    pub fn age_years(&self, now: DateTime<Utc>) -> f64 {
        let days = (now - self.created_at).num_days().max(30) as f64;
        days / 365.25
    }

    pub fn has_topic(&self, topics: &[&str]) -> bool {
        self.topics
            .iter()
            .any(|t| topics.iter().any(|c| t.eq_ignore_ascii_case(c)))
    }

    pub fn language_is(&self, languages: &[&str]) -> bool {
        self.language
            .as_deref()
            .map(|lang| languages.iter().any(|l| lang.eq_ignore_ascii_case(l)))
            .unwrap_or(false)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<RepositorySignal>,
    pub total_count: u64,
    pub incomplete_results: bool,
}

/// Detailed popularity metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetrics {
    pub stars: u64,
    pub forks: u64,
    /// Subscribers watching the repository (not the star count).
    pub subscribers: u64,
    pub open_issues: u64,
    pub size_kb: u64,
    #[serde(default)]
    pub contributors: Option<u64>,
    #[serde(default)]
    pub network_count: Option<u64>,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub has_pages: bool,
    #[serde(default)]
    pub has_discussions: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Recent development activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignals {
    #[serde(default)]
    pub last_commit_at: Option<DateTime<Utc>>,
    /// Commits over the trailing 52 weeks, when the statistics were ready.
    #[serde(default)]
    pub commits_last_year: Option<u64>,
    /// Weeks with at least one commit over the trailing 52 weeks.
    #[serde(default)]
    pub active_weeks_last_year: Option<u32>,
    #[serde(default)]
    pub open_pull_requests: Option<u64>,
    #[serde(default)]
    pub latest_release_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// File-listing signals used by the code quality heuristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Entries in the repository root. Directories carry a trailing `/`.
    #[serde(default)]
    pub root_entries: Vec<String>,
    /// Entries under `.github/`.
    #[serde(default)]
    pub github_entries: Vec<String>,
    /// Workflow files under `.github/workflows/`.
    #[serde(default)]
    pub workflow_files: Vec<String>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl QualitySignals {
    /// Case-insensitive lookup of a root file.
    pub fn has_root_file(&self, name: &str) -> bool {
        self.root_entries
            .iter()
            .any(|e| !e.ends_with('/') && e.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive lookup of a root directory.
    pub fn has_root_dir(&self, name: &str) -> bool {
        self.root_entries.iter().any(|e| {
            e.strip_suffix('/')
                .map(|d| d.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    /// Whether any root file starts with `prefix` (e.g. `.eslintrc`).
    pub fn has_root_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        self.root_entries
            .iter()
            .any(|e| !e.ends_with('/') && e.to_ascii_lowercase().starts_with(&prefix))
    }

    pub fn has_github_file(&self, name: &str) -> bool {
        self.github_entries.iter().any(|e| e.eq_ignore_ascii_case(name))
    }

    /// Whether any workflow file name contains `needle`.
    pub fn has_workflow_matching(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.workflow_files
            .iter()
            .any(|w| w.to_ascii_lowercase().contains(&needle))
    }

    pub fn has_readme(&self) -> bool {
        self.readme.is_some() || self.has_root_prefix("readme")
    }
}
