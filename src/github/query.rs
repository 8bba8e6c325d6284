//! Search query construction and repository name validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Criteria for a repository search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Free-text keywords matched against name, description and readme.
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub min_stars: Option<u64>,
    #[serde(default)]
    pub max_stars: Option<u64>,
    #[serde(default)]
    pub min_forks: Option<u64>,
    /// Only repositories whose last push is before this date.
    #[serde(default)]
    pub pushed_before: Option<NaiveDate>,
    /// Only repositories whose last push is after this date.
    #[serde(default)]
    pub pushed_after: Option<NaiveDate>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// SPDX license key, e.g. `mit`.
    #[serde(default)]
    pub license: Option<String>,
}

impl SearchFilters {
    /// Whether at least one criterion narrows the search.
    pub fn has_criteria(&self) -> bool {
        self.keywords.as_deref().is_some_and(|k| !k.trim().is_empty())
            || self.language.is_some()
            || self.min_stars.is_some()
            || self.max_stars.is_some()
            || self.min_forks.is_some()
            || self.pushed_before.is_some()
            || self.pushed_after.is_some()
            || !self.topics.is_empty()
            || self.license.is_some()
    }
}

/// Build the `q` parameter for `/search/repositories`.
///
/// The result is not URL-encoded; the client encodes it.
pub fn build_query(filters: &SearchFilters, include_forks: bool) -> String {
    let mut parts = Vec::new();

    if let Some(keywords) = filters.keywords.as_deref() {
        let keywords = keywords.trim();
        if !keywords.is_empty() {
            parts.push(keywords.to_string());
        }
    }

    if let Some(ref lang) = filters.language {
        parts.push(format!("language:{}", quote_if_needed(lang)));
    }

    match (filters.min_stars, filters.max_stars) {
        (Some(min), Some(max)) => parts.push(format!("stars:{}..{}", min, max)),
        (Some(min), None) => parts.push(format!("stars:>={}", min)),
        (None, Some(max)) => parts.push(format!("stars:<={}", max)),
        (None, None) => {}
    }

    if let Some(min) = filters.min_forks {
        parts.push(format!("forks:>={}", min));
    }

    match (filters.pushed_after, filters.pushed_before) {
        (Some(after), Some(before)) => parts.push(format!(
            "pushed:{}..{}",
            after.format("%Y-%m-%d"),
            before.format("%Y-%m-%d")
        )),
        (Some(after), None) => parts.push(format!("pushed:>{}", after.format("%Y-%m-%d"))),
        (None, Some(before)) => parts.push(format!("pushed:<{}", before.format("%Y-%m-%d"))),
        (None, None) => {}
    }

    for topic in &filters.topics {
        parts.push(format!("topic:{}", quote_if_needed(topic)));
    }

    if let Some(ref license) = filters.license {
        parts.push(format!("license:{}", license.to_ascii_lowercase()));
    }

    if include_forks {
        parts.push("fork:true".to_string());
    }

    parts.join(" ")
}

fn quote_if_needed(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Validate a repository name in `owner/repo` form.
///
/// Only alphanumerics and `-`, `_`, `.` are allowed in either half.
pub fn validate_repo_name(full_name: &str) -> Result<(), String> {
    if full_name.is_empty() {
        return Err("repository name must not be empty".to_string());
    }
    let Some((owner, repo)) = full_name.split_once('/') else {
        return Err(format!(
            "repository name must be in 'owner/repo' format, got '{}'",
            full_name
        ));
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(format!(
            "repository name must be in 'owner/repo' format, got '{}'",
            full_name
        ));
    }
    if repo == "." || repo == ".." {
        return Err(format!("repository name is not allowed: '{}'", full_name));
    }
    for ch in full_name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '/' && ch != '-' && ch != '_' && ch != '.' {
            return Err(format!(
                "repository name contains invalid character '{}': '{}'",
                ch, full_name
            ));
        }
    }
    Ok(())
}
