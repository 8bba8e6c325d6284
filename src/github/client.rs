//! GitHub REST API implementation of [`RepositorySource`].
//!
//! Every request carries the versioned JSON accept header and, when configured,
//! a bearer token. Response headers are parsed for `x-ratelimit-*` metadata so
//! the rate-limited client can keep its quota cache current without extra calls.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use super::source::RepositorySource;
use super::types::{
    ActivitySignals, ApiResponse, QualitySignals, QuotaCategory, RateLimitInfo,
    RepositoryMetrics, RepositorySignal, SearchPage,
};
use crate::error::SourceError;

/// GitHub REST API base URL.
const GITHUB_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = "revival-scout/0.1";

/// Maximum bytes of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 300;

static LAST_PAGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"[?&]page=(\d+)[^>]*>;\s*rel="last""#).ok());

/// Client for the GitHub REST API.
///
/// # Example
///
/// ```ignore
/// use revival_scout::github::{GitHubClient, RepositorySource};
///
/// let client = GitHubClient::from_env();
/// let page = client.search("language:rust stars:>=100", 1, 30).await?;
/// for repo in page.data.items {
///     println!("{} ({} stars)", repo.full_name, repo.stars);
/// }
/// ```
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    token: Option<String>,
    base_url: String,
}

impl GitHubClient {
    /// Create a client with an optional personal access token.
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: GITHUB_API_BASE.to_string(),
        }
    }

    /// Create a client using `GITHUB_TOKEN` or `GITHUB_PERSONAL_ACCESS_TOKEN`.
    pub fn from_env() -> Self {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GITHUB_PERSONAL_ACCESS_TOKEN"))
            .ok();
        Self::new(token)
    }

    /// Point the client at a different API root (GitHub Enterprise, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        request.send().await.map_err(|e| {
            if e.is_builder() {
                SourceError::invalid(format!("Invalid request: {}", e))
            } else {
                SourceError::Transient(format!("Request failed: {}", e))
            }
        })
    }

    /// Turn a non-success response into a classified error.
    async fn failure(response: Response) -> SourceError {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        classify_failure(status, &headers, &body, Utc::now())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(T, Option<RateLimitInfo>), SourceError> {
        let response = self.send(self.request(path)).await?;
        let rate_limit = parse_rate_limit_headers(response.headers());
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let data = response
            .json::<T>()
            .await
            .map_err(|e| SourceError::invalid(format!("Failed to parse {}: {}", path, e)))?;
        Ok((data, rate_limit))
    }

    /// Like [`Self::get_json`], but 404 and empty-body statuses yield `None`.
    async fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<(Option<T>, Option<RateLimitInfo>), SourceError> {
        let response = self.send(self.request(path)).await?;
        let rate_limit = parse_rate_limit_headers(response.headers());
        let status = response.status();
        if status == StatusCode::NOT_FOUND
            || status == StatusCode::ACCEPTED
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::CONFLICT
        {
            return Ok((None, rate_limit));
        }
        if !status.is_success() {
            return Err(Self::failure(response).await);
        }
        let data = response
            .json::<T>()
            .await
            .map_err(|e| SourceError::invalid(format!("Failed to parse {}: {}", path, e)))?;
        Ok((Some(data), rate_limit))
    }

    /// Count the items of a paginated listing by requesting one item per page
    /// and reading the `last` relation of the `Link` header.
    async fn count_items(
        &self,
        path: &str,
    ) -> Result<(Option<u64>, Option<RateLimitInfo>), SourceError> {
        let response = self.send(self.request(path)).await?;
        let rate_limit = parse_rate_limit_headers(response.headers());
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok((Some(0), rate_limit));
        }
        let quota_left = rate_limit.as_ref().is_some_and(|r| r.remaining > 0);
        if status == StatusCode::NOT_FOUND || (status == StatusCode::FORBIDDEN && quota_left) {
            // Listing disabled or too large to enumerate.
            return Ok((None, rate_limit));
        }
        if !status.is_success() {
            return Err(Self::failure(response).await);
        }
        let last_page = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_last_page);
        if let Some(count) = last_page {
            return Ok((Some(count), rate_limit));
        }
        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SourceError::invalid(format!("Failed to parse {}: {}", path, e)))?;
        Ok((Some(items.len() as u64), rate_limit))
    }

    async fn list_directory(
        &self,
        owner: &str,
        repo: &str,
        dir: &str,
    ) -> Result<(Vec<String>, Option<RateLimitInfo>), SourceError> {
        let path = format!("/repos/{}/{}/contents/{}", owner, repo, dir);
        let (entries, rate_limit) = self.get_optional_json::<Vec<WireContent>>(&path).await?;
        let names = entries
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                if entry.kind == "dir" {
                    format!("{}/", entry.name)
                } else {
                    entry.name
                }
            })
            .collect();
        Ok((names, rate_limit))
    }

    async fn fetch_readme(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<(Option<String>, Option<RateLimitInfo>), SourceError> {
        let path = format!("/repos/{}/{}/readme", owner, repo);
        let request = self
            .request(&path)
            .header("Accept", "application/vnd.github.raw+json");
        let response = self.send(request).await?;
        let rate_limit = parse_rate_limit_headers(response.headers());
        if response.status() == StatusCode::NOT_FOUND {
            return Ok((None, rate_limit));
        }
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::Transient(format!("Failed to read README: {}", e)))?;
        Ok((Some(text), rate_limit))
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<SearchPage>, SourceError> {
        let path = format!(
            "/search/repositories?q={}&sort=stars&order=desc&per_page={}&page={}",
            urlencoding::encode(query),
            per_page.clamp(1, 100),
            page.max(1)
        );
        let (wire, rate_limit) = self.get_json::<WireSearch>(&path).await?;
        tracing::debug!(
            query = query,
            page = page,
            total = wire.total_count,
            items = wire.items.len(),
            "GitHub search page fetched"
        );
        let page = SearchPage {
            items: wire.items.into_iter().map(WireRepo::into_signal).collect(),
            total_count: wire.total_count,
            incomplete_results: wire.incomplete_results,
        };
        Ok(ApiResponse::new(page).with_rate_limit(rate_limit))
    }

    async fn get_metrics(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<RepositoryMetrics>, SourceError> {
        let (wire, rate_limit) = self
            .get_json::<WireRepo>(&format!("/repos/{}/{}", owner, repo))
            .await?;
        let (contributors, contributors_limit) = self
            .count_items(&format!(
                "/repos/{}/{}/contributors?per_page=1&anon=1",
                owner, repo
            ))
            .await?;

        let metrics = RepositoryMetrics {
            stars: wire.stargazers_count,
            forks: wire.forks_count,
            subscribers: wire.subscribers_count.unwrap_or(wire.watchers_count),
            open_issues: wire.open_issues_count,
            size_kb: wire.size,
            contributors,
            network_count: wire.network_count,
            has_wiki: wire.has_wiki,
            has_pages: wire.has_pages,
            has_discussions: wire.has_discussions,
            fetched_at: Utc::now(),
        };
        Ok(ApiResponse::new(metrics)
            .with_rate_limit(lowest_remaining(rate_limit, contributors_limit)))
    }

    async fn get_activity(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<ActivitySignals>, SourceError> {
        let (commits, mut rate_limit) = self
            .get_optional_json::<Vec<WireCommit>>(&format!(
                "/repos/{}/{}/commits?per_page=1",
                owner, repo
            ))
            .await?;
        let last_commit_at = commits
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.commit.committer.and_then(|p| p.date));

        let (weeks, limit) = self
            .get_optional_json::<Vec<WireWeek>>(&format!(
                "/repos/{}/{}/stats/commit_activity",
                owner, repo
            ))
            .await?;
        rate_limit = lowest_remaining(rate_limit, limit);
        let (commits_last_year, active_weeks_last_year) = match weeks {
            Some(weeks) if !weeks.is_empty() => (
                Some(weeks.iter().map(|w| w.total).sum()),
                Some(weeks.iter().filter(|w| w.total > 0).count() as u32),
            ),
            _ => (None, None),
        };

        let (release, limit) = self
            .get_optional_json::<WireRelease>(&format!(
                "/repos/{}/{}/releases/latest",
                owner, repo
            ))
            .await?;
        rate_limit = lowest_remaining(rate_limit, limit);

        let (open_pull_requests, limit) = self
            .count_items(&format!(
                "/repos/{}/{}/pulls?state=open&per_page=1",
                owner, repo
            ))
            .await?;
        rate_limit = lowest_remaining(rate_limit, limit);

        let activity = ActivitySignals {
            last_commit_at,
            commits_last_year,
            active_weeks_last_year,
            open_pull_requests,
            latest_release_at: release.map(|r| r.published_at.unwrap_or(r.created_at)),
            fetched_at: Utc::now(),
        };
        Ok(ApiResponse::new(activity).with_rate_limit(rate_limit))
    }

    async fn get_quality(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<QualitySignals>, SourceError> {
        let (root_entries, mut rate_limit) = self.list_directory(owner, repo, "").await?;

        let (github_entries, limit) = if root_entries.iter().any(|e| e == ".github/") {
            self.list_directory(owner, repo, ".github").await?
        } else {
            (Vec::new(), None)
        };
        rate_limit = lowest_remaining(rate_limit, limit);

        let (workflow_files, limit) = if github_entries.iter().any(|e| e == "workflows/") {
            self.list_directory(owner, repo, ".github/workflows").await?
        } else {
            (Vec::new(), None)
        };
        rate_limit = lowest_remaining(rate_limit, limit);

        let (readme, limit) = self.fetch_readme(owner, repo).await?;
        rate_limit = lowest_remaining(rate_limit, limit);

        let quality = QualitySignals {
            root_entries,
            github_entries,
            workflow_files,
            readme,
            fetched_at: Some(Utc::now()),
        };
        Ok(ApiResponse::new(quality).with_rate_limit(rate_limit))
    }

    async fn get_rate_limit(&self) -> Result<HashMap<QuotaCategory, RateLimitInfo>, SourceError> {
        let (wire, _) = self.get_json::<WireRateLimit>("/rate_limit").await?;
        let mut snapshot = HashMap::new();
        for category in QuotaCategory::ALL {
            if let Some(bucket) = wire.resources.get(category.as_str()) {
                let Some(reset_at) = DateTime::from_timestamp(bucket.reset, 0) else {
                    continue;
                };
                snapshot.insert(
                    category,
                    RateLimitInfo::new(bucket.limit, bucket.remaining, reset_at),
                );
            }
        }
        Ok(snapshot)
    }
}

/// Parse `x-ratelimit-*` headers into quota metadata.
pub(crate) fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let limit = header_number(headers, "x-ratelimit-limit")?;
    let remaining = header_number(headers, "x-ratelimit-remaining")?;
    let reset = header_number(headers, "x-ratelimit-reset")?;
    let reset_at = DateTime::from_timestamp(reset, 0)?;
    Some(RateLimitInfo::new(
        u32::try_from(limit).unwrap_or(u32::MAX),
        u32::try_from(remaining).unwrap_or(0),
        reset_at,
    ))
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Classify a failed response.
///
/// 429, and 403 with an exhausted quota or a secondary-limit signal, mean the
/// quota is spent. 5xx and 408 are transient. Everything else is permanent.
pub(crate) fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    now: DateTime<Utc>,
) -> SourceError {
    let code = status.as_u16();
    let remaining = header_number(headers, "x-ratelimit-remaining");
    let retry_after = header_number(headers, "retry-after");
    let mentions_limit = body.to_ascii_lowercase().contains("rate limit");

    let limited = remaining == Some(0) || retry_after.is_some() || mentions_limit;
    if code == 429 || (code == 403 && limited) {
        let reset_at = retry_after
            .map(|secs| now + ChronoDuration::seconds(secs.max(0)))
            .or_else(|| {
                header_number(headers, "x-ratelimit-reset")
                    .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            });
        return SourceError::QuotaExhausted { reset_at };
    }

    let message = truncate(body, MAX_ERROR_BODY);
    if status.is_server_error() || code == 408 {
        return SourceError::Transient(format!("HTTP {}: {}", code, message));
    }
    SourceError::permanent(code, message)
}

/// Extract the page number of the `rel="last"` link.
pub(crate) fn parse_last_page(link: &str) -> Option<u64> {
    let re = LAST_PAGE_RE.as_ref()?;
    re.captures(link)?.get(1)?.as_str().parse().ok()
}

fn lowest_remaining(a: Option<RateLimitInfo>, b: Option<RateLimitInfo>) -> Option<RateLimitInfo> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.remaining <= a.remaining { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.trim().to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", text[..end].trim())
}

#[derive(Debug, Deserialize)]
struct WireSearch {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<WireRepo>,
}

#[derive(Debug, Deserialize)]
struct WireRepo {
    id: u64,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    watchers_count: u64,
    #[serde(default)]
    subscribers_count: Option<u64>,
    #[serde(default)]
    network_count: Option<u64>,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    license: Option<WireLicense>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    has_pages: bool,
    #[serde(default)]
    has_discussions: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl WireRepo {
    fn into_signal(self) -> RepositorySignal {
        let license = self.license.map(|l| match l.spdx_id {
            Some(spdx) if spdx != "NOASSERTION" => spdx,
            _ => l.key,
        });
        RepositorySignal {
            id: self.id,
            full_name: self.full_name,
            description: self.description,
            html_url: self.html_url,
            stars: self.stargazers_count,
            forks: self.forks_count,
            watchers: self.watchers_count,
            open_issues: self.open_issues_count,
            size_kb: self.size,
            language: self.language,
            license,
            topics: self.topics,
            archived: self.archived,
            fork: self.fork,
            created_at: self.created_at,
            pushed_at: self.pushed_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireLicense {
    key: String,
    #[serde(default)]
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCommit {
    commit: WireCommitDetail,
}

#[derive(Debug, Deserialize)]
struct WireCommitDetail {
    #[serde(default)]
    committer: Option<WireCommitPerson>,
}

#[derive(Debug, Deserialize)]
struct WireCommitPerson {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireWeek {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct WireRelease {
    created_at: DateTime<Utc>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct WireRateLimit {
    resources: HashMap<String, WireBucket>,
}

#[derive(Debug, Deserialize)]
struct WireBucket {
    limit: u32,
    remaining: u32,
    reset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_parse_rate_limit_headers() {
        let h = headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4987"),
            ("x-ratelimit-reset", "1700000000"),
        ]);
        let info = parse_rate_limit_headers(&h).unwrap();
        assert_eq!(info.limit, 5000);
        assert_eq!(info.remaining, 4987);
        assert_eq!(info.reset_at.timestamp(), 1_700_000_000);

        let partial = headers(&[("x-ratelimit-limit", "5000")]);
        assert!(parse_rate_limit_headers(&partial).is_none());
    }

    #[test]
    fn test_classify_exhausted_primary_limit() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let h = headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1714521600"),
        ]);
        let err = classify_failure(StatusCode::FORBIDDEN, &h, "API rate limit exceeded", now);
        match err {
            SourceError::QuotaExhausted { reset_at } => {
                assert_eq!(reset_at.unwrap().timestamp(), 1_714_521_600);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_secondary_limit_uses_retry_after() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let h = headers(&[("retry-after", "60")]);
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, &h, "", now);
        match err {
            SourceError::QuotaExhausted { reset_at } => {
                assert_eq!(reset_at, Some(now + ChronoDuration::seconds(60)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_plain_forbidden_is_permanent() {
        let h = headers(&[("x-ratelimit-remaining", "4000")]);
        let err =
            classify_failure(StatusCode::FORBIDDEN, &h, "Repository access blocked", Utc::now());
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        let h = HeaderMap::new();
        assert!(classify_failure(StatusCode::BAD_GATEWAY, &h, "", Utc::now()).is_transient());
        assert!(classify_failure(StatusCode::REQUEST_TIMEOUT, &h, "", Utc::now()).is_transient());
        assert!(!classify_failure(StatusCode::NOT_FOUND, &h, "", Utc::now()).is_transient());
        let unprocessable = classify_failure(StatusCode::UNPROCESSABLE_ENTITY, &h, "", Utc::now());
        assert!(!unprocessable.is_transient());
    }

    #[test]
    fn test_parse_last_page() {
        let link = r#"<https://api.github.com/repositories/1/contributors?per_page=1&anon=1&page=2>; rel="next", <https://api.github.com/repositories/1/contributors?per_page=1&anon=1&page=342>; rel="last""#;
        assert_eq!(parse_last_page(link), Some(342));
        assert_eq!(
            parse_last_page(r#"<https://api.github.com/x?page=1>; rel="prev""#),
            None
        );
    }

    #[test]
    fn test_wire_repo_conversion() {
        let json = serde_json::json!({
            "id": 42,
            "full_name": "octo/widget",
            "description": "A widget",
            "html_url": "https://github.com/octo/widget",
            "stargazers_count": 1200,
            "forks_count": 80,
            "watchers_count": 1200,
            "open_issues_count": 14,
            "size": 2048,
            "language": "Go",
            "license": {"key": "other", "spdx_id": "NOASSERTION"},
            "topics": ["cli"],
            "archived": false,
            "fork": false,
            "created_at": "2018-03-01T10:00:00Z",
            "pushed_at": "2022-01-01T00:00:00Z"
        });
        let wire: WireRepo = serde_json::from_value(json).unwrap();
        let signal = wire.into_signal();
        assert_eq!(signal.id, 42);
        assert_eq!(signal.stars, 1200);
        assert_eq!(signal.license.as_deref(), Some("other"));
        assert_eq!(signal.topics, vec!["cli".to_string()]);
    }

    #[test]
    fn test_lowest_remaining() {
        let reset = Utc::now();
        let a = Some(RateLimitInfo::new(5000, 10, reset));
        let b = Some(RateLimitInfo::new(5000, 8, reset));
        assert_eq!(lowest_remaining(a.clone(), b).unwrap().remaining, 8);
        assert_eq!(lowest_remaining(a, None).unwrap().remaining, 10);
        assert!(lowest_remaining(None, None).is_none());
    }

    #[test]
    fn test_client_configuration() {
        let client = GitHubClient::new(Some("  ".to_string())).with_base_url("http://localhost:9/");
        assert!(!client.has_token());
        assert_eq!(client.base_url(), "http://localhost:9");
    }
}
