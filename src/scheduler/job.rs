//! Job definitions and the job state machine.
//!
//! - `Job`: one collection run with its filters, settings, progress, results and log
//! - `JobStatus`: lifecycle states and the transition table
//! - `PipelinePhase`: the three phases and their share of the progress bar
//! - `JobSettings`: result cap, collection depth and client-side filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::JobError;
use crate::github::{validate_repo_name, SearchFilters};

/// Number of log entries a job keeps before dropping the oldest.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// GitHub search never returns more than this many results for one query.
pub const MAX_RESULTS_LIMIT: u32 = 1000;

/// Search criteria of a job.
pub type JobFilters = SearchFilters;

/// How many signal groups are fetched per repository.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    /// Metrics only.
    Basic,
    /// Metrics and activity.
    #[default]
    Detailed,
    /// Metrics, activity and code-quality signals.
    Comprehensive,
}

impl AnalysisDepth {
    pub fn fetches_activity(&self) -> bool {
        matches!(self, Self::Detailed | Self::Comprehensive)
    }

    pub fn fetches_quality(&self) -> bool {
        matches!(self, Self::Comprehensive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Upper bound on repositories taken from search (1..=1000).
    pub max_results: u32,
    pub depth: AnalysisDepth,
    /// Keep archived repositories returned by search.
    #[serde(default)]
    pub include_archived: bool,
    /// Search forks too (`fork:true`) and keep them.
    #[serde(default)]
    pub include_forks: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_results: 100,
            depth: AnalysisDepth::Detailed,
            include_archived: false,
            include_forks: false,
        }
    }
}

impl JobSettings {
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }

    pub fn with_include_forks(mut self, include: bool) -> Self {
        self.include_forks = include;
        self
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ACTIVE: [JobStatus; 2] = [Self::Pending, Self::Running];

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Pending | Self::Running => false,
            Self::Completed | Self::Failed | Self::Cancelled => true,
        }
    }

    /// The transition table.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            (Pending, Pending) | (Pending, Completed) | (Pending, Failed) => false,
            (Running, Pending) | (Running, Running) => false,
            (Completed, _) | (Failed, _) | (Cancelled, _) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One of the three pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Search,
    Collect,
    Analyze,
}

impl PipelinePhase {
    /// Share of the overall progress percentage owned by this phase.
    pub fn band(&self) -> (f64, f64) {
        match self {
            Self::Search => (0.0, 30.0),
            Self::Collect => (30.0, 80.0),
            Self::Analyze => (80.0, 100.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Collect => "collect",
            Self::Analyze => "analyze",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress within the current phase plus the phase-weighted percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: u64,
    pub total: u64,
    /// Overall completion in [0, 100]. Never decreases.
    pub percentage: f64,
    pub stage: String,
    pub phase: Option<PipelinePhase>,
}

/// Counters accumulated across phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResults {
    /// Repositories accepted from search.
    pub found: u64,
    /// Repositories whose signal groups were fetched successfully.
    pub collected: u64,
    pub analyzed: u64,
    pub high_potential: u64,
    /// Per-item failures (skipped repositories).
    pub errors: u64,
    pub repository_ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// A collection run.
///
/// The status only moves through [`Job::transition`] and its wrappers, which
/// enforce the transition table. Logs are a bounded ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub filters: JobFilters,
    pub settings: JobSettings,
    status: JobStatus,
    pub progress: JobProgress,
    pub results: JobResults,
    logs: VecDeque<JobLogEntry>,
    log_capacity: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when a failure could not be attributed to one repository.
    pub error: Option<String>,
}

impl Job {
    /// Create a pending job.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        filters: JobFilters,
        settings: JobSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            filters,
            settings,
            status: JobStatus::Pending,
            progress: JobProgress {
                stage: "queued".to_string(),
                ..Default::default()
            },
            results: JobResults::default(),
            logs: VecDeque::new(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            created_at: now,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        while self.logs.len() > self.log_capacity {
            self.logs.pop_front();
        }
        self
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn logs(&self) -> impl Iterator<Item = &JobLogEntry> {
        self.logs.iter()
    }

    pub fn log_len(&self) -> usize {
        self.logs.len()
    }

    /// Move to `next`, enforcing the transition table.
    pub fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        match next {
            JobStatus::Running => {
                self.started_at.get_or_insert(now);
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(now);
            }
            JobStatus::Pending => {}
        }
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Running, now)?;
        self.log(LogLevel::Info, "Job started", now);
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Completed, now)?;
        self.progress.percentage = 100.0;
        self.progress.stage = "completed".to_string();
        let message = format!(
            "Job completed: {} found, {} analyzed, {} high potential",
            self.results.found, self.results.analyzed, self.results.high_potential
        );
        self.log(LogLevel::Info, message, now);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), JobError> {
        let message = message.into();
        self.transition(JobStatus::Failed, now)?;
        self.progress.stage = "failed".to_string();
        self.log(LogLevel::Error, format!("Job failed: {}", message), now);
        self.error = Some(message);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Cancelled, now)?;
        self.progress.stage = "cancelled".to_string();
        self.log(LogLevel::Warn, "Job cancelled", now);
        Ok(())
    }

    /// Append to the log ring, dropping the oldest entry when full.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, now: DateTime<Utc>) {
        self.logs.push_back(JobLogEntry {
            at: now,
            level,
            message: message.into(),
        });
        while self.logs.len() > self.log_capacity {
            self.logs.pop_front();
        }
    }

    /// Update progress within `phase`. The overall percentage is mapped into
    /// the phase band and never moves backwards.
    pub fn set_progress(&mut self, phase: PipelinePhase, current: u64, total: u64) {
        let (lo, hi) = phase.band();
        let fraction = if total == 0 {
            1.0
        } else {
            (current.min(total) as f64) / total as f64
        };
        let percentage = lo + (hi - lo) * fraction;

        self.progress.current = current;
        self.progress.total = total;
        self.progress.phase = Some(phase);
        self.progress.stage = format!("{}: {}/{}", phase, current, total);
        self.progress.percentage = self.progress.percentage.max(percentage).min(100.0);
    }

    /// Record a repository as found by this job. Returns false if already listed.
    pub fn record_found(&mut self, repository_id: u64) -> bool {
        if self.results.repository_ids.contains(&repository_id) {
            return false;
        }
        self.results.repository_ids.push(repository_id);
        self.results.found += 1;
        true
    }
}

/// Check a job request before anything is created.
pub fn validate_request(
    owner_id: &str,
    name: &str,
    filters: &JobFilters,
    settings: &JobSettings,
) -> Result<(), JobError> {
    if owner_id.trim().is_empty() {
        return Err(JobError::Validation("owner id must not be empty".into()));
    }
    if name.trim().is_empty() {
        return Err(JobError::Validation("job name must not be empty".into()));
    }
    if !filters.has_criteria() {
        return Err(JobError::Validation(
            "at least one search criterion is required".into(),
        ));
    }
    if let (Some(min), Some(max)) = (filters.min_stars, filters.max_stars) {
        if min > max {
            return Err(JobError::Validation(format!(
                "min_stars ({}) exceeds max_stars ({})",
                min, max
            )));
        }
    }
    if let (Some(after), Some(before)) = (filters.pushed_after, filters.pushed_before) {
        if after > before {
            return Err(JobError::Validation(format!(
                "pushed_after ({}) is later than pushed_before ({})",
                after, before
            )));
        }
    }
    if let Some(language) = filters.language.as_deref() {
        if language.trim().is_empty() {
            return Err(JobError::Validation("language must not be blank".into()));
        }
    }
    if settings.max_results == 0 || settings.max_results > MAX_RESULTS_LIMIT {
        return Err(JobError::Validation(format!(
            "max_results must be between 1 and {}, got {}",
            MAX_RESULTS_LIMIT, settings.max_results
        )));
    }
    Ok(())
}

/// Reject malformed `owner/name` identifiers with a validation error.
pub fn validate_repository(full_name: &str) -> Result<(), JobError> {
    validate_repo_name(full_name).map_err(JobError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn filters() -> JobFilters {
        JobFilters {
            language: Some("Rust".into()),
            min_stars: Some(100),
            ..Default::default()
        }
    }

    fn job() -> Job {
        Job::new("alice", "rust sweep", filters(), JobSettings::default(), now())
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.progress.percentage, 0.0);
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        let all = [Pending, Running, Completed, Failed, Cancelled];
        for from in all {
            for to in all {
                let allowed = matches!(
                    (from, to),
                    (Pending, Running)
                        | (Pending, Cancelled)
                        | (Running, Completed)
                        | (Running, Failed)
                        | (Running, Cancelled)
                );
                assert_eq!(from.can_transition_to(to), allowed, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_start_sets_started_at_once() {
        let mut job = job();
        job.start(now()).unwrap();
        assert_eq!(job.started_at, Some(now()));
        assert!(job.start(now() + chrono::Duration::seconds(5)).is_err());
        assert_eq!(job.started_at, Some(now()));
    }

    #[test]
    fn test_fail_sets_error_and_completed_at() {
        let mut job = job();
        job.start(now()).unwrap();
        job.fail("store unavailable", now()).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("store unavailable"));
        assert_eq!(job.completed_at, Some(now()));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.cancel(now()).unwrap();
        let err = job.start(now()).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert!(job.complete(now()).is_err());
        assert!(job.fail("late", now()).is_err());
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_log_ring_drops_oldest() {
        let mut job = job();
        for i in 0..150 {
            job.log(LogLevel::Info, format!("entry {}", i), now());
        }
        assert_eq!(job.log_len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(job.logs().next().unwrap().message, "entry 50");
        assert_eq!(job.logs().last().unwrap().message, "entry 149");
    }

    #[test]
    fn test_progress_is_phase_weighted() {
        let mut job = job();
        job.set_progress(PipelinePhase::Search, 50, 100);
        assert!((job.progress.percentage - 15.0).abs() < 1e-9);
        job.set_progress(PipelinePhase::Collect, 0, 10);
        assert!((job.progress.percentage - 30.0).abs() < 1e-9);
        job.set_progress(PipelinePhase::Collect, 5, 10);
        assert!((job.progress.percentage - 55.0).abs() < 1e-9);
        job.set_progress(PipelinePhase::Analyze, 10, 10);
        assert!((job.progress.percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = job();
        job.set_progress(PipelinePhase::Collect, 8, 10);
        let before = job.progress.percentage;
        job.set_progress(PipelinePhase::Search, 1, 10);
        assert_eq!(job.progress.percentage, before);
    }

    #[test]
    fn test_record_found_dedupes() {
        let mut job = job();
        assert!(job.record_found(7));
        assert!(!job.record_found(7));
        assert_eq!(job.results.found, 1);
        assert_eq!(job.results.repository_ids, vec![7]);
    }

    #[test]
    fn test_validate_request() {
        let settings = JobSettings::default();
        assert!(validate_request("alice", "sweep", &filters(), &settings).is_ok());
        assert!(validate_request("", "sweep", &filters(), &settings).is_err());
        assert!(validate_request("alice", " ", &filters(), &settings).is_err());
        assert!(validate_request("alice", "sweep", &JobFilters::default(), &settings).is_err());

        let inverted = JobFilters {
            min_stars: Some(500),
            max_stars: Some(10),
            ..Default::default()
        };
        assert!(validate_request("alice", "sweep", &inverted, &settings).is_err());

        let too_many = settings.clone().with_max_results(MAX_RESULTS_LIMIT + 1);
        assert!(validate_request("alice", "sweep", &filters(), &too_many).is_err());
        let zero = JobSettings::default().with_max_results(0);
        assert!(validate_request("alice", "sweep", &filters(), &zero).is_err());
    }

    #[test]
    fn test_job_serialization_roundtrip() {
        let mut job = job();
        job.start(now()).unwrap();
        job.log(LogLevel::Warn, "skipped acme/broken", now());
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("cancelled".parse::<JobStatus>().unwrap(), JobStatus::Cancelled);
        assert!("done".parse::<JobStatus>().is_err());
    }
}
