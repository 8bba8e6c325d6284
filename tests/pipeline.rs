//! End-to-end job tests against an in-memory store and a scripted source.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use revival_scout::error::{JobError, SourceError, StoreError};
use revival_scout::github::{
    ActivitySignals, ApiResponse, QualitySignals, QuotaCategory, RateLimitInfo,
    RepositoryMetrics, RepositorySignal, RepositorySource, SearchFilters, SearchPage,
};
use revival_scout::pipeline::{PipelineConfig, PipelineOrchestrator};
use revival_scout::ratelimit::{RateLimitCache, RateLimitedClient};
use revival_scout::scheduler::{AnalysisDepth, Job, JobService, JobSettings, JobStatus};
use revival_scout::scoring::ScoringEngine;
use revival_scout::storage::{
    JobStore, MemoryStore, RepositoryQuery, RepositoryRecord, RepositoryStore,
};

fn signal(id: u64, full_name: &str) -> RepositorySignal {
    let now = Utc::now();
    RepositorySignal {
        id,
        full_name: full_name.to_string(),
        description: Some("A dormant library".to_string()),
        html_url: format!("https://github.com/{}", full_name),
        stars: 1200 + id,
        forks: 150,
        watchers: 1200 + id,
        open_issues: 40,
        size_kb: 4096,
        language: Some("Rust".to_string()),
        license: Some("mit".to_string()),
        topics: vec!["cli".to_string()],
        archived: false,
        fork: false,
        created_at: now - ChronoDuration::days(2000),
        pushed_at: Some(now - ChronoDuration::days(500)),
        updated_at: Some(now - ChronoDuration::days(400)),
    }
}

/// Source serving a fixed result set, with optional gating and failures.
struct FakeSource {
    repositories: Vec<RepositorySignal>,
    /// When set, every search call waits for a permit.
    search_gate: Option<Arc<Semaphore>>,
    metrics_delay: Duration,
    /// Repositories whose metrics requests fail permanently.
    missing: HashSet<String>,
    search_calls: AtomicU64,
    metrics_calls: AtomicU64,
    quality_calls: AtomicU64,
    seen_pages: Mutex<Vec<u32>>,
}

impl FakeSource {
    fn new(count: u64) -> Self {
        Self::from_signals(
            (1..=count)
                .map(|id| signal(id, &format!("owner{}/project{}", id, id)))
                .collect(),
        )
    }

    fn from_signals(repositories: Vec<RepositorySignal>) -> Self {
        Self {
            repositories,
            search_gate: None,
            metrics_delay: Duration::ZERO,
            missing: HashSet::new(),
            search_calls: AtomicU64::new(0),
            metrics_calls: AtomicU64::new(0),
            quality_calls: AtomicU64::new(0),
            seen_pages: Mutex::new(Vec::new()),
        }
    }

    fn with_search_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.search_gate = Some(gate);
        self
    }

    fn with_metrics_delay(mut self, delay: Duration) -> Self {
        self.metrics_delay = delay;
        self
    }

    fn with_missing(mut self, full_name: &str) -> Self {
        self.missing.insert(full_name.to_string());
        self
    }
}

#[async_trait]
impl RepositorySource for FakeSource {
    async fn search(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<ApiResponse<SearchPage>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_pages.lock().unwrap().push(page);
        if let Some(gate) = &self.search_gate {
            let _permit = gate.acquire().await.map_err(|e| SourceError::Transient(e.to_string()))?;
        }

        let start = ((page - 1) * per_page) as usize;
        let items = self
            .repositories
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect();
        Ok(ApiResponse::new(SearchPage {
            items,
            total_count: self.repositories.len() as u64,
            incomplete_results: false,
        }))
    }

    async fn get_metrics(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ApiResponse<RepositoryMetrics>, SourceError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        if !self.metrics_delay.is_zero() {
            tokio::time::sleep(self.metrics_delay).await;
        }
        if self.missing.contains(&format!("{}/{}", owner, repo)) {
            return Err(SourceError::permanent(404, "Not Found"));
        }
        Ok(ApiResponse::new(RepositoryMetrics {
            stars: 1500,
            forks: 200,
            subscribers: 80,
            open_issues: 35,
            size_kb: 4096,
            contributors: Some(25),
            network_count: Some(210),
            has_wiki: true,
            has_pages: false,
            has_discussions: false,
            fetched_at: Utc::now(),
        }))
    }

    async fn get_activity(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<ApiResponse<ActivitySignals>, SourceError> {
        Ok(ApiResponse::new(ActivitySignals {
            last_commit_at: Some(Utc::now() - ChronoDuration::days(450)),
            commits_last_year: Some(3),
            active_weeks_last_year: Some(2),
            open_pull_requests: Some(6),
            latest_release_at: Some(Utc::now() - ChronoDuration::days(700)),
            fetched_at: Utc::now(),
        }))
    }

    async fn get_quality(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<ApiResponse<QualitySignals>, SourceError> {
        self.quality_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApiResponse::new(QualitySignals {
            root_entries: vec![
                "Cargo.toml".to_string(),
                "README.md".to_string(),
                "LICENSE".to_string(),
                "src/".to_string(),
                "tests/".to_string(),
            ],
            github_entries: vec!["workflows/".to_string()],
            workflow_files: vec!["ci.yml".to_string()],
            readme: Some(
                "# Project\n\n## Installation\n\n```\ncargo add project\n```\n\n## Usage\n\nRun it."
                    .to_string(),
            ),
            fetched_at: Some(Utc::now()),
        }))
    }

    async fn get_rate_limit(&self) -> Result<HashMap<QuotaCategory, RateLimitInfo>, SourceError> {
        let reset_at = Utc::now() + ChronoDuration::minutes(60);
        Ok(QuotaCategory::ALL
            .iter()
            .map(|category| (*category, RateLimitInfo::new(5000, 5000, reset_at)))
            .collect())
    }
}

/// Store whose repository writes fail while job writes succeed.
struct BrokenRepositoryStore {
    inner: MemoryStore,
}

#[async_trait]
impl JobStore for BrokenRepositoryStore {
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn upsert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.upsert_job(job).await
    }

    async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.inner.list_jobs(owner_id, limit).await
    }

    async fn count_active_jobs(&self, owner_id: &str) -> Result<usize, StoreError> {
        self.inner.count_active_jobs(owner_id).await
    }
}

#[async_trait]
impl RepositoryStore for BrokenRepositoryStore {
    async fn get_repository(&self, id: u64) -> Result<Option<RepositoryRecord>, StoreError> {
        self.inner.get_repository(id).await
    }

    async fn upsert_repository(&self, _record: &RepositoryRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn find_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<Vec<RepositoryRecord>, StoreError> {
        self.inner.find_repositories(query).await
    }
}

/// Memory store that can hold the next job read or write until released.
/// The held call completes its store operation first, then waits.
struct StallingStore {
    inner: MemoryStore,
    next_get: Mutex<Option<Arc<Semaphore>>>,
    next_upsert: Mutex<Option<Arc<Semaphore>>>,
    stalled: AtomicBool,
}

impl StallingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            next_get: Mutex::new(None),
            next_upsert: Mutex::new(None),
            stalled: AtomicBool::new(false),
        }
    }

    fn stall_next_get(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.next_get.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn stall_next_upsert(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.next_upsert.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    async fn hold(&self, gate: Option<Arc<Semaphore>>) -> Result<(), StoreError> {
        if let Some(gate) = gate {
            self.stalled.store(true, Ordering::SeqCst);
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for StallingStore {
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = self.inner.get_job(id).await?;
        let gate = self.next_get.lock().unwrap().take();
        self.hold(gate).await?;
        Ok(job)
    }

    async fn upsert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.upsert_job(job).await?;
        let gate = self.next_upsert.lock().unwrap().take();
        self.hold(gate).await
    }

    async fn list_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.inner.list_jobs(owner_id, limit).await
    }

    async fn count_active_jobs(&self, owner_id: &str) -> Result<usize, StoreError> {
        self.inner.count_active_jobs(owner_id).await
    }
}

#[async_trait]
impl RepositoryStore for StallingStore {
    async fn get_repository(&self, id: u64) -> Result<Option<RepositoryRecord>, StoreError> {
        self.inner.get_repository(id).await
    }

    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<(), StoreError> {
        self.inner.upsert_repository(record).await
    }

    async fn find_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<Vec<RepositoryRecord>, StoreError> {
        self.inner.find_repositories(query).await
    }
}

/// Poll `check` until it holds, failing after ten seconds.
async fn wait_until(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

async fn wait_for_status(service: &JobService, job_id: Uuid, status: JobStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if service.get_job_status(job_id).await.unwrap().status() == status {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "job never reached {status}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_batch_size(10)
        .with_batch_delay(Duration::ZERO)
}

fn build_service(
    source: Arc<FakeSource>,
    jobs: Arc<dyn JobStore>,
    repositories: Arc<dyn RepositoryStore>,
    config: PipelineConfig,
) -> JobService {
    let client = Arc::new(
        RateLimitedClient::new(source, Arc::new(RateLimitCache::default()))
            .with_config(config.client_config()),
    );
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        client,
        jobs,
        repositories,
        Arc::new(ScoringEngine::default()),
        config,
    ));
    JobService::new(orchestrator)
}

fn rust_filters() -> SearchFilters {
    SearchFilters {
        language: Some("Rust".to_string()),
        min_stars: Some(100),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_job_completes_all_phases_at_comprehensive_depth() {
    let source = Arc::new(FakeSource::new(12));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(
        source.clone(),
        store.clone(),
        store.clone(),
        test_config().with_batch_size(5),
    );

    let settings = JobSettings::default().with_depth(AnalysisDepth::Comprehensive);
    let job_id = service
        .start_job("alice", "rust scan", rust_filters(), settings)
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.results.found, 12);
    assert_eq!(job.results.collected, 12);
    assert_eq!(job.results.analyzed, 12);
    assert_eq!(job.results.errors, 0);
    assert!((job.progress.percentage - 100.0).abs() < f64::EPSILON);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert!(job.error.is_none());
    assert_eq!(source.quality_calls.load(Ordering::SeqCst), 12);

    let stored = service.get_job_status(job_id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Completed);
    assert_eq!(stored.results, job.results);

    let records = store
        .find_repositories(&RepositoryQuery::new().with_ids(job.results.repository_ids.clone()))
        .await
        .unwrap();
    assert_eq!(records.len(), 12);
    for record in &records {
        assert!(record.metrics().is_some());
        assert!(record.activity().is_some());
        assert!(record.quality().is_some());
        assert_eq!(record.last_job_id(), job_id);
        let score = record.potential_score();
        assert!((0.0..=100.0).contains(&score));
    }
    let expected_high = records.iter().filter(|r| r.potential_score() >= 65.0).count() as u64;
    assert_eq!(job.results.high_potential, expected_high);
}

#[tokio::test]
async fn test_fourth_active_job_is_rejected_without_record() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(FakeSource::new(3).with_search_gate(gate.clone()));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let mut admitted = Vec::new();
    for index in 0..3 {
        let id = service
            .start_job("alice", &format!("scan {}", index), rust_filters(), JobSettings::default())
            .await
            .unwrap();
        admitted.push(id);
    }

    let err = service
        .start_job("alice", "scan 3", rust_filters(), JobSettings::default())
        .await
        .unwrap_err();
    match err {
        JobError::ConcurrencyLimitExceeded { owner_id, active, limit } => {
            assert_eq!(owner_id, "alice");
            assert_eq!(active, 3);
            assert_eq!(limit, 3);
        }
        other => panic!("expected concurrency rejection, got {other:?}"),
    }
    let stored = service.list_jobs("alice", 100).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|job| job.name != "scan 3"));

    // The cap is per owner.
    let other = service
        .start_job("bob", "scan", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    admitted.push(other);

    gate.add_permits(1000);
    for id in admitted {
        let job = service.wait_for(id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
    }

    // Finished jobs free their slots.
    service
        .start_job("alice", "scan 4", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    service.shutdown().await;
}

#[tokio::test]
async fn test_cancel_during_collection_keeps_finished_batches() {
    let source = Arc::new(FakeSource::new(30).with_metrics_delay(Duration::from_millis(50)));
    let store = Arc::new(MemoryStore::new());
    let config = test_config().with_batch_delay(Duration::from_millis(500));
    let service = build_service(source.clone(), store.clone(), store.clone(), config);

    let settings = JobSettings::default().with_depth(AnalysisDepth::Basic);
    let job_id = service
        .start_job("alice", "cancel me", rust_filters(), settings)
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = service.get_job_status(job_id).await.unwrap();
        if job.results.collected >= 10 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "collection never progressed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(service.cancel_job(job_id, "alice").await.unwrap());

    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(job.completed_at.is_some());
    assert_eq!(job.results.found, 30);
    assert_eq!(job.results.collected % 10, 0);
    assert!(job.results.collected >= 10 && job.results.collected < 30);
    assert_eq!(job.results.analyzed, 0);
    assert!(source.metrics_calls.load(Ordering::SeqCst) < 30);

    let records = store
        .find_repositories(&RepositoryQuery::new().with_ids(job.results.repository_ids.clone()))
        .await
        .unwrap();
    let with_metrics = records.iter().filter(|r| r.metrics().is_some()).count() as u64;
    assert_eq!(with_metrics, job.results.collected);

    // Terminal jobs cannot be cancelled again.
    assert!(!service.cancel_job(job_id, "alice").await.unwrap());
}

#[tokio::test]
async fn test_cancel_rejects_unknown_job_and_other_owner() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(FakeSource::new(2).with_search_gate(gate.clone()));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    assert!(!service.cancel_job(Uuid::new_v4(), "alice").await.unwrap());

    let job_id = service
        .start_job("alice", "scan", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    assert!(!service.cancel_job(job_id, "mallory").await.unwrap());

    assert!(service.cancel_job(job_id, "alice").await.unwrap());
    gate.add_permits(100);
    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
}

#[tokio::test]
async fn test_zero_search_results_complete_empty() {
    let source = Arc::new(FakeSource::new(0));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source.clone(), store.clone(), store.clone(), test_config());

    let job_id = service
        .start_job("alice", "nothing", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.results.found, 0);
    assert_eq!(job.results.collected, 0);
    assert_eq!(job.results.analyzed, 0);
    assert!((job.progress.percentage - 100.0).abs() < f64::EPSILON);
    assert_eq!(source.search_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.metrics_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_pages_until_max_results() {
    let source = Arc::new(FakeSource::new(25));
    let store = Arc::new(MemoryStore::new());
    let config = test_config().with_search_page_size(10);
    let service = build_service(source.clone(), store.clone(), store.clone(), config);

    let settings = JobSettings::default()
        .with_max_results(15)
        .with_depth(AnalysisDepth::Basic);
    let job_id = service
        .start_job("alice", "capped", rust_filters(), settings)
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.results.found, 15);
    assert_eq!(job.results.repository_ids.len(), 15);
    assert_eq!(*source.seen_pages.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_item_failures_are_skipped_and_counted() {
    let source = Arc::new(
        FakeSource::new(8)
            .with_missing("owner3/project3")
            .with_missing("owner6/project6"),
    );
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let job_id = service
        .start_job("alice", "partial", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.results.found, 8);
    assert_eq!(job.results.collected, 6);
    assert_eq!(job.results.analyzed, 6);
    assert_eq!(job.results.errors, 2);
    assert!(job
        .logs()
        .any(|entry| entry.message.contains("3") && entry.message.contains("Not Found")));
}

#[tokio::test]
async fn test_store_failure_fails_job() {
    let source = Arc::new(FakeSource::new(5));
    let store = Arc::new(BrokenRepositoryStore {
        inner: MemoryStore::new(),
    });
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let job_id = service
        .start_job("alice", "doomed", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.completed_at.is_some());
    let error = job.error.clone().unwrap();
    assert!(error.contains("disk full"), "unexpected error: {error}");

    let stored = service.get_job_status(job_id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Failed);
}

#[tokio::test]
async fn test_invalid_request_creates_nothing() {
    let source = Arc::new(FakeSource::new(1));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let err = service
        .start_job("alice", "no criteria", SearchFilters::default(), JobSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));
    assert_eq!(store.job_count().await, 0);

    let missing = service.get_job_status(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_shutdown_cancels_live_jobs() {
    let source = Arc::new(FakeSource::new(40).with_metrics_delay(Duration::from_millis(20)));
    let store = Arc::new(MemoryStore::new());
    let config = test_config().with_batch_delay(Duration::from_millis(200));
    let service = build_service(source, store.clone(), store.clone(), config);

    let settings = JobSettings::default().with_depth(AnalysisDepth::Basic);
    let job_id = service
        .start_job("alice", "long", rust_filters(), settings)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let finished = service.shutdown().await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, job_id);
    assert_eq!(finished[0].status(), JobStatus::Cancelled);
    assert_eq!(service.live_jobs(), 0);

    let err = service
        .start_job("alice", "late", rust_filters(), JobSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));
}

#[tokio::test]
async fn test_cancel_reaches_job_being_awaited() {
    let source = Arc::new(FakeSource::new(30).with_metrics_delay(Duration::from_millis(20)));
    let store = Arc::new(MemoryStore::new());
    let config = test_config().with_batch_delay(Duration::from_millis(300));
    let service = Arc::new(build_service(source, store.clone(), store.clone(), config));

    let settings = JobSettings::default().with_depth(AnalysisDepth::Basic);
    let job_id = service
        .start_job("alice", "awaited", rust_filters(), settings)
        .await
        .unwrap();

    let waiter = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.wait_for(job_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.live_jobs(), 1);

    assert!(service.cancel_job(job_id, "alice").await.unwrap());
    let job = waiter.await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(job.results.collected < 30);
    assert_eq!(service.live_jobs(), 0);
}

#[tokio::test]
async fn test_archived_and_fork_results_follow_settings() {
    let mut archived = signal(2, "owner2/archived");
    archived.archived = true;
    let mut fork = signal(3, "owner3/fork");
    fork.fork = true;
    let repositories = vec![
        signal(1, "owner1/plain"),
        archived,
        fork,
        signal(4, "owner4/plain"),
    ];
    let source = Arc::new(FakeSource::from_signals(repositories));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let job_id = service
        .start_job("alice", "defaults", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.results.found, 2);
    let mut ids = job.results.repository_ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 4]);
    assert!(job.logs().any(|entry| entry.message.contains("2 filtered out")));
    assert_eq!(store.repository_count().await, 2);

    let archived_only = JobSettings::default().with_include_archived(true);
    let job_id = service
        .start_job("alice", "archived", rust_filters(), archived_only)
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.results.found, 3);
    assert!(job.results.repository_ids.contains(&2));
    assert!(!job.results.repository_ids.contains(&3));

    let everything = JobSettings::default()
        .with_include_archived(true)
        .with_include_forks(true);
    let job_id = service
        .start_job("alice", "everything", rust_filters(), everything)
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.results.found, 4);
    assert_eq!(store.repository_count().await, 4);
}

#[tokio::test(start_paused = true)]
async fn test_job_past_deadline_fails() {
    let source = Arc::new(FakeSource::new(5).with_metrics_delay(Duration::from_secs(30)));
    let store = Arc::new(MemoryStore::new());
    let config = test_config().with_job_timeout(Duration::from_secs(10));
    let service = build_service(source.clone(), store.clone(), store.clone(), config);

    let job_id = service
        .start_job("alice", "slow", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.completed_at.is_some());
    let error = job.error.clone().unwrap();
    assert!(error.contains("deadline of 10 seconds"), "unexpected error: {error}");
    assert_eq!(job.results.found, 5);
    assert_eq!(job.results.collected, 0);
    assert_eq!(job.results.analyzed, 0);
    assert!(source.metrics_calls.load(Ordering::SeqCst) > 0);

    let stored = service.get_job_status(job_id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Failed);
}

#[tokio::test]
async fn test_rescanned_repositories_are_updated_in_place() {
    let source = Arc::new(FakeSource::new(6));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source, store.clone(), store.clone(), test_config());

    let first_id = service
        .start_job("alice", "first", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let first = service.wait_for(first_id).await.unwrap();
    assert_eq!(first.results.found, 6);
    assert_eq!(store.repository_count().await, 6);

    let second_id = service
        .start_job("bob", "second", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    let second = service.wait_for(second_id).await.unwrap();
    assert_eq!(second.status(), JobStatus::Completed);
    assert_eq!(second.results.found, 6);
    assert_eq!(second.results.collected, 6);
    assert_eq!(store.repository_count().await, 6);

    let records = store
        .find_repositories(&RepositoryQuery::new().with_ids(second.results.repository_ids.clone()))
        .await
        .unwrap();
    assert_eq!(records.len(), 6);
    for record in &records {
        assert_eq!(record.discovered_by(), first_id);
        assert_eq!(record.last_job_id(), second_id);
        assert!(record.metrics().is_some());
    }
}

#[tokio::test]
async fn test_cancel_never_overwrites_finished_job() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(FakeSource::new(3).with_search_gate(gate.clone()));
    let store = Arc::new(StallingStore::new());
    let service = Arc::new(build_service(source, store.clone(), store.clone(), test_config()));

    let job_id = service
        .start_job("alice", "racing", rust_filters(), JobSettings::default())
        .await
        .unwrap();
    wait_for_status(&service, job_id, JobStatus::Running).await;

    // The cancel reads the running job, then stalls while the job finishes.
    let release = store.stall_next_get();
    let canceller = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.cancel_job(job_id, "alice").await })
    };
    wait_until(|| store.is_stalled()).await;

    gate.add_permits(100);
    let job = service.wait_for(job_id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);

    release.add_permits(1);
    assert!(!canceller.await.unwrap().unwrap());
    let stored = service.get_job_status(job_id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Completed);
    assert_eq!(stored.results, job.results);
}

#[tokio::test]
async fn test_cancel_during_admission_stops_job_before_start() {
    let source = Arc::new(FakeSource::new(3));
    let store = Arc::new(StallingStore::new());
    let service = Arc::new(build_service(
        source.clone(),
        store.clone(),
        store.clone(),
        test_config(),
    ));

    // The pending document is written, then admission stalls before spawning.
    let release = store.stall_next_upsert();
    let starter = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .start_job("alice", "admitted", rust_filters(), JobSettings::default())
                .await
        })
    };
    wait_until(|| store.is_stalled()).await;

    let pending = service.list_jobs("alice", 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status(), JobStatus::Pending);
    let job_id = pending[0].id;
    assert!(service.cancel_job(job_id, "alice").await.unwrap());

    release.add_permits(1);
    assert_eq!(starter.await.unwrap().unwrap(), job_id);
    let job = service.wait_for(job_id).await.unwrap();

    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(job.started_at.is_none());
    assert_eq!(source.search_calls.load(Ordering::SeqCst), 0);
    let stored = service.get_job_status(job_id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Cancelled);
}

#[tokio::test]
async fn test_job_without_task_is_cancelled_in_store() {
    let source = Arc::new(FakeSource::new(3));
    let store = Arc::new(MemoryStore::new());
    let service = build_service(source.clone(), store.clone(), store.clone(), test_config());

    let job = Job::new("alice", "left over", rust_filters(), JobSettings::default(), Utc::now());
    store.upsert_job(&job).await.unwrap();

    assert!(service.cancel_job(job.id, "alice").await.unwrap());
    let stored = service.get_job_status(job.id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Cancelled);
    assert!(!service.cancel_job(job.id, "alice").await.unwrap());

    // A run handed the stale pending copy keeps the stored terminal state.
    let finished = service
        .orchestrator()
        .run(job.clone(), CancellationToken::new())
        .await;
    assert_eq!(finished.status(), JobStatus::Cancelled);
    assert_eq!(source.search_calls.load(Ordering::SeqCst), 0);
    let stored = service.get_job_status(job.id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Cancelled);
}
