//! The persisted per-repository document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::github::{ActivitySignals, QualitySignals, RepositoryMetrics, RepositorySignal};
use crate::scoring::{RevivalAssessment, ScoringEngine, ScoringInput};

/// Signal groups fetched in one collection pass. Absent groups keep their
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct SignalUpdate {
    pub signal: Option<RepositorySignal>,
    pub metrics: Option<RepositoryMetrics>,
    pub activity: Option<ActivitySignals>,
    pub quality: Option<QualitySignals>,
}

impl SignalUpdate {
    pub fn is_empty(&self) -> bool {
        self.signal.is_none()
            && self.metrics.is_none()
            && self.activity.is_none()
            && self.quality.is_none()
    }
}

/// Accumulated signals for one repository and the assessment derived from
/// them.
///
/// Fields are private so the assessment can only be replaced together with
/// the signal groups it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    id: u64,
    full_name: String,
    signal: RepositorySignal,
    metrics: Option<RepositoryMetrics>,
    activity: Option<ActivitySignals>,
    quality: Option<QualitySignals>,
    revival: RevivalAssessment,
    /// Job that first discovered the repository.
    discovered_by: Uuid,
    /// Job that last updated the repository.
    last_job_id: Uuid,
    first_seen_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RepositoryRecord {
    /// Minimal record with signal-derived initial scores.
    pub fn from_signal(
        signal: RepositorySignal,
        job_id: Uuid,
        engine: &ScoringEngine,
        now: DateTime<Utc>,
    ) -> Self {
        let revival = engine.assess(&ScoringInput::new(&signal, now));
        Self {
            id: signal.id,
            full_name: signal.full_name.clone(),
            signal,
            metrics: None,
            activity: None,
            quality: None,
            revival,
            discovered_by: job_id,
            last_job_id: job_id,
            first_seen_at: now,
            updated_at: now,
        }
    }

    /// Merge `update` and rescore. The new assessment and the groups it was
    /// computed from are swapped in together. An empty update only records
    /// `job_id` as the last job to touch the record.
    pub fn apply(
        &mut self,
        update: SignalUpdate,
        job_id: Uuid,
        engine: &ScoringEngine,
        now: DateTime<Utc>,
    ) {
        if update.is_empty() {
            self.last_job_id = job_id;
            self.updated_at = now;
            return;
        }

        let signal = update.signal.unwrap_or_else(|| self.signal.clone());
        let metrics = update.metrics.or_else(|| self.metrics.clone());
        let activity = update.activity.or_else(|| self.activity.clone());
        let quality = update.quality.or_else(|| self.quality.clone());

        let revival = engine.assess(&Self::input(&signal, &metrics, &activity, &quality, now));

        self.full_name = signal.full_name.clone();
        self.signal = signal;
        self.metrics = metrics;
        self.activity = activity;
        self.quality = quality;
        self.revival = revival;
        self.last_job_id = job_id;
        self.updated_at = now;
    }

    /// Recompute the assessment from the current signal groups.
    pub fn rescore(&mut self, engine: &ScoringEngine, now: DateTime<Utc>) -> &RevivalAssessment {
        self.revival = engine.assess(&self.scoring_input(now));
        self.updated_at = now;
        &self.revival
    }

    pub fn scoring_input(&self, now: DateTime<Utc>) -> ScoringInput<'_> {
        Self::input(&self.signal, &self.metrics, &self.activity, &self.quality, now)
    }

    fn input<'a>(
        signal: &'a RepositorySignal,
        metrics: &'a Option<RepositoryMetrics>,
        activity: &'a Option<ActivitySignals>,
        quality: &'a Option<QualitySignals>,
        now: DateTime<Utc>,
    ) -> ScoringInput<'a> {
        ScoringInput {
            signal,
            metrics: metrics.as_ref(),
            activity: activity.as_ref(),
            quality: quality.as_ref(),
            now,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.signal.owner_and_name()
    }

    pub fn signal(&self) -> &RepositorySignal {
        &self.signal
    }

    pub fn metrics(&self) -> Option<&RepositoryMetrics> {
        self.metrics.as_ref()
    }

    pub fn activity(&self) -> Option<&ActivitySignals> {
        self.activity.as_ref()
    }

    pub fn quality(&self) -> Option<&QualitySignals> {
        self.quality.as_ref()
    }

    pub fn revival(&self) -> &RevivalAssessment {
        &self.revival
    }

    pub fn potential_score(&self) -> f64 {
        self.revival.potential_score
    }

    pub fn discovered_by(&self) -> Uuid {
        self.discovered_by
    }

    pub fn last_job_id(&self) -> Uuid {
        self.last_job_id
    }

    pub fn first_seen_at(&self) -> DateTime<Utc> {
        self.first_seen_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn signal() -> RepositorySignal {
        RepositorySignal {
            id: 42,
            full_name: "acme/widget".into(),
            description: Some("Widgets for everyone".into()),
            html_url: "https://github.com/acme/widget".into(),
            stars: 800,
            forks: 90,
            watchers: 800,
            open_issues: 25,
            size_kb: 4_000,
            language: Some("Go".into()),
            license: Some("Apache-2.0".into()),
            topics: vec!["cli".into()],
            archived: false,
            fork: false,
            created_at: now() - Duration::days(2_000),
            pushed_at: Some(now() - Duration::days(500)),
            updated_at: None,
        }
    }

    fn metrics() -> RepositoryMetrics {
        RepositoryMetrics {
            stars: 810,
            forks: 91,
            subscribers: 40,
            open_issues: 25,
            size_kb: 4_100,
            contributors: Some(18),
            network_count: Some(91),
            has_wiki: true,
            has_pages: false,
            has_discussions: true,
            fetched_at: now(),
        }
    }

    #[test]
    fn test_from_signal_scores_immediately() {
        let engine = ScoringEngine::default();
        let job = Uuid::new_v4();
        let record = RepositoryRecord::from_signal(signal(), job, &engine, now());
        assert_eq!(record.id(), 42);
        assert_eq!(record.full_name(), "acme/widget");
        assert_eq!(record.discovered_by(), job);
        assert!(record.metrics().is_none());
        assert_eq!(
            record.revival(),
            &engine.assess(&ScoringInput::new(&signal(), now()))
        );
    }

    #[test]
    fn test_apply_replaces_revival_from_current_groups() {
        let engine = ScoringEngine::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut record = RepositoryRecord::from_signal(signal(), first, &engine, now());
        let initial = record.revival().clone();

        let later = now() + Duration::hours(1);
        record.apply(
            SignalUpdate {
                metrics: Some(metrics()),
                ..Default::default()
            },
            second,
            &engine,
            later,
        );

        assert_eq!(record.metrics(), Some(&metrics()));
        assert_eq!(record.last_job_id(), second);
        assert_eq!(record.discovered_by(), first);
        assert_ne!(record.revival(), &initial);
        assert_eq!(record.revival(), &engine.assess(&record.scoring_input(later)));
    }

    #[test]
    fn test_apply_keeps_absent_groups() {
        let engine = ScoringEngine::default();
        let job = Uuid::new_v4();
        let mut record = RepositoryRecord::from_signal(signal(), job, &engine, now());
        record.apply(
            SignalUpdate {
                metrics: Some(metrics()),
                ..Default::default()
            },
            job,
            &engine,
            now(),
        );
        record.apply(SignalUpdate::default(), job, &engine, now());
        assert!(record.metrics().is_some());
    }

    #[test]
    fn test_empty_update_keeps_assessment() {
        let engine = ScoringEngine::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut record = RepositoryRecord::from_signal(signal(), first, &engine, now());
        let initial = record.revival().clone();

        let much_later = now() + Duration::days(400);
        let update = SignalUpdate::default();
        assert!(update.is_empty());
        record.apply(update, second, &engine, much_later);

        assert_eq!(record.revival(), &initial);
        assert_eq!(record.last_job_id(), second);
        assert_eq!(record.updated_at(), much_later);
    }

    #[test]
    fn test_rescore_is_deterministic() {
        let engine = ScoringEngine::default();
        let mut record = RepositoryRecord::from_signal(signal(), Uuid::new_v4(), &engine, now());
        let first = record.rescore(&engine, now()).clone();
        let second = record.rescore(&engine, now()).clone();
        assert_eq!(first, second);
    }
}
