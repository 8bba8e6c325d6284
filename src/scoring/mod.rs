//! Scoring engine: code quality, business evaluation and revival potential.
//!
//! Every function here is pure. The evaluation time is passed in through
//! [`ScoringInput::now`], so scoring the same snapshot twice yields the same
//! assessment.
//!
//! # Example
//!
//! ```ignore
//! use chrono::Utc;
//! use revival_scout::scoring::{ScoringEngine, ScoringInput};
//!
//! let engine = ScoringEngine::default();
//! let assessment = engine.assess(&ScoringInput::new(&signal, Utc::now()).with_metrics(&metrics));
//! println!("{} -> {}", assessment.potential_score, assessment.recommendation);
//! ```

pub mod business;
pub mod code_quality;
pub mod revival;
pub mod weights;

use chrono::{DateTime, Utc};

use crate::github::{ActivitySignals, QualitySignals, RepositoryMetrics, RepositorySignal};

pub use business::{BusinessBreakdown, BusinessWeights};
pub use code_quality::{CodeQualityBreakdown, CodeQualityWeights, ReadmeAnalysis};
pub use revival::{Recommendation, RevivalAssessment, RevivalFactors, RevivalTier};
pub use weights::{RevivalWeights, ScoringPolicy, WeightAdjustments};

/// Clamp a score into [0, 100]. NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// `ln(1 + value) / ln(1 + saturation)`, clamped to [0, 1].
pub(crate) fn log_scale(value: f64, saturation: f64) -> f64 {
    if value <= 0.0 || saturation <= 0.0 {
        return 0.0;
    }
    ((1.0 + value).ln() / (1.0 + saturation).ln()).min(1.0)
}

/// Everything known about one repository at evaluation time.
///
/// Detailed metrics take precedence over the search snapshot when both are
/// present.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub signal: &'a RepositorySignal,
    pub metrics: Option<&'a RepositoryMetrics>,
    pub activity: Option<&'a ActivitySignals>,
    pub quality: Option<&'a QualitySignals>,
    pub now: DateTime<Utc>,
}

impl<'a> ScoringInput<'a> {
    pub fn new(signal: &'a RepositorySignal, now: DateTime<Utc>) -> Self {
        Self {
            signal,
            metrics: None,
            activity: None,
            quality: None,
            now,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a RepositoryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_activity(mut self, activity: &'a ActivitySignals) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn with_quality(mut self, quality: &'a QualitySignals) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn stars(&self) -> u64 {
        self.metrics.map_or(self.signal.stars, |m| m.stars)
    }

    pub fn forks(&self) -> u64 {
        self.metrics.map_or(self.signal.forks, |m| m.forks)
    }

    pub fn open_issues(&self) -> u64 {
        self.metrics.map_or(self.signal.open_issues, |m| m.open_issues)
    }

    pub fn size_kb(&self) -> u64 {
        self.metrics.map_or(self.signal.size_kb, |m| m.size_kb)
    }

    /// Real watcher count. Search results only carry the star count under
    /// that name, so this needs detailed metrics.
    pub fn subscribers(&self) -> Option<u64> {
        self.metrics.map(|m| m.subscribers)
    }

    pub fn contributors(&self) -> Option<u64> {
        self.metrics.and_then(|m| m.contributors)
    }

    /// Most recent of the last push and the last commit.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        let pushed = self.signal.pushed_at.unwrap_or(self.signal.created_at);
        match self.activity.and_then(|a| a.last_commit_at) {
            Some(commit) if commit > pushed => commit,
            _ => pushed,
        }
    }

    pub fn days_since_activity(&self) -> i64 {
        (self.now - self.last_activity_at()).num_days().max(0)
    }
}

/// Stateless scorer parameterized by a [`ScoringPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Code quality from the file listing, or an estimate without one.
    pub fn code_quality(&self, input: &ScoringInput<'_>) -> CodeQualityBreakdown {
        match input.quality {
            Some(quality) => {
                code_quality::evaluate(quality, input.size_kb(), &self.policy.code_quality)
            }
            None => {
                code_quality::estimate(input.signal, input.size_kb(), &self.policy.code_quality)
            }
        }
    }

    pub fn business(&self, input: &ScoringInput<'_>) -> BusinessBreakdown {
        business::evaluate(input, &self.policy.business)
    }

    /// Run the full scoring pass.
    pub fn assess(&self, input: &ScoringInput<'_>) -> RevivalAssessment {
        let code_quality = self.code_quality(input);
        let business = self.business(input);
        let factors = revival::factors(input, &code_quality, &business);

        // The traction shift applies only when it raises the score, which
        // keeps the score non-decreasing in stars and forks.
        let mut adjustments = self.policy.adjustments_for(input);
        let mut weights = self.policy.weights_for(adjustments);
        if adjustments.traction > 0.0 {
            let plain = self.policy.weights_for(adjustments.without_traction());
            if factors.combine(&plain) > factors.combine(&weights) {
                adjustments = adjustments.without_traction();
                weights = plain;
            }
        }

        let confidence = revival::confidence(input);
        let multiplier = revival::confidence_multiplier(confidence);
        let raw_score = clamp_score(factors.combine(&weights));
        let potential_score = clamp_score(raw_score * multiplier);

        let tier = RevivalTier::from_score(potential_score);
        let reasoning = revival::reasoning(tier, confidence, &factors);

        RevivalAssessment {
            potential_score,
            raw_score,
            confidence,
            confidence_multiplier: multiplier,
            tier,
            recommendation: tier.recommendation(),
            reasoning,
            factors,
            weights,
            adjustments,
            code_quality,
            business,
            assessed_at: input.now,
        }
    }
}
