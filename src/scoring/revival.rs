//! Revival potential: eight factors, dynamic weights and a confidence
//! multiplier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::business::BusinessBreakdown;
use super::code_quality::CodeQualityBreakdown;
use super::weights::{RevivalWeights, WeightAdjustments};
use super::{clamp_score, log_scale, ScoringInput};

/// The eight revival factors, each in [0, 100]. Higher is always better for
/// revival, including `revival_complexity` (higher means easier to revive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevivalFactors {
    pub abandonment: f64,
    pub community: f64,
    pub technical: f64,
    pub business: f64,
    pub market_timing: f64,
    pub competitive_advantage: f64,
    pub revival_complexity: f64,
    pub community_readiness: f64,
}

const FACTOR_NAMES: [&str; 8] = [
    "abandonment opportunity",
    "community",
    "technical foundation",
    "business potential",
    "market timing",
    "competitive advantage",
    "ease of revival",
    "community readiness",
];

impl RevivalFactors {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.abandonment,
            self.community,
            self.technical,
            self.business,
            self.market_timing,
            self.competitive_advantage,
            self.revival_complexity,
            self.community_readiness,
        ]
    }

    /// Weighted sum of the factors. Monotone non-decreasing in every factor
    /// because the weights are non-negative.
    pub fn combine(&self, weights: &RevivalWeights) -> f64 {
        self.as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(factor, weight)| clamp_score(*factor) * weight)
            .sum()
    }

    fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FACTOR_NAMES.into_iter().zip(self.as_array())
    }
}

/// Score bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevivalTier {
    Excellent,
    High,
    Medium,
    MediumLow,
    Low,
    NotRecommended,
}

impl RevivalTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 65.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Medium
        } else if score >= 35.0 {
            Self::MediumLow
        } else if score >= 20.0 {
            Self::Low
        } else {
            Self::NotRecommended
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        match self {
            Self::Excellent | Self::High => Recommendation::High,
            Self::Medium | Self::MediumLow => Recommendation::Medium,
            Self::Low => Recommendation::Low,
            Self::NotRecommended => Recommendation::NotRecommended,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Self::Excellent => {
                "Exceptional revival candidate with strong community, code and market signals"
            }
            Self::High => "Strong revival candidate with real demand and a recoverable codebase",
            Self::Medium => {
                "Moderate revival potential; worth a closer look before committing effort"
            }
            Self::MediumLow => {
                "Below-average revival potential; a revival needs a clear motivating use case"
            }
            Self::Low => "Weak revival potential; significant effort for a limited expected return",
            Self::NotRecommended => "Not recommended for revival",
        }
    }
}

impl fmt::Display for RevivalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "excellent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::MediumLow => "medium-low",
            Self::Low => "low",
            Self::NotRecommended => "not-recommended",
        };
        f.write_str(s)
    }
}

/// Recommendation derived from the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    High,
    Medium,
    Low,
    NotRecommended,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::NotRecommended => "not-recommended",
        };
        f.write_str(s)
    }
}

/// Full result of one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevivalAssessment {
    pub potential_score: f64,
    /// Weighted factor sum before the confidence multiplier.
    pub raw_score: f64,
    pub confidence: f64,
    pub confidence_multiplier: f64,
    pub tier: RevivalTier,
    pub recommendation: Recommendation,
    pub reasoning: Vec<String>,
    pub factors: RevivalFactors,
    pub weights: RevivalWeights,
    pub adjustments: WeightAdjustments,
    pub code_quality: CodeQualityBreakdown,
    pub business: BusinessBreakdown,
    pub assessed_at: DateTime<Utc>,
}

impl RevivalAssessment {
    pub fn is_high_potential(&self, threshold: f64) -> bool {
        self.potential_score >= threshold
    }
}

const MAINSTREAM_LANGUAGES: &[&str] = &[
    "Rust", "Go", "Python", "TypeScript", "JavaScript", "Java", "Kotlin", "C#", "C++", "C",
    "Ruby", "PHP", "Swift", "Scala", "Elixir", "Dart",
];

const TRENDING_LANGUAGES: &[&str] = &[
    "Rust", "Go", "TypeScript", "Python", "Kotlin", "Zig", "Elixir", "Swift",
];

const TRENDING_TOPICS: &[&str] = &[
    "ai",
    "llm",
    "machine-learning",
    "deep-learning",
    "artificial-intelligence",
    "webassembly",
    "wasm",
    "devtools",
    "developer-tools",
    "automation",
    "security",
    "cloud-native",
    "kubernetes",
    "observability",
    "serverless",
    "edge",
    "privacy",
    "local-first",
];

/// Compute the eight factors.
pub fn factors(
    input: &ScoringInput<'_>,
    code_quality: &CodeQualityBreakdown,
    business: &BusinessBreakdown,
) -> RevivalFactors {
    RevivalFactors {
        abandonment: abandonment(input),
        community: community(input),
        technical: (code_quality.overall + technical_feasibility(input)) / 2.0,
        business: business.overall,
        market_timing: market_timing(input),
        competitive_advantage: competitive_advantage(input),
        revival_complexity: revival_ease(input),
        community_readiness: community_readiness(input),
    }
}

/// Long-dormant but not ancient projects are the best revival targets.
fn abandonment(input: &ScoringInput<'_>) -> f64 {
    let days = input.days_since_activity();
    let mut score = match days {
        d if d < 90 => 15.0,
        d if d < 180 => 35.0,
        d if d < 365 => 60.0,
        d if d < 1_095 => 85.0,
        d if d < 1_825 => 70.0,
        _ => 50.0,
    };
    if input.signal.archived {
        score += 10.0;
    }
    if days >= 365 && input.activity.and_then(|a| a.commits_last_year) == Some(0) {
        score += 5.0;
    }
    clamp_score(score)
}

fn community(input: &ScoringInput<'_>) -> f64 {
    let depth = match (input.contributors(), input.subscribers()) {
        (Some(contributors), _) => log_scale(contributors as f64, 300.0),
        (None, Some(subscribers)) => log_scale(subscribers as f64, 2_000.0),
        (None, None) => 0.5 * log_scale(input.stars() as f64, 50_000.0),
    };
    clamp_score(
        100.0
            * (0.45 * log_scale(input.stars() as f64, 50_000.0)
                + 0.30 * log_scale(input.forks() as f64, 10_000.0)
                + 0.25 * depth),
    )
}

fn technical_feasibility(input: &ScoringInput<'_>) -> f64 {
    let signal = input.signal;
    let mut score = 35.0_f64;
    if signal.language.is_some() {
        score += 15.0;
    }
    if signal.language_is(MAINSTREAM_LANGUAGES) {
        score += 15.0;
    }
    score += match input.size_kb() {
        0..=50_000 => 15.0,
        50_001..=200_000 => 5.0,
        _ => -10.0,
    };
    if signal.license.is_some() {
        score += 10.0;
    }
    if signal.archived {
        score -= 5.0;
    }
    if input.activity.and_then(|a| a.latest_release_at).is_some() {
        score += 5.0;
    }
    clamp_score(score)
}

fn market_timing(input: &ScoringInput<'_>) -> f64 {
    let signal = input.signal;
    let trending = signal
        .topics
        .iter()
        .filter(|t| TRENDING_TOPICS.iter().any(|c| t.eq_ignore_ascii_case(c)))
        .count()
        .min(3);
    let mut score = 45.0 + 10.0 * trending as f64;
    if signal.language_is(TRENDING_LANGUAGES) {
        score += 10.0;
    }
    if input.days_since_activity() < 3 * 365 {
        score += 10.0;
    }
    clamp_score(score)
}

fn competitive_advantage(input: &ScoringInput<'_>) -> f64 {
    let signal = input.signal;
    let stars_per_year = input.stars() as f64 / signal.age_years(input.now);
    let mut score = 60.0 * log_scale(stars_per_year, 2_000.0);
    if signal.topics.len() >= 3 {
        score += 15.0;
    }
    if signal.description.as_deref().is_some_and(|d| !d.trim().is_empty()) {
        score += 10.0;
    }
    if signal.license.is_some() {
        score += 10.0;
    }
    if input
        .metrics
        .is_some_and(|m| m.has_pages || m.has_discussions)
    {
        score += 5.0;
    }
    clamp_score(score)
}

/// Inverse of revival difficulty: big codebases, large issue backlogs and
/// long dormancy all make a revival harder.
fn revival_ease(input: &ScoringInput<'_>) -> f64 {
    let years_dormant = (input.days_since_activity() as f64 / 365.25).min(6.0);
    let difficulty = 45.0 * log_scale(input.size_kb() as f64, 1_000_000.0)
        + 30.0 * log_scale(input.open_issues() as f64, 2_000.0)
        + 25.0 * years_dormant / 6.0;
    clamp_score(100.0 - difficulty)
}

fn community_readiness(input: &ScoringInput<'_>) -> f64 {
    let contribution_signal = match (
        input.activity.and_then(|a| a.open_pull_requests),
        input.contributors(),
    ) {
        (Some(prs), _) => log_scale(prs as f64, 100.0),
        (None, Some(contributors)) => log_scale(contributors as f64, 100.0),
        (None, None) => 0.3,
    };
    let watchers = input
        .subscribers()
        .map(|s| s as f64)
        .unwrap_or(input.stars() as f64 / 10.0);
    clamp_score(
        100.0
            * (0.35 * log_scale(input.forks() as f64, 5_000.0)
                + 0.30 * log_scale(input.open_issues() as f64, 500.0)
                + 0.20 * contribution_signal
                + 0.15 * log_scale(watchers, 500.0)),
    )
}

/// Confidence in [0, 100], driven by how many signals are available.
pub fn confidence(input: &ScoringInput<'_>) -> f64 {
    let signal = input.signal;
    let mut score = 20.0_f64;
    score += 20.0 * log_scale(input.stars() as f64, 10_000.0);
    score += 10.0 * log_scale(input.forks() as f64, 5_000.0);
    score += 5.0 * log_scale(input.open_issues() as f64, 500.0);
    if input.size_kb() > 0 {
        score += 5.0;
    }
    if signal.description.is_some() {
        score += 5.0;
    }
    if signal.language.is_some() {
        score += 5.0;
    }
    if signal.license.is_some() {
        score += 5.0;
    }
    if !signal.topics.is_empty() {
        score += 5.0;
    }
    if input.metrics.is_some() {
        score += 10.0;
    }
    if input.activity.is_some() {
        score += 10.0;
    }
    if input.quality.is_some() {
        score += 15.0;
    }
    score.min(100.0)
}

/// `max(0.5, confidence / 100)`, capped at 1.0.
pub fn confidence_multiplier(confidence: f64) -> f64 {
    (confidence / 100.0).clamp(0.5, 1.0)
}

/// Reasoning lines keyed to the tier, the confidence band and the standout
/// factors.
pub fn reasoning(tier: RevivalTier, confidence: f64, factors: &RevivalFactors) -> Vec<String> {
    let mut lines = vec![tier.summary().to_string()];

    lines.push(
        if confidence >= 80.0 {
            "High confidence: assessment is based on rich repository signals"
        } else if confidence >= 50.0 {
            "Moderate confidence: some signal groups were unavailable"
        } else {
            "Low confidence: limited data; collect more signals before deciding"
        }
        .to_string(),
    );

    let mut ranked: Vec<(&str, f64)> = factors.named().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    if let Some((name, score)) = ranked.first() {
        if *score >= 75.0 {
            lines.push(format!("Strongest factor: {} ({:.0})", name, score));
        }
    }
    if let Some((name, score)) = ranked.last() {
        if *score < 30.0 {
            lines.push(format!("Weakest factor: {} ({:.0})", name, score));
        }
    }

    lines
}
