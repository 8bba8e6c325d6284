//! Business evaluation: how much demand and commercial room a project has.

use serde::{Deserialize, Serialize};

use super::{clamp_score, log_scale, ScoringInput};

/// Relative weight of each business sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusinessWeights {
    pub market_demand: f64,
    pub competitor_analysis: f64,
    pub user_engagement: f64,
    pub monetization_potential: f64,
    pub scalability: f64,
    /// Applied to the inverted risk, so lower risk scores higher.
    pub risk_assessment: f64,
}

impl Default for BusinessWeights {
    fn default() -> Self {
        Self {
            market_demand: 0.25,
            competitor_analysis: 0.15,
            user_engagement: 0.20,
            monetization_potential: 0.20,
            scalability: 0.10,
            risk_assessment: 0.10,
        }
    }
}

impl BusinessWeights {
    pub fn total(&self) -> f64 {
        self.market_demand
            + self.competitor_analysis
            + self.user_engagement
            + self.monetization_potential
            + self.scalability
            + self.risk_assessment
    }
}

/// Business sub-scores, all in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessBreakdown {
    pub market_demand: f64,
    pub competitor_analysis: f64,
    pub user_engagement: f64,
    pub monetization_potential: f64,
    pub scalability: f64,
    /// Raw risk; higher is riskier.
    pub risk: f64,
    /// `100 - risk`, the value that enters the weighted sum.
    pub risk_assessment: f64,
    pub overall: f64,
}

const IN_DEMAND_TOPICS: &[&str] = &[
    "ai",
    "machine-learning",
    "llm",
    "api",
    "web",
    "cloud",
    "devops",
    "security",
    "data",
    "database",
    "automation",
    "mobile",
    "developer-tools",
];

const COMMERCIAL_TOPICS: &[&str] = &[
    "saas",
    "api",
    "platform",
    "enterprise",
    "ecommerce",
    "e-commerce",
    "fintech",
    "payments",
    "analytics",
    "crm",
    "cms",
    "marketplace",
    "b2b",
];

const SCALABLE_TOPICS: &[&str] = &[
    "docker",
    "kubernetes",
    "cloud",
    "distributed",
    "microservices",
    "serverless",
];

const PERMISSIVE_LICENSES: &[&str] = &[
    "MIT",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "ISC",
    "0BSD",
    "Unlicense",
];
const COPYLEFT_LICENSES: &[&str] = &[
    "GPL-2.0", "GPL-3.0", "AGPL-3.0", "LGPL-2.1", "LGPL-3.0", "MPL-2.0",
];

const SERVER_LANGUAGES: &[&str] = &[
    "Rust", "Go", "C", "C++", "Java", "Scala", "Kotlin", "Elixir", "Erlang", "C#",
];
const SCRIPTING_LANGUAGES: &[&str] = &["TypeScript", "JavaScript", "Python", "Ruby", "PHP"];

/// Evaluate business potential.
pub fn evaluate(input: &ScoringInput<'_>, weights: &BusinessWeights) -> BusinessBreakdown {
    let signal = input.signal;

    let mut market_demand = 80.0 * log_scale(input.stars() as f64, 50_000.0);
    if signal.has_topic(IN_DEMAND_TOPICS) {
        market_demand += 15.0;
    }
    if signal.language_is(SCRIPTING_LANGUAGES) || signal.language_is(SERVER_LANGUAGES) {
        market_demand += 5.0;
    }

    let description_len = signal.description.as_deref().map_or(0, |d| d.trim().len());
    let mut competitor_analysis = 40.0_f64;
    if description_len >= 40 {
        competitor_analysis += 15.0;
    }
    competitor_analysis += 5.0 * signal.topics.len().min(5) as f64;
    if signal.license.is_some() {
        competitor_analysis += 10.0;
    }
    if signal.fork {
        competitor_analysis -= 20.0;
    }

    let community_depth = match (input.contributors(), input.subscribers()) {
        (Some(contributors), _) => log_scale(contributors as f64, 300.0),
        (None, Some(subscribers)) => log_scale(subscribers as f64, 2_000.0),
        (None, None) => 0.5 * log_scale(input.stars() as f64, 50_000.0),
    };
    let user_engagement = 100.0
        * (0.5 * log_scale(input.forks() as f64, 10_000.0)
            + 0.3 * community_depth
            + 0.2 * log_scale(input.open_issues() as f64, 1_000.0));

    let license_room = match signal.license.as_deref() {
        Some(l) if PERMISSIVE_LICENSES.iter().any(|p| p.eq_ignore_ascii_case(l)) => 80.0,
        Some(l) if COPYLEFT_LICENSES.iter().any(|p| p.eq_ignore_ascii_case(l)) => 50.0,
        Some(_) => 60.0,
        None => 20.0,
    };
    let mut monetization_potential = license_room;
    if signal.has_topic(COMMERCIAL_TOPICS) {
        monetization_potential += 20.0;
    }

    let mut scalability = if signal.language_is(SERVER_LANGUAGES) {
        80.0
    } else if signal.language_is(SCRIPTING_LANGUAGES) {
        65.0
    } else if signal.language.is_some() {
        50.0
    } else {
        40.0
    };
    if signal.has_topic(SCALABLE_TOPICS) {
        scalability += 10.0;
    }

    let mut risk = 0.0_f64;
    if signal.license.is_none() {
        risk += 30.0;
    }
    if signal.archived {
        risk += 20.0;
    }
    risk += match input.days_since_activity() {
        d if d > 730 => 25.0,
        d if d > 365 => 15.0,
        _ => 0.0,
    };
    if input.open_issues() > 500 {
        risk += 10.0;
    }
    if signal.fork {
        risk += 15.0;
    }
    if description_len == 0 {
        risk += 10.0;
    }
    let risk = clamp_score(risk);
    let risk_assessment = 100.0 - risk;

    let market_demand = clamp_score(market_demand);
    let competitor_analysis = clamp_score(competitor_analysis);
    let user_engagement = clamp_score(user_engagement);
    let monetization_potential = clamp_score(monetization_potential);
    let scalability = clamp_score(scalability);

    let total = weights.total();
    let overall = if total > 0.0 {
        (market_demand * weights.market_demand
            + competitor_analysis * weights.competitor_analysis
            + user_engagement * weights.user_engagement
            + monetization_potential * weights.monetization_potential
            + scalability * weights.scalability
            + risk_assessment * weights.risk_assessment)
            / total
    } else {
        0.0
    };

    BusinessBreakdown {
        market_demand,
        competitor_analysis,
        user_engagement,
        monetization_potential,
        scalability,
        risk,
        risk_assessment,
        overall: clamp_score(overall),
    }
}
