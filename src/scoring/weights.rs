//! Revival factor weights and the replaceable scoring policy.

use serde::{Deserialize, Serialize};

use super::business::BusinessWeights;
use super::code_quality::CodeQualityWeights;
use super::ScoringInput;

/// Weight of each revival factor. After [`RevivalWeights::normalized`] the
/// weights are non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevivalWeights {
    pub abandonment: f64,
    pub community: f64,
    pub technical: f64,
    pub business: f64,
    pub market_timing: f64,
    pub competitive_advantage: f64,
    pub revival_complexity: f64,
    pub community_readiness: f64,
}

impl Default for RevivalWeights {
    fn default() -> Self {
        Self {
            abandonment: 0.20,
            community: 0.20,
            technical: 0.20,
            business: 0.15,
            market_timing: 0.10,
            competitive_advantage: 0.05,
            revival_complexity: 0.05,
            community_readiness: 0.05,
        }
    }
}

impl RevivalWeights {
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

    pub fn from_array(values: [f64; 8]) -> Self {
        Self {
            abandonment: values[0],
            community: values[1],
            technical: values[2],
            business: values[3],
            market_timing: values[4],
            competitive_advantage: values[5],
            revival_complexity: values[6],
            community_readiness: values[7],
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Clamp negatives to zero and rescale so the weights sum to 1.0.
    /// A degenerate all-zero vector falls back to uniform weights.
    pub fn normalized(&self) -> Self {
        let clamped = self.as_array().map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        let total: f64 = clamped.iter().sum();
        if total <= f64::EPSILON {
            return Self::from_array([1.0 / 8.0; 8]);
        }
        Self::from_array(clamped.map(|w| w / total))
    }
}

/// Which weight shifts applied to a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustments {
    pub systems_language: bool,
    pub business_topics: bool,
    /// Stars or forks at or past the high-traction threshold.
    pub high_traction: bool,
    /// Share of the traction shift applied, in [0, 1]. Ramps up linearly
    /// from half the threshold to the threshold.
    #[serde(default)]
    pub traction: f64,
}

impl WeightAdjustments {
    pub fn without_traction(self) -> Self {
        Self {
            traction: 0.0,
            ..self
        }
    }
}

/// Replaceable heuristic policy: sub-score weights, base revival weights and
/// the thresholds that trigger dynamic weight shifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub code_quality: CodeQualityWeights,
    pub business: BusinessWeights,
    pub revival: RevivalWeights,
    pub systems_languages: Vec<String>,
    pub business_topics: Vec<String>,
    /// Star count at which the traction shift applies in full. The shift
    /// starts at half this count.
    pub high_traction_stars: u64,
    /// Fork count at which the traction shift applies in full.
    pub high_traction_forks: u64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            code_quality: CodeQualityWeights::default(),
            business: BusinessWeights::default(),
            revival: RevivalWeights::default(),
            systems_languages: ["Rust", "Go", "C", "C++", "Zig", "Nim", "Assembly"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            business_topics: [
                "saas",
                "business",
                "enterprise",
                "ecommerce",
                "e-commerce",
                "fintech",
                "payments",
                "crm",
                "erp",
                "marketplace",
                "startup",
                "b2b",
                "analytics",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            high_traction_stars: 1_000,
            high_traction_forks: 250,
        }
    }
}

impl ScoringPolicy {
    /// Which shifts apply to `input`.
    pub fn adjustments_for(&self, input: &ScoringInput<'_>) -> WeightAdjustments {
        let signal = input.signal;
        let systems_language = signal
            .language
            .as_deref()
            .map(|lang| {
                self.systems_languages
                    .iter()
                    .any(|l| l.eq_ignore_ascii_case(lang))
            })
            .unwrap_or(false);
        let business_topics = signal.topics.iter().any(|topic| {
            self.business_topics
                .iter()
                .any(|t| t.eq_ignore_ascii_case(topic))
        });
        let high_traction =
            input.stars() >= self.high_traction_stars || input.forks() >= self.high_traction_forks;
        let traction = traction_ramp(input.stars(), self.high_traction_stars)
            .max(traction_ramp(input.forks(), self.high_traction_forks));

        WeightAdjustments {
            systems_language,
            business_topics,
            high_traction,
            traction,
        }
    }

    /// Base weights shifted for `adjustments`, then renormalized.
    pub fn weights_for(&self, adjustments: WeightAdjustments) -> RevivalWeights {
        let mut w = self.revival;

        if adjustments.systems_language {
            w.technical += 0.10;
            w.business -= 0.05;
            w.community -= 0.05;
        }
        if adjustments.business_topics {
            w.business += 0.10;
            w.technical -= 0.05;
            w.market_timing += 0.05;
            w.abandonment -= 0.10;
        }
        let t = adjustments.traction.clamp(0.0, 1.0);
        if t > 0.0 {
            w.community += 0.10 * t;
            w.community_readiness += 0.05 * t;
            w.technical -= 0.05 * t;
            w.revival_complexity -= 0.05 * t;
            w.abandonment -= 0.05 * t;
        }

        w.normalized()
    }
}

/// 0 below `full / 2`, 1 at `full` and above, linear in between.
fn traction_ramp(value: u64, full: u64) -> f64 {
    if full == 0 {
        return 1.0;
    }
    let start = full as f64 / 2.0;
    ((value as f64 - start) / (full as f64 - start)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_adjustments() -> Vec<WeightAdjustments> {
        let mut out = Vec::new();
        for systems_language in [false, true] {
            for business_topics in [false, true] {
                for traction in [0.0, 0.5, 1.0] {
                    out.push(WeightAdjustments {
                        systems_language,
                        business_topics,
                        high_traction: traction >= 1.0,
                        traction,
                    });
                }
            }
        }
        out
    }

    #[test]
    fn test_weights_sum_to_one_for_every_adjustment() {
        let policy = ScoringPolicy::default();
        for adjustments in all_adjustments() {
            let w = policy.weights_for(adjustments);
            assert!((w.sum() - 1.0).abs() < 1e-9, "{:?} sums to {}", adjustments, w.sum());
            assert!(w.as_array().iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_systems_language_shift() {
        let policy = ScoringPolicy::default();
        let w = policy.weights_for(WeightAdjustments {
            systems_language: true,
            ..Default::default()
        });
        assert!((w.technical - 0.30).abs() < 1e-9);
        assert!((w.business - 0.10).abs() < 1e-9);
        assert!((w.community - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_traction_ramp() {
        assert_eq!(traction_ramp(0, 1_000), 0.0);
        assert_eq!(traction_ramp(500, 1_000), 0.0);
        assert!((traction_ramp(750, 1_000) - 0.5).abs() < 1e-9);
        assert_eq!(traction_ramp(1_000, 1_000), 1.0);
        assert_eq!(traction_ramp(80_000, 1_000), 1.0);
        assert_eq!(traction_ramp(3, 0), 1.0);
    }

    #[test]
    fn test_traction_shift_is_continuous_at_threshold() {
        let policy = ScoringPolicy::default();
        let below = policy.weights_for(WeightAdjustments {
            traction: traction_ramp(999, 1_000),
            ..Default::default()
        });
        let at = policy.weights_for(WeightAdjustments {
            high_traction: true,
            traction: traction_ramp(1_000, 1_000),
            ..Default::default()
        });
        for (a, b) in below.as_array().iter().zip(at.as_array()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
        assert!((at.community - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_negative_weights_clamped_before_normalizing() {
        let skewed = RevivalWeights {
            abandonment: -0.5,
            ..Default::default()
        };
        let w = skewed.normalized();
        assert_eq!(w.abandonment, 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_policy_is_renormalized() {
        let policy = ScoringPolicy {
            revival: RevivalWeights::from_array([2.0; 8]),
            ..Default::default()
        };
        let w = policy.weights_for(WeightAdjustments::default());
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert!((w.abandonment - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_falls_back_to_uniform() {
        let w = RevivalWeights::from_array([0.0; 8]).normalized();
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }
}
