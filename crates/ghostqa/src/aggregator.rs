//! Hierarchical aggregation of gate scores into a single QA total.
//!
//! ```text
//! edge ──────────┐
//! background ────┤  weighted sum   ┌─────────┐
//! color (ΔE) ────┼───────────────▶ │qa_total │ ─▶ accept / re-render
//! semantic (opt) ┘                 └─────────┘
//! ```
//!
//! The aggregator is a pure function of its inputs and configuration.

use crate::config::{AggregatorConfig, AggregatorWeights, UnavailableSemantic, WEIGHT_SUM_TOLERANCE};
use crate::result::{QaError, QaResult};
use serde::{Deserialize, Serialize};

/// ΔE at which color fidelity reaches zero
pub const COLOR_FIDELITY_SPAN: f64 = 20.0;

/// Map ΔE to a fidelity score: `clamp(1 - ΔE / 20, 0, 1)`
///
/// Non-finite ΔE (errored color gate) yields 0.
#[must_use]
pub fn color_fidelity(delta_e: f64) -> f64 {
    if delta_e.is_finite() {
        (1.0 - delta_e / COLOR_FIDELITY_SPAN).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Final recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    /// Ship the render
    #[serde(rename = "accept")]
    Accept,
    /// Generate the render again
    #[serde(rename = "re-render")]
    ReRender,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::ReRender => write!(f, "re-render"),
        }
    }
}

/// Coarse quality band of a QA total
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Below 0.6
    Critical,
    /// 0.6 and above
    Poor,
    /// 0.7 and above
    Acceptable,
    /// 0.8 and above
    Good,
    /// 0.9 and above
    Excellent,
}

impl QualityTier {
    /// Classify a QA total
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::Good
        } else if score >= 0.7 {
            Self::Acceptable
        } else if score >= 0.6 {
            Self::Poor
        } else {
            Self::Critical
        }
    }

    /// Lowercase tier name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Poor => "poor",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw inputs to the aggregator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateScores {
    /// Edge quality score
    pub edge: f64,
    /// Background purity score
    pub background: f64,
    /// Color ΔE (may be `+inf` when the color gate errored)
    pub delta_e: f64,
    /// Perceptual score, `None` when the oracle was unavailable
    pub semantic: Option<f64>,
}

/// Normalized component scores in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// Edge quality
    pub edge: f64,
    /// Background purity
    pub background: f64,
    /// Color fidelity derived from ΔE
    pub color_fidelity: f64,
    /// Semantic score actually used (`None` when redistributed)
    pub semantic: Option<f64>,
}

/// Aggregation output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    /// Weighted total in `[0, 1]`
    pub qa_total: f64,
    /// `qa_total >= pass_threshold`
    pub passed: bool,
    /// Recommendation from `passed`
    pub recommendation: Recommendation,
    /// Quality band
    pub quality_tier: QualityTier,
    /// Normalized inputs
    pub components: ComponentScores,
    /// Weights actually applied
    pub weights: AggregatorWeights,
}

/// Weighted combination of gate scores
#[derive(Debug, Clone)]
pub struct HierarchicalAggregator {
    weights: AggregatorWeights,
    pass_threshold: f64,
    neutral_semantic_score: f64,
    policy: UnavailableSemantic,
}

impl Default for HierarchicalAggregator {
    fn default() -> Self {
        let config = AggregatorConfig::default();
        Self {
            weights: config.weights,
            pass_threshold: config.pass_threshold,
            neutral_semantic_score: config.neutral_semantic_score,
            policy: config.unavailable_semantic,
        }
    }
}

fn unit(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl HierarchicalAggregator {
    /// Build from configuration, rejecting weights that do not sum to 1
    pub fn new(config: &AggregatorConfig) -> QaResult<Self> {
        let sum = config.weights.sum();
        if !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(QaError::config(format!(
                "aggregator weights must sum to 1.0 (got {sum:.6})"
            )));
        }
        if config.unavailable_semantic == UnavailableSemantic::Redistribute
            && config.weights.semantic >= 1.0
        {
            return Err(QaError::config(
                "cannot redistribute a semantic weight of 1.0",
            ));
        }
        Ok(Self {
            weights: config.weights,
            pass_threshold: config.pass_threshold,
            neutral_semantic_score: config.neutral_semantic_score,
            policy: config.unavailable_semantic,
        })
    }

    /// Configured weights
    #[must_use]
    pub const fn weights(&self) -> AggregatorWeights {
        self.weights
    }

    /// Pass threshold
    #[must_use]
    pub const fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Weights applied when the semantic score is missing
    fn effective_weights(&self, semantic_available: bool) -> AggregatorWeights {
        if semantic_available || self.policy == UnavailableSemantic::Neutral {
            return self.weights;
        }
        let rest = self.weights.edge + self.weights.background + self.weights.color;
        AggregatorWeights {
            edge: self.weights.edge / rest,
            background: self.weights.background / rest,
            color: self.weights.color / rest,
            semantic: 0.0,
        }
    }

    /// Combine gate scores
    #[must_use]
    pub fn aggregate(&self, scores: &GateScores) -> AggregateScore {
        let weights = self.effective_weights(scores.semantic.is_some());
        debug_assert!(
            (weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
            "aggregator weights sum to {}",
            weights.sum()
        );

        let semantic = match (scores.semantic, self.policy) {
            (Some(s), _) => Some(unit(s)),
            (None, UnavailableSemantic::Neutral) => Some(unit(self.neutral_semantic_score)),
            (None, UnavailableSemantic::Redistribute) => None,
        };
        let components = ComponentScores {
            edge: unit(scores.edge),
            background: unit(scores.background),
            color_fidelity: color_fidelity(scores.delta_e),
            semantic,
        };

        let qa_total = (weights.edge * components.edge
            + weights.background * components.background
            + weights.color * components.color_fidelity
            + weights.semantic * components.semantic.unwrap_or(0.0))
        .clamp(0.0, 1.0);
        let passed = qa_total >= self.pass_threshold;

        AggregateScore {
            qa_total,
            passed,
            recommendation: if passed {
                Recommendation::Accept
            } else {
                Recommendation::ReRender
            },
            quality_tier: QualityTier::from_score(qa_total),
            components,
            weights,
        }
    }
}
