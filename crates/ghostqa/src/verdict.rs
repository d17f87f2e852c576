//! Per-image verdicts.
//!
//! [`QaEngine`] runs every gate on one render, aggregates the scores and
//! applies the blocking-gate veto.

use crate::aggregator::{GateScores, HierarchicalAggregator, QualityTier, Recommendation};
use crate::config::QaConfig;
use crate::facts::{GarmentFacts, PartAnalysis};
use crate::gates::{
    BackgroundPurityGate, ColorAccuracyGate, ConstraintGate, EdgeQualityGate, GateInput,
    GateKind, GateResult, GateStatus, PerceptualGate, PerceptualOracle, QualityGate,
    UnavailableOracle,
};
use crate::raster::RenderedImage;
use crate::result::QaResult;
use chrono::{DateTime, Utc};
use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;

/// Component scores reported in a verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VerdictScores {
    /// Edge quality score
    pub edge: f64,
    /// Background purity score
    pub background: f64,
    /// Color fidelity `clamp(1 - ΔE/20)`
    pub color_fidelity: f64,
    /// Semantic score used, `None` when unavailable and redistributed
    pub semantic: Option<f64>,
}

/// Quality verdict for one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaVerdict {
    /// Image identifier (file stem)
    pub image_id: String,
    /// Weighted total in `[0, 1]`
    pub qa_total: f64,
    /// Final decision
    pub passed: bool,
    /// What to do with the render
    pub recommendation: Recommendation,
    /// Quality band of `qa_total`
    pub quality_tier: QualityTier,
    /// Component scores
    pub scores: VerdictScores,
    /// Raw color ΔE (`null` when the color gate errored)
    pub delta_e: f64,
    /// Blocking gates that failed and vetoed acceptance
    pub blocking_gates: Vec<String>,
    /// Gate results in evaluation order
    pub gate_results: Vec<GateResult>,
    /// Per-part analysis completeness from Facts
    pub part_analysis: PartAnalysis,
    /// When the verdict was produced
    pub timestamp: DateTime<Utc>,
}

impl QaVerdict {
    /// Result of one gate
    #[must_use]
    pub fn gate(&self, kind: GateKind) -> Option<&GateResult> {
        self.gate_results.iter().find(|g| g.is(kind))
    }

    /// Edge quality score
    #[must_use]
    pub const fn edge_score(&self) -> f64 {
        self.scores.edge
    }

    /// Background purity score
    #[must_use]
    pub const fn background_purity(&self) -> f64 {
        self.scores.background
    }
}

/// Runs all gates and builds verdicts
#[derive(Debug, Clone)]
pub struct QaEngine {
    config: QaConfig,
    gates: Vec<Arc<dyn QualityGate>>,
    aggregator: HierarchicalAggregator,
}

impl QaEngine {
    /// Build an engine with no perceptual oracle
    pub fn new(config: QaConfig) -> QaResult<Self> {
        Self::with_oracle(config, Arc::new(UnavailableOracle))
    }

    /// Build an engine around a perceptual oracle
    pub fn with_oracle(config: QaConfig, oracle: Arc<dyn PerceptualOracle>) -> QaResult<Self> {
        config.ensure_valid()?;
        let aggregator = HierarchicalAggregator::new(&config.aggregator)?;
        let gates: Vec<Arc<dyn QualityGate>> = vec![
            Arc::new(ColorAccuracyGate::new(config.color_accuracy.clone())),
            Arc::new(EdgeQualityGate::new(config.edge_quality.clone())),
            Arc::new(BackgroundPurityGate::new(config.background.clone())),
            Arc::new(ConstraintGate::new(config.constraints.clone())),
            Arc::new(PerceptualGate::new(
                oracle,
                &config.perceptual,
                config.aggregator.neutral_semantic_score,
                config.aggregator.unavailable_semantic,
            )),
        ];
        Ok(Self {
            config,
            gates,
            aggregator,
        })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Evaluate one render against its Facts
    #[must_use]
    pub fn evaluate(
        &self,
        image_id: &str,
        image: &RenderedImage,
        facts: &GarmentFacts,
        mask: Option<&GrayImage>,
    ) -> QaVerdict {
        let input = GateInput::new(image_id, image, facts).with_mask(mask);
        let gate_results: Vec<GateResult> = self.gates.iter().map(|g| g.evaluate(&input)).collect();

        let score_of = |kind: GateKind| {
            gate_results
                .iter()
                .find(|g| g.is(kind))
                .filter(|g| g.status != GateStatus::Error)
                .map(|g| g.score)
        };
        let delta_e = gate_results
            .iter()
            .find(|g| g.is(GateKind::ColorAccuracy))
            .map_or(f64::INFINITY, |g| g.score);
        let semantic = gate_results
            .iter()
            .find(|g| g.is(GateKind::Perceptual))
            .filter(|g| g.status == GateStatus::Evaluated)
            .map(|g| g.score);

        let aggregate = self.aggregator.aggregate(&GateScores {
            edge: score_of(GateKind::EdgeQuality).unwrap_or(0.0),
            background: score_of(GateKind::Background).unwrap_or(0.0),
            delta_e,
            semantic,
        });

        let blocking_gates: Vec<String> = self
            .config
            .aggregator
            .blocking_gates
            .iter()
            .filter(|name| {
                gate_results
                    .iter()
                    .any(|g| &g.gate_name == *name && !g.passed)
            })
            .cloned()
            .collect();

        let passed = aggregate.passed && blocking_gates.is_empty();
        let recommendation = if passed {
            Recommendation::Accept
        } else {
            Recommendation::ReRender
        };

        tracing::debug!(
            image = image_id,
            qa_total = aggregate.qa_total,
            passed,
            ?blocking_gates,
            "verdict built"
        );

        QaVerdict {
            image_id: image_id.to_string(),
            qa_total: aggregate.qa_total,
            passed,
            recommendation,
            quality_tier: aggregate.quality_tier,
            scores: VerdictScores {
                edge: aggregate.components.edge,
                background: aggregate.components.background,
                color_fidelity: aggregate.components.color_fidelity,
                semantic: aggregate.components.semantic,
            },
            delta_e,
            blocking_gates,
            gate_results,
            part_analysis: facts.part_analysis(),
            timestamp: Utc::now(),
        }
    }
}
