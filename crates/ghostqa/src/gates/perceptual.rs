//! Perceptual gate backed by an injected oracle.
//!
//! Learned perceptual metrics live outside this crate. The gate only sees a
//! [`PerceptualOracle`] that either returns a score or says it is unavailable.

use super::{GateInput, GateKind, GateResult, QualityGate};
use crate::config::{PerceptualConfig, UnavailableSemantic};
use crate::raster::RenderedImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of asking an oracle for a score
#[derive(Debug, Clone, PartialEq)]
pub enum OracleScore {
    /// Score in `[0, 1]`, higher is better
    Available(f64),
    /// No score (oracle disabled, timed out, missing data)
    Unavailable {
        /// Why no score was produced
        reason: String,
    },
}

impl OracleScore {
    /// Shorthand for an unavailable score
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Source of perceptual scores
pub trait PerceptualOracle: Send + Sync + std::fmt::Debug {
    /// Oracle name recorded in gate details
    fn name(&self) -> &str;

    /// Score one render
    fn score(&self, image_id: &str, image: &RenderedImage) -> OracleScore;
}

/// Oracle that never has a score
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOracle;

impl PerceptualOracle for UnavailableOracle {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn score(&self, _image_id: &str, _image: &RenderedImage) -> OracleScore {
        OracleScore::unavailable("no perceptual oracle configured")
    }
}

/// Oracle returning the same score for every image
#[derive(Debug, Clone, Copy)]
pub struct FixedScoreOracle {
    score: f64,
}

impl FixedScoreOracle {
    /// Create an oracle that always answers `score`
    #[must_use]
    pub const fn new(score: f64) -> Self {
        Self { score }
    }
}

impl PerceptualOracle for FixedScoreOracle {
    fn name(&self) -> &str {
        "fixed"
    }

    fn score(&self, _image_id: &str, _image: &RenderedImage) -> OracleScore {
        OracleScore::Available(self.score)
    }
}

/// Reads `{image_id}.perceptual.json` files written by an external scorer
#[derive(Debug, Clone)]
pub struct SidecarScoreOracle {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Sidecar {
    score: f64,
}

impl SidecarScoreOracle {
    /// Read sidecars from `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sidecar path for an image
    #[must_use]
    pub fn sidecar_path(&self, image_id: &str) -> PathBuf {
        self.dir.join(format!("{image_id}.perceptual.json"))
    }

    /// Directory holding the sidecars
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PerceptualOracle for SidecarScoreOracle {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn score(&self, image_id: &str, _image: &RenderedImage) -> OracleScore {
        let path = self.sidecar_path(image_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                return OracleScore::unavailable(format!("no sidecar {}: {e}", path.display()))
            }
        };
        match serde_json::from_str::<Sidecar>(&content) {
            Ok(Sidecar { score }) if score.is_finite() && (0.0..=1.0).contains(&score) => {
                OracleScore::Available(score)
            }
            Ok(Sidecar { score }) => {
                OracleScore::unavailable(format!("sidecar score {score} outside [0, 1]"))
            }
            Err(e) => OracleScore::unavailable(format!("malformed sidecar {}: {e}", path.display())),
        }
    }
}

/// Wraps a [`PerceptualOracle`] with a pass threshold
#[derive(Debug, Clone)]
pub struct PerceptualGate {
    oracle: Arc<dyn PerceptualOracle>,
    min_score: f64,
    neutral_score: f64,
    policy: UnavailableSemantic,
}

impl PerceptualGate {
    /// Create the gate
    ///
    /// `neutral_score` and `policy` describe how the aggregator treats a
    /// missing score; they are recorded in the skipped result.
    #[must_use]
    pub fn new(
        oracle: Arc<dyn PerceptualOracle>,
        config: &PerceptualConfig,
        neutral_score: f64,
        policy: UnavailableSemantic,
    ) -> Self {
        Self {
            oracle,
            min_score: config.min_score,
            neutral_score,
            policy,
        }
    }

    /// Gate with no oracle
    #[must_use]
    pub fn disabled(config: &PerceptualConfig, neutral_score: f64) -> Self {
        Self::new(
            Arc::new(UnavailableOracle),
            config,
            neutral_score,
            UnavailableSemantic::Neutral,
        )
    }
}

impl QualityGate for PerceptualGate {
    fn kind(&self) -> GateKind {
        GateKind::Perceptual
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateResult {
        match self.oracle.score(input.image_id, input.image) {
            OracleScore::Available(score) => {
                let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
                let passed = score >= self.min_score;
                tracing::debug!(image = input.image_id, score, passed, "perceptual evaluated");
                GateResult::evaluated(self.kind(), passed, score, self.min_score)
                    .with_detail("oracle", self.oracle.name())
            }
            OracleScore::Unavailable { reason } => {
                tracing::debug!(image = input.image_id, %reason, "perceptual oracle unavailable");
                let policy = match self.policy {
                    UnavailableSemantic::Neutral => "neutral",
                    UnavailableSemantic::Redistribute => "redistribute",
                };
                GateResult::skipped(self.kind(), self.neutral_score, self.min_score)
                    .with_detail("oracle", "unavailable")
                    .with_detail("reason", reason)
                    .with_detail("policy", policy)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::facts::GarmentFacts;
    use crate::gates::GateStatus;
    use image::RgbaImage;

    fn image() -> RenderedImage {
        RenderedImage::from_rgba(RgbaImage::new(4, 4))
    }

    fn gate(oracle: Arc<dyn PerceptualOracle>) -> PerceptualGate {
        PerceptualGate::new(
            oracle,
            &PerceptualConfig::default(),
            0.9,
            UnavailableSemantic::Neutral,
        )
    }

    fn run(gate: &PerceptualGate, id: &str) -> GateResult {
        let image = image();
        let facts = GarmentFacts::default();
        gate.evaluate(&GateInput::new(id, &image, &facts))
    }

    #[test]
    fn test_unavailable_is_skipped_and_passes() {
        let result = run(&PerceptualGate::disabled(&PerceptualConfig::default(), 0.9), "a");
        assert_eq!(result.status, GateStatus::Skipped);
        assert!(result.passed);
        assert_eq!(result.score, 0.9);
        assert_eq!(result.detail("oracle").unwrap(), "unavailable");
        assert_eq!(result.detail("policy").unwrap(), "neutral");
        assert!(result.detail("reason").is_some());
    }

    #[test]
    fn test_fixed_score_threshold() {
        let high = run(&gate(Arc::new(FixedScoreOracle::new(0.8))), "a");
        assert_eq!(high.status, GateStatus::Evaluated);
        assert!(high.passed);
        assert_eq!(high.detail("oracle").unwrap(), "fixed");

        let low = run(&gate(Arc::new(FixedScoreOracle::new(0.5))), "a");
        assert!(!low.passed);
        assert_eq!(low.threshold, 0.75);
    }

    #[test]
    fn test_out_of_range_fixed_score_is_clamped() {
        let result = run(&gate(Arc::new(FixedScoreOracle::new(7.0))), "a");
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_sidecar_oracle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shirt.perceptual.json"), r#"{"score": 0.82}"#).unwrap();
        std::fs::write(dir.path().join("bad.perceptual.json"), "not json").unwrap();
        std::fs::write(dir.path().join("wild.perceptual.json"), r#"{"score": 3.0}"#).unwrap();
        let oracle = SidecarScoreOracle::new(dir.path());

        assert_eq!(oracle.score("shirt", &image()), OracleScore::Available(0.82));
        assert!(matches!(oracle.score("bad", &image()), OracleScore::Unavailable { .. }));
        assert!(matches!(oracle.score("wild", &image()), OracleScore::Unavailable { .. }));
        assert!(matches!(oracle.score("missing", &image()), OracleScore::Unavailable { .. }));

        let result = run(&gate(Arc::new(oracle)), "shirt");
        assert_eq!(result.score, 0.82);
        assert_eq!(result.detail("oracle").unwrap(), "sidecar");
    }
}
