//! Quality gates.
//!
//! Each gate is an independent check over one rendered image and its Facts.
//! Gates never fail: problems with their inputs are reported as a
//! [`GateResult`] with [`GateStatus::Error`].

mod background;
mod color_accuracy;
mod constraints;
mod edge_quality;
mod perceptual;

pub use background::BackgroundPurityGate;
pub use color_accuracy::ColorAccuracyGate;
pub use constraints::{CheckStatus, ConstraintCheck, ConstraintGate};
pub use edge_quality::{density_band_score, EdgeQualityGate};
pub use perceptual::{
    FixedScoreOracle, OracleScore, PerceptualGate, PerceptualOracle, SidecarScoreOracle,
    UnavailableOracle,
};

use crate::facts::GarmentFacts;
use crate::raster::RenderedImage;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Gate identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Sampled color vs. Facts color
    ColorAccuracy,
    /// Alpha/edge quality
    EdgeQuality,
    /// Background whiteness and uniformity
    Background,
    /// Structural constraints
    Constraints,
    /// Perceptual oracle
    Perceptual,
}

impl GateKind {
    /// Stable gate name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ColorAccuracy => "color_accuracy",
            Self::EdgeQuality => "edge_quality",
            Self::Background => "background",
            Self::Constraints => "constraints",
            Self::Perceptual => "perceptual",
        }
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Evaluation status of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// The gate measured the image
    Evaluated,
    /// The gate had nothing to measure (e.g. oracle unavailable)
    Skipped,
    /// The gate could not evaluate its inputs
    Error,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evaluated => write!(f, "evaluated"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one gate
///
/// Non-finite scores serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    /// Gate name
    pub gate_name: String,
    /// Evaluation status
    pub status: GateStatus,
    /// Whether the gate passed
    pub passed: bool,
    /// Gate score (meaning depends on the gate)
    pub score: f64,
    /// Threshold the score was compared against
    pub threshold: f64,
    /// Gate-specific measurements
    pub details: BTreeMap<String, Value>,
}

impl GateResult {
    /// An evaluated result
    #[must_use]
    pub fn evaluated(kind: GateKind, passed: bool, score: f64, threshold: f64) -> Self {
        Self {
            gate_name: kind.name().to_string(),
            status: GateStatus::Evaluated,
            passed,
            score,
            threshold,
            details: BTreeMap::new(),
        }
    }

    /// A skipped result (counts as passed)
    #[must_use]
    pub fn skipped(kind: GateKind, score: f64, threshold: f64) -> Self {
        Self {
            status: GateStatus::Skipped,
            ..Self::evaluated(kind, true, score, threshold)
        }
    }

    /// An error result carrying `details.error`
    #[must_use]
    pub fn error(kind: GateKind, score: f64, threshold: f64, message: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Error,
            ..Self::evaluated(kind, false, score, threshold)
        }
        .with_detail("error", message.into())
    }

    /// Add a detail entry
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Look up a detail entry
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Whether this result belongs to `kind`
    #[must_use]
    pub fn is(&self, kind: GateKind) -> bool {
        self.gate_name == kind.name()
    }
}

/// Borrowed inputs for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    /// Identifier (file stem) of the image
    pub image_id: &'a str,
    /// Decoded render
    pub image: &'a RenderedImage,
    /// Garment Facts
    pub facts: &'a GarmentFacts,
    /// Optional segmentation mask
    pub mask: Option<&'a GrayImage>,
}

impl<'a> GateInput<'a> {
    /// Inputs without a mask
    #[must_use]
    pub const fn new(image_id: &'a str, image: &'a RenderedImage, facts: &'a GarmentFacts) -> Self {
        Self {
            image_id,
            image,
            facts,
            mask: None,
        }
    }

    /// Attach a segmentation mask
    #[must_use]
    pub const fn with_mask(mut self, mask: Option<&'a GrayImage>) -> Self {
        self.mask = mask;
        self
    }
}

/// A single independent quality check
pub trait QualityGate: Send + Sync + std::fmt::Debug {
    /// Gate identity
    fn kind(&self) -> GateKind;

    /// Evaluate the gate; never fails
    fn evaluate(&self, input: &GateInput<'_>) -> GateResult;
}

/// Round for stable report output
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names() {
        assert_eq!(GateKind::ColorAccuracy.name(), "color_accuracy");
        assert_eq!(GateKind::Perceptual.to_string(), "perceptual");
        for kind in [
            GateKind::ColorAccuracy,
            GateKind::EdgeQuality,
            GateKind::Background,
            GateKind::Constraints,
            GateKind::Perceptual,
        ] {
            assert!(crate::config::KNOWN_GATES.contains(&kind.name()));
        }
    }

    #[test]
    fn test_error_result() {
        let result = GateResult::error(GateKind::ColorAccuracy, f64::INFINITY, 3.0, "bad hex");
        assert_eq!(result.status, GateStatus::Error);
        assert!(!result.passed);
        assert_eq!(result.detail("error").unwrap(), "bad hex");
        assert!(result.is(GateKind::ColorAccuracy));
    }

    #[test]
    fn test_skipped_result_passes() {
        let result = GateResult::skipped(GateKind::Perceptual, 0.9, 0.75);
        assert_eq!(result.status, GateStatus::Skipped);
        assert!(result.passed);
    }

    #[test]
    fn test_infinite_score_serializes_as_null() {
        let result = GateResult::error(GateKind::ColorAccuracy, f64::INFINITY, 3.0, "x");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["score"].is_null());
        assert_eq!(json["status"], "error");
        assert_eq!(json["gate_name"], "color_accuracy");
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123_456), 0.1235);
    }
}
