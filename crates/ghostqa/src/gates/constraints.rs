//! Structural constraints from the Facts contract.
//!
//! Sub-checks run only when Facts ask for them. Checks without a detector
//! (visible mannequin, label text, mandatory features) are reported as
//! `unverified` instead of passing silently.

use super::{round4, GateInput, GateKind, GateResult, QualityGate};
use crate::config::ConstraintConfig;
use crate::raster::{edge_density, outer_contours};
use image::GrayImage;
use serde::Serialize;
use std::cell::OnceCell;

const POCKET_CANNY: (f32, f32) = (50.0, 150.0);
const HALO_CANNY: (f32, f32) = (30.0, 100.0);
const POCKET_ASPECT_MIN: f64 = 0.3;
const POCKET_ASPECT_MAX: f64 = 3.0;

/// Forbidden elements with an edge-density detector
const EDGE_DETECTED_ELEMENTS: [&str; 2] = ["halo", "fringing"];

/// Outcome of one sub-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Verified and satisfied
    Passed,
    /// Verified and violated
    Failed,
    /// No detector available
    Unverified,
}

/// One constraint sub-check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintCheck {
    /// Check name (e.g. `pocket_count`, `forbidden_element:halo`)
    pub name: String,
    /// Outcome
    pub status: CheckStatus,
    /// Human-readable measurement
    pub detail: String,
}

impl ConstraintCheck {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

/// Pocket count, forbidden elements and label text checks
#[derive(Debug, Clone, Default)]
pub struct ConstraintGate {
    config: ConstraintConfig,
}

impl ConstraintGate {
    /// Create the gate
    #[must_use]
    pub const fn new(config: ConstraintConfig) -> Self {
        Self { config }
    }

    /// Count pocket-like outer contours on the luminance edge map
    #[must_use]
    pub fn detect_pockets(&self, luminance: &GrayImage) -> u32 {
        let (w, h) = luminance.dimensions();
        if w < 3 || h < 3 {
            return 0;
        }
        let edges = imageproc::edges::canny(luminance, POCKET_CANNY.0, POCKET_CANNY.1);
        let candidates = outer_contours(&edges)
            .into_iter()
            .filter(|c| c.area > self.config.pocket_min_area && c.area < self.config.pocket_max_area)
            .filter(|c| {
                let aspect = c.aspect_ratio();
                aspect > POCKET_ASPECT_MIN && aspect < POCKET_ASPECT_MAX
            })
            .count();
        (candidates as u32).min(self.config.max_pockets)
    }

    fn pocket_check(&self, expected: u32, luminance: &GrayImage) -> (ConstraintCheck, Option<String>) {
        let detected = self.detect_pockets(luminance);
        let detail = format!("expected {expected}, detected {detected}");
        if expected.abs_diff(detected) > self.config.pocket_tolerance {
            let failure = format!("pocket_count_mismatch: {detail}");
            (
                ConstraintCheck::new("pocket_count", CheckStatus::Failed, detail),
                Some(failure),
            )
        } else {
            (ConstraintCheck::new("pocket_count", CheckStatus::Passed, detail), None)
        }
    }

    fn forbidden_check(
        &self,
        element: &str,
        halo_density: impl FnOnce() -> f64,
    ) -> (ConstraintCheck, Option<String>) {
        let name = format!("forbidden_element:{element}");
        let normalized = element.trim().to_lowercase();
        if !EDGE_DETECTED_ELEMENTS.contains(&normalized.as_str()) {
            return (
                ConstraintCheck::new(name, CheckStatus::Unverified, "no detector available"),
                None,
            );
        }

        let density = halo_density();
        let detail = format!(
            "edge density {:.4} (max {:.4})",
            density, self.config.halo_edge_density_max
        );
        if density > self.config.halo_edge_density_max {
            (
                ConstraintCheck::new(name, CheckStatus::Failed, detail),
                Some(format!("forbidden_element_detected: {element}")),
            )
        } else {
            (ConstraintCheck::new(name, CheckStatus::Passed, detail), None)
        }
    }
}

impl QualityGate for ConstraintGate {
    fn kind(&self) -> GateKind {
        GateKind::Constraints
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateResult {
        let facts = input.facts;
        let luminance: OnceCell<GrayImage> = OnceCell::new();
        let luma = || luminance.get_or_init(|| input.image.luminance());
        let halo: OnceCell<f64> = OnceCell::new();

        let mut checks = Vec::new();
        let mut failures = Vec::new();

        let expected_pockets = facts.garment.pockets_count;
        if expected_pockets > 0 {
            let (check, failure) = self.pocket_check(expected_pockets, luma());
            checks.push(check);
            failures.extend(failure);
        }

        for element in &facts.constraints.forbidden_elements {
            let (check, failure) = self.forbidden_check(element, || {
                *halo.get_or_init(|| edge_density(luma(), HALO_CANNY.0, HALO_CANNY.1))
            });
            checks.push(check);
            failures.extend(failure);
        }

        if let Some(label) = facts.label_text() {
            checks.push(ConstraintCheck::new(
                "label_text",
                CheckStatus::Unverified,
                format!("'{label}' requires OCR"),
            ));
        }

        for feature in &facts.constraints.mandatory_features {
            checks.push(ConstraintCheck::new(
                format!("mandatory_feature:{feature}"),
                CheckStatus::Unverified,
                "no detector available",
            ));
        }

        let verified = checks
            .iter()
            .filter(|c| c.status != CheckStatus::Unverified)
            .count();
        let verified_passed = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Passed)
            .count();
        let score = if verified == 0 {
            1.0
        } else {
            verified_passed as f64 / verified as f64
        };
        let unverified: Vec<&str> = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Unverified)
            .map(|c| c.name.as_str())
            .collect();
        let passed = failures.is_empty();

        if !unverified.is_empty() {
            tracing::debug!(image = input.image_id, ?unverified, "constraints left unverified");
        }
        tracing::debug!(
            image = input.image_id,
            score,
            failures = failures.len(),
            "constraints evaluated"
        );

        GateResult::evaluated(self.kind(), passed, round4(score), 1.0)
            .with_detail("checks", serde_json::to_value(&checks).unwrap_or_default())
            .with_detail("failures", failures)
            .with_detail("unverified", unverified)
    }
}
