//! Edge and alpha quality.
//!
//! With an alpha channel the gate combines alpha statistics, blur-stability
//! SSIM and alpha edge density. Without one it falls back to a banded
//! luminance edge density and reports low confidence.

use super::{round4, GateInput, GateKind, GateResult, QualityGate};
use crate::config::EdgeQualityConfig;
use crate::raster::{box_blur_3x3, edge_density, windowed_ssim};

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Below this density the render looks empty
const DENSITY_FLOOR: f64 = 0.01;
/// Above this density edges look like artifacts
const DENSITY_CEILING: f64 = 0.10;
/// Density at which the fallback score reaches zero
const DENSITY_ZERO: f64 = 0.20;

/// Scores alpha matte and edge quality
#[derive(Debug, Clone, Default)]
pub struct EdgeQualityGate {
    config: EdgeQualityConfig,
}

/// Fallback score for a luminance edge density
///
/// Rises linearly to 1.0 at 0.01, stays at 1.0 up to 0.10, then decays
/// linearly to 0.0 at 0.20.
#[must_use]
pub fn density_band_score(density: f64) -> f64 {
    if !density.is_finite() || density <= 0.0 {
        0.0
    } else if density < DENSITY_FLOOR {
        density / DENSITY_FLOOR
    } else if density <= DENSITY_CEILING {
        1.0
    } else {
        (1.0 - (density - DENSITY_CEILING) / (DENSITY_ZERO - DENSITY_CEILING)).max(0.0)
    }
}

impl EdgeQualityGate {
    /// Create the gate
    #[must_use]
    pub const fn new(config: EdgeQualityConfig) -> Self {
        Self { config }
    }

    fn evaluate_with_alpha(&self, input: &GateInput<'_>) -> GateResult {
        let alpha = input.image.alpha_plane();
        let n = alpha.pixels().len().max(1) as f64;

        let alpha_mean = alpha.pixels().map(|p| f64::from(p[0])).sum::<f64>() / n / 255.0;
        let alpha_var = alpha
            .pixels()
            .map(|p| (f64::from(p[0]) / 255.0 - alpha_mean).powi(2))
            .sum::<f64>()
            / n;
        let alpha_std = alpha_var.sqrt();
        let density = edge_density(&alpha, CANNY_LOW, CANNY_HIGH);

        let luminance = input.image.luminance();
        let similarity = windowed_ssim(&luminance, &box_blur_3x3(&luminance)).clamp(0.0, 1.0);
        let similarity_term = if self.config.invert_similarity {
            1.0 - similarity
        } else {
            similarity
        };

        let w = self.config.weights;
        let score = (w.similarity * similarity_term
            + w.alpha_mean * alpha_mean
            + w.alpha_uniformity * (1.0 - alpha_std)
            + w.edge_density * density)
            .clamp(0.0, 1.0);
        let passed = score >= self.config.min_score;

        tracing::debug!(
            image = input.image_id,
            score,
            alpha_mean,
            alpha_std,
            similarity,
            density,
            "edge quality evaluated"
        );

        GateResult::evaluated(self.kind(), passed, score, self.config.min_score)
            .with_detail("alpha_present", true)
            .with_detail("confidence", "high")
            .with_detail("alpha_mean", round4(alpha_mean))
            .with_detail("alpha_std", round4(alpha_std))
            .with_detail("edge_density", round4(density))
            .with_detail("similarity", round4(similarity))
            .with_detail("similarity_inverted", self.config.invert_similarity)
    }

    fn evaluate_without_alpha(&self, input: &GateInput<'_>) -> GateResult {
        let density = edge_density(&input.image.luminance(), CANNY_LOW, CANNY_HIGH);
        let score = density_band_score(density);
        let passed = score >= self.config.min_score;

        tracing::debug!(
            image = input.image_id,
            score,
            density,
            "edge quality evaluated without alpha"
        );

        GateResult::evaluated(self.kind(), passed, score, self.config.min_score)
            .with_detail("alpha_present", false)
            .with_detail("confidence", "low")
            .with_detail("edge_density", round4(density))
    }
}

impl QualityGate for EdgeQualityGate {
    fn kind(&self) -> GateKind {
        GateKind::EdgeQuality
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateResult {
        if input.image.has_alpha() {
            self.evaluate_with_alpha(input)
        } else {
            self.evaluate_without_alpha(input)
        }
    }
}
