//! Color accuracy: sampled garment color vs. the Facts target color.

use super::{round4, GateInput, GateKind, GateResult, QualityGate};
use crate::color::{delta_e, hex_to_rgb, rgb_to_hex, DeltaEFormula, Rgb};
use crate::config::ColorAccuracyConfig;
use std::collections::HashMap;

/// Alpha below this value is treated as background
const ALPHA_CUTOFF: u8 = 128;

/// Compares the mean color of the garment region with `garment.color_hex`
#[derive(Debug, Clone, Default)]
pub struct ColorAccuracyGate {
    config: ColorAccuracyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sampling {
    Mask,
    CenterCrop,
}

impl Sampling {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::CenterCrop => "center_crop",
        }
    }
}

struct Sample {
    pixels: Vec<[u8; 3]>,
    sampling: Sampling,
    mask_ignored: bool,
}

impl ColorAccuracyGate {
    /// Create the gate
    #[must_use]
    pub const fn new(config: ColorAccuracyConfig) -> Self {
        Self { config }
    }

    /// ΔE ceiling for the garment
    #[must_use]
    pub fn threshold_for(&self, textured: bool) -> f64 {
        if textured {
            self.config.delta_e_textured_max
        } else {
            self.config.delta_e_uniform_max
        }
    }

    fn collect_sample(&self, input: &GateInput<'_>) -> Sample {
        let rgba = input.image.rgba();
        let (w, h) = rgba.dimensions();

        let mut mask_ignored = false;
        let (candidates, sampling): (Vec<[u8; 4]>, Sampling) = match input.mask {
            Some(mask) if mask.dimensions() == (w, h) => (
                rgba.pixels()
                    .zip(mask.pixels())
                    .filter(|(_, m)| m[0] > 0)
                    .map(|(p, _)| p.0)
                    .collect(),
                Sampling::Mask,
            ),
            other => {
                if let Some(mask) = other {
                    tracing::warn!(
                        image = input.image_id,
                        mask = ?mask.dimensions(),
                        render = ?(w, h),
                        "mask dimensions differ from render, using center crop"
                    );
                    mask_ignored = true;
                }
                let divisor = self.config.center_crop_divisor.max(1);
                let side = (w.min(h) / divisor).max(1).min(w.min(h));
                let x0 = (w - side) / 2;
                let y0 = (h - side) / 2;
                let mut pixels = Vec::with_capacity((side as usize).pow(2));
                for y in y0..y0 + side {
                    for x in x0..x0 + side {
                        pixels.push(rgba.get_pixel(x, y).0);
                    }
                }
                (pixels, Sampling::CenterCrop)
            }
        };

        let opaque: Vec<[u8; 3]> = candidates
            .iter()
            .filter(|p| p[3] >= ALPHA_CUTOFF)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let pixels = if input.image.has_alpha() && !opaque.is_empty() {
            opaque
        } else {
            candidates.iter().map(|p| [p[0], p[1], p[2]]).collect()
        };

        Sample {
            pixels,
            sampling,
            mask_ignored,
        }
    }
}

/// Exact mean of 8-bit pixels
fn mean_color(pixels: &[[u8; 3]]) -> Rgb {
    let mut sums = [0_u64; 3];
    for p in pixels {
        for (sum, &c) in sums.iter_mut().zip(p) {
            *sum += u64::from(c);
        }
    }
    let denom = pixels.len() as f64 * 255.0;
    Rgb::new(
        sums[0] as f64 / denom,
        sums[1] as f64 / denom,
        sums[2] as f64 / denom,
    )
}

/// Mean and max per-pixel ΔE against the target
fn pixel_delta_e_stats(pixels: &[[u8; 3]], target: Rgb, formula: DeltaEFormula) -> (f64, f64) {
    let mut cache: HashMap<[u8; 3], f64> = HashMap::new();
    let mut sum = 0.0;
    let mut max = 0.0_f64;
    for p in pixels {
        let de = *cache
            .entry(*p)
            .or_insert_with(|| delta_e(Rgb::from_u8(p[0], p[1], p[2]), target, formula).value);
        sum += de;
        max = max.max(de);
    }
    (sum / pixels.len() as f64, max)
}

impl QualityGate for ColorAccuracyGate {
    fn kind(&self) -> GateKind {
        GateKind::ColorAccuracy
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateResult {
        let facts = input.facts;
        let target_hex = facts.color_hex();
        let textured = facts.is_textured();
        let threshold = self.threshold_for(textured);
        let fabric_type = if textured { "textured" } else { "uniform" };

        let target = match hex_to_rgb(target_hex) {
            Ok(rgb) => rgb,
            Err(e) => {
                tracing::warn!(image = input.image_id, %e, "invalid target color");
                return GateResult::error(self.kind(), f64::INFINITY, threshold, e.to_string())
                    .with_detail("target_hex", target_hex)
                    .with_detail("fabric_type", fabric_type);
            }
        };

        if facts.color_hex_defaulted() {
            tracing::warn!(
                image = input.image_id,
                "garment.color_hex missing, comparing against {target_hex}"
            );
        }

        let sample = self.collect_sample(input);
        if sample.pixels.is_empty() {
            return GateResult::error(self.kind(), f64::INFINITY, threshold, "empty color sample")
                .with_detail("target_hex", target_hex)
                .with_detail("sampling", sample.sampling.as_str());
        }

        let formula = self.config.formula;
        let mean = mean_color(&sample.pixels);
        let de = delta_e(mean, target, formula);
        let (mean_pixel_de, max_pixel_de) = pixel_delta_e_stats(&sample.pixels, target, formula);
        let passed = de.value <= threshold;

        tracing::debug!(
            image = input.image_id,
            delta_e = de.value,
            threshold,
            passed,
            "color accuracy evaluated"
        );

        let mut result = GateResult::evaluated(self.kind(), passed, de.value, threshold)
            .with_detail("target_hex", rgb_to_hex(target))
            .with_detail("sampled_hex", rgb_to_hex(mean))
            .with_detail("fabric_type", fabric_type)
            .with_detail("delta_e_method", de.method.as_str())
            .with_detail("sampling", sample.sampling.as_str())
            .with_detail("sampled_pixels", sample.pixels.len())
            .with_detail("mean_pixel_delta_e", round4(mean_pixel_de))
            .with_detail("max_pixel_delta_e", round4(max_pixel_de))
            .with_detail("color_hex_defaulted", facts.color_hex_defaulted());
        if sample.mask_ignored {
            result = result.with_detail("mask_ignored", "dimension_mismatch");
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::facts::GarmentFacts;
    use crate::gates::GateStatus;
    use crate::raster::RenderedImage;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use proptest::prelude::*;

    fn facts(color: Option<&str>, fabric: &str) -> GarmentFacts {
        let mut facts = GarmentFacts::default();
        facts.garment.color_hex = color.map(str::to_string);
        facts.garment.fabric = fabric.to_string();
        facts
    }

    /// White 512×512 render with a centered 200×200 block
    fn block_image(block: [u8; 3]) -> RenderedImage {
        let mut img = RgbaImage::from_pixel(512, 512, Rgba([255, 255, 255, 255]));
        for y in 156..356 {
            for x in 156..356 {
                img.put_pixel(x, y, Rgba([block[0], block[1], block[2], 255]));
            }
        }
        RenderedImage::from_rgba(img)
    }

    fn evaluate(image: &RenderedImage, facts: &GarmentFacts) -> GateResult {
        ColorAccuracyGate::default().evaluate(&GateInput::new("item", image, facts))
    }

    #[test]
    fn test_exact_color_scores_zero() {
        let image = block_image([0x1a, 0x2b, 0x3c]);
        let result = evaluate(&image, &facts(Some("#1A2B3C"), "cotton"));
        assert_eq!(result.status, GateStatus::Evaluated);
        assert_eq!(result.score, 0.0);
        assert!(result.passed);
        assert_eq!(result.threshold, 3.0);
        assert_eq!(result.detail("sampling").unwrap(), "center_crop");
        assert_eq!(result.detail("sampled_hex").unwrap(), "#1a2b3c");
        assert_eq!(result.detail("delta_e_method").unwrap(), "cie76");
        assert_eq!(result.detail("sampled_pixels").unwrap(), 128 * 128);
    }

    #[test]
    fn test_wrong_color_fails() {
        let image = block_image([255, 0, 0]);
        let result = evaluate(&image, &facts(Some("#0000FF"), "cotton"));
        assert!(result.score > 50.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_textured_threshold() {
        let image = block_image([0, 0, 0]);
        let result = evaluate(&image, &facts(Some("#000000"), "denim"));
        assert_eq!(result.threshold, 5.0);
        assert_eq!(result.detail("fabric_type").unwrap(), "textured");
    }

    #[test]
    fn test_invalid_hex_is_error() {
        let image = block_image([0, 0, 0]);
        let result = evaluate(&image, &facts(Some("#XYZ"), ""));
        assert_eq!(result.status, GateStatus::Error);
        assert!(!result.passed);
        assert!(result.score.is_infinite());
        assert!(result.detail("error").is_some());
    }

    #[test]
    fn test_missing_color_defaults_to_black() {
        let image = block_image([0, 0, 0]);
        let result = evaluate(&image, &facts(None, ""));
        assert_eq!(result.status, GateStatus::Evaluated);
        assert_eq!(result.detail("color_hex_defaulted").unwrap(), true);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_mask_sampling() {
        // Block is red; mask selects only a white corner
        let image = block_image([255, 0, 0]);
        let mut mask = GrayImage::new(512, 512);
        for y in 0..10 {
            for x in 0..10 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let facts = facts(Some("#ffffff"), "");
        let input = GateInput::new("item", &image, &facts).with_mask(Some(&mask));
        let result = ColorAccuracyGate::default().evaluate(&input);
        assert_eq!(result.detail("sampling").unwrap(), "mask");
        assert_eq!(result.detail("sampled_pixels").unwrap(), 100);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_mismatched_mask_falls_back() {
        let image = block_image([0, 0, 0]);
        let mask = GrayImage::from_pixel(10, 10, Luma([255]));
        let facts = facts(Some("#000000"), "");
        let input = GateInput::new("item", &image, &facts).with_mask(Some(&mask));
        let result = ColorAccuracyGate::default().evaluate(&input);
        assert_eq!(result.detail("sampling").unwrap(), "center_crop");
        assert_eq!(result.detail("mask_ignored").unwrap(), "dimension_mismatch");
    }

    #[test]
    fn test_transparent_pixels_excluded() {
        let mut img = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 255, 255]));
        // Half of the crop is transparent red
        for y in 0..40 {
            for x in 0..20 {
                img.put_pixel(x, y, Rgba([255, 0, 0, 0]));
            }
        }
        let image = RenderedImage::from_rgba(img);
        let result = evaluate(&image, &facts(Some("#0000ff"), ""));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_fully_transparent_sample_keeps_pixels() {
        let image = RenderedImage::from_rgba(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let result = evaluate(&image, &facts(Some("#000000"), ""));
        assert_eq!(result.status, GateStatus::Evaluated);
        assert_eq!(result.detail("sampled_pixels").unwrap(), 4);
    }

    #[test]
    fn test_ciede2000_formula() {
        let gate = ColorAccuracyGate::new(ColorAccuracyConfig {
            formula: DeltaEFormula::Ciede2000,
            ..ColorAccuracyConfig::default()
        });
        let image = block_image([10, 10, 10]);
        let facts = facts(Some("#0a0a0a"), "");
        let result = gate.evaluate(&GateInput::new("item", &image, &facts));
        assert_eq!(result.detail("delta_e_method").unwrap(), "ciede2000");
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_mean_color_exact() {
        let mean = mean_color(&[[10, 20, 30], [10, 20, 30]]);
        assert_eq!(mean, Rgb::from_u8(10, 20, 30));
    }

    #[test]
    fn test_pixel_stats() {
        let target = Rgb::from_u8(0, 0, 0);
        let (mean, max) = pixel_delta_e_stats(&[[0, 0, 0], [255, 255, 255]], target, DeltaEFormula::Cie76);
        assert!(max > 99.0);
        assert!((mean - max / 2.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_raising_ceiling_keeps_passing_renders(
            r in any::<u8>(),
            g in any::<u8>(),
            b in any::<u8>(),
            low_ceiling in 0.0f64..60.0,
            raise in 0.0f64..60.0,
            textured in any::<bool>(),
        ) {
            let high_ceiling = low_ceiling + raise;
            let image = RenderedImage::from_rgba(RgbaImage::from_pixel(16, 16, Rgba([r, g, b, 255])));
            let facts = facts(Some("#336699"), if textured { "denim" } else { "cotton" });
            let gate_with = |ceiling: f64| {
                let config = if textured {
                    ColorAccuracyConfig { delta_e_textured_max: ceiling, ..ColorAccuracyConfig::default() }
                } else {
                    ColorAccuracyConfig { delta_e_uniform_max: ceiling, ..ColorAccuracyConfig::default() }
                };
                ColorAccuracyGate::new(config)
            };

            let strict = gate_with(low_ceiling).evaluate(&GateInput::new("item", &image, &facts));
            let lenient = gate_with(high_ceiling).evaluate(&GateInput::new("item", &image, &facts));

            prop_assert_eq!(strict.threshold, low_ceiling);
            prop_assert_eq!(lenient.threshold, high_ceiling);
            prop_assert_eq!(strict.score, lenient.score);
            prop_assert!(!strict.passed || lenient.passed);
        }
    }
}
