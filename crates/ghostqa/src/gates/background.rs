//! Background purity: the border of a ghost-mannequin render must be clean white.

use super::{round4, GateInput, GateKind, GateResult, QualityGate};
use crate::color::{rgb_to_hex, Rgb};
use crate::config::BackgroundConfig;

/// Samples corner patches and edge strips of the white-composited render
#[derive(Debug, Clone, Default)]
pub struct BackgroundPurityGate {
    config: BackgroundConfig,
}

/// Whether `(x, y)` lies in a corner patch or an outer strip
fn in_border(x: u32, y: u32, w: u32, h: u32) -> bool {
    let short = w.min(h);
    let patch = (short / 10).max(1);
    let strip = (short / 20).max(1);

    let in_corner = (x < patch || x >= w.saturating_sub(patch))
        && (y < patch || y >= h.saturating_sub(patch));
    let in_strip = x < strip || x >= w.saturating_sub(strip) || y < strip || y >= h.saturating_sub(strip);
    in_corner || in_strip
}

impl BackgroundPurityGate {
    /// Create the gate
    #[must_use]
    pub const fn new(config: BackgroundConfig) -> Self {
        Self { config }
    }
}

impl QualityGate for BackgroundPurityGate {
    fn kind(&self) -> GateKind {
        GateKind::Background
    }

    fn evaluate(&self, input: &GateInput<'_>) -> GateResult {
        let threshold = self.config.purity_min;
        let composited = input.image.composited_over_white();
        let (w, h) = composited.dimensions();

        let samples: Vec<[f64; 3]> = composited
            .enumerate_pixels()
            .filter(|(x, y, _)| in_border(*x, *y, w, h))
            .map(|(_, _, p)| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])])
            .collect();

        if samples.is_empty() {
            return GateResult::error(self.kind(), 0.0, threshold, "empty background sample");
        }

        let n = samples.len() as f64;
        let mut mean = [0.0; 3];
        for s in &samples {
            for (m, c) in mean.iter_mut().zip(s) {
                *m += c;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let distance_to_white = mean
            .iter()
            .map(|c| (255.0 - c).powi(2))
            .sum::<f64>()
            .sqrt();
        let whiteness = (1.0 - distance_to_white / (255.0 * 3.0_f64.sqrt())).clamp(0.0, 1.0);

        let mean_sq_distance = samples
            .iter()
            .map(|s| s.iter().zip(&mean).map(|(c, m)| (c - m).powi(2)).sum::<f64>())
            .sum::<f64>()
            / n;
        let variance = (mean_sq_distance / (255.0 * 255.0 * 3.0)).clamp(0.0, 1.0);

        let ww = self.config.whiteness_weight;
        let score = (ww * whiteness + (1.0 - ww) * (1.0 - variance)).clamp(0.0, 1.0);
        let passed = score >= threshold;

        tracing::debug!(
            image = input.image_id,
            score,
            whiteness,
            variance,
            "background purity evaluated"
        );

        let mean_rgb = Rgb::new(mean[0] / 255.0, mean[1] / 255.0, mean[2] / 255.0);
        GateResult::evaluated(self.kind(), passed, score, threshold)
            .with_detail("mean_hex", rgb_to_hex(mean_rgb))
            .with_detail("whiteness", round4(whiteness))
            .with_detail("variance", round4(variance))
            .with_detail("sampled_pixels", samples.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::facts::GarmentFacts;
    use crate::gates::GateStatus;
    use crate::raster::RenderedImage;
    use image::{Rgb as Pixel, RgbImage, Rgba, RgbaImage};

    fn run(image: &RenderedImage) -> GateResult {
        let facts = GarmentFacts::default();
        BackgroundPurityGate::default().evaluate(&GateInput::new("item", image, &facts))
    }

    #[test]
    fn test_white_background_is_pure() {
        let mut img = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));
        for y in 60..140 {
            for x in 60..140 {
                img.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        let result = run(&RenderedImage::from_rgba(img));
        assert!((result.score - 1.0).abs() < 1e-12);
        assert!(result.passed);
        assert_eq!(result.detail("mean_hex").unwrap(), "#ffffff");
    }

    #[test]
    fn test_transparent_background_counts_as_white() {
        let result = run(&RenderedImage::from_rgba(RgbaImage::new(50, 50)));
        assert!((result.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gray_background_fails() {
        let img = RgbImage::from_pixel(100, 100, Pixel([128, 128, 128]));
        let result = run(&RenderedImage::from_rgb(img));
        assert!(!result.passed);
        assert!(result.score < 0.8);
    }

    #[test]
    fn test_noisy_background_penalized() {
        let img = RgbImage::from_fn(100, 100, |x, y| {
            if (x + y) % 2 == 0 {
                Pixel([255, 255, 255])
            } else {
                Pixel([0, 0, 0])
            }
        });
        let result = run(&RenderedImage::from_rgb(img));
        let variance = result.detail("variance").unwrap().as_f64().unwrap();
        assert!(variance > 0.2);
        assert!(!result.passed);
    }

    #[test]
    fn test_sample_covers_border_only() {
        // 100×100: patches 10, strips 5
        assert!(in_border(0, 0, 100, 100));
        assert!(in_border(9, 9, 100, 100));
        assert!(in_border(50, 2, 100, 100));
        assert!(in_border(97, 50, 100, 100));
        assert!(!in_border(50, 50, 100, 100));
        assert!(!in_border(7, 50, 100, 100));
    }

    #[test]
    fn test_single_pixel_image() {
        let result = run(&RenderedImage::from_rgb(RgbImage::from_pixel(1, 1, Pixel([255, 255, 255]))));
        assert_eq!(result.status, GateStatus::Evaluated);
        assert_eq!(result.detail("sampled_pixels").unwrap(), 1);
    }

    #[test]
    fn test_empty_image_is_error() {
        let result = run(&RenderedImage::from_rgb(RgbImage::new(0, 0)));
        assert_eq!(result.status, GateStatus::Error);
    }
}
