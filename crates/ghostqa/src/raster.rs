//! Raster utilities shared by the gates.
//!
//! Decoding, alpha handling, luminance, Canny edge density, box blur,
//! windowed SSIM and contour shape extraction.

use crate::result::{QaError, QaResult};
use image::{DynamicImage, GrayImage, ImageError, Luma, Rgb, RgbImage, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use std::path::{Path, PathBuf};

/// SSIM window side
pub const SSIM_WINDOW: u32 = 8;
/// SSIM window stride
pub const SSIM_STRIDE: u32 = 4;

const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const SSIM_L: f64 = 255.0;

/// A decoded render with its alpha status
#[derive(Debug, Clone)]
pub struct RenderedImage {
    path: Option<PathBuf>,
    rgba: RgbaImage,
    has_alpha: bool,
}

impl RenderedImage {
    /// Decode an image file
    ///
    /// A missing or unreadable file is [`QaError::MissingResource`]; bytes
    /// that do not decode are [`QaError::ImageDecode`].
    pub fn load(path: &Path) -> QaResult<Self> {
        if !path.is_file() {
            return Err(QaError::missing_resource(path, "image file not found"));
        }
        let decoded = image::open(path).map_err(|e| match e {
            ImageError::IoError(io) => QaError::missing_resource(path, io.to_string()),
            other => QaError::ImageDecode {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;
        let mut image = Self::from_dynamic(decoded);
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    /// Wrap an already decoded image
    #[must_use]
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let has_alpha = image.color().has_alpha();
        Self {
            path: None,
            rgba: image.to_rgba8(),
            has_alpha,
        }
    }

    /// Wrap an RGBA buffer (alpha present)
    #[must_use]
    pub fn from_rgba(rgba: RgbaImage) -> Self {
        Self {
            path: None,
            rgba,
            has_alpha: true,
        }
    }

    /// Wrap an RGB buffer (no alpha)
    #[must_use]
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageRgb8(rgb))
    }

    /// Source path, if loaded from disk
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    /// Whether the source carried an alpha channel
    #[must_use]
    pub const fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// RGBA pixels (alpha 255 when the source had none)
    #[must_use]
    pub const fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    /// Alpha plane as a grayscale image
    #[must_use]
    pub fn alpha_plane(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([self.rgba.get_pixel(x, y)[3]])
        })
    }

    /// RGB pixels composited over a white background
    #[must_use]
    pub fn composited_over_white(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b, a] = self.rgba.get_pixel(x, y).0;
            Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
        })
    }

    /// Luminance of the white-composited image
    #[must_use]
    pub fn luminance(&self) -> GrayImage {
        image::imageops::grayscale(&self.composited_over_white())
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Load a segmentation mask (any format, read as grayscale)
pub fn load_mask(path: &Path) -> QaResult<GrayImage> {
    if !path.is_file() {
        return Err(QaError::missing_resource(path, "mask file not found"));
    }
    let decoded = image::open(path).map_err(|e| QaError::ImageDecode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(decoded.to_luma8())
}

/// Fraction of pixels marked as edges by Canny
///
/// Images smaller than 3×3 have no interior and report 0.
#[must_use]
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let edges = imageproc::edges::canny(gray, low, high);
    let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();
    edge_pixels as f64 / (u64::from(w) * u64::from(h)) as f64
}

/// 3×3 box blur
#[must_use]
pub fn box_blur_3x3(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    imageproc::filter::box_filter(gray, 1, 1)
}

/// Mean SSIM over 8×8 windows at stride 4 (K1 0.01, K2 0.03, L 255)
///
/// Images narrower or shorter than a window use a single window clipped to
/// the image. Mismatched dimensions score 0, empty images 1.
#[must_use]
pub fn windowed_ssim(reference: &GrayImage, other: &GrayImage) -> f64 {
    if reference.dimensions() != other.dimensions() {
        return 0.0;
    }
    let (w, h) = reference.dimensions();
    if w == 0 || h == 0 {
        return 1.0;
    }

    let win_w = w.min(SSIM_WINDOW);
    let win_h = h.min(SSIM_WINDOW);

    let mut total = 0.0;
    let mut windows = 0_u64;
    for y0 in (0..=h - win_h).step_by(SSIM_STRIDE as usize) {
        for x0 in (0..=w - win_w).step_by(SSIM_STRIDE as usize) {
            total += window_ssim(reference, other, x0, y0, win_w, win_h);
            windows += 1;
        }
    }

    total / windows as f64
}

fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32, win_w: u32, win_h: u32) -> f64 {
    let c1 = (SSIM_K1 * SSIM_L).powi(2);
    let c2 = (SSIM_K2 * SSIM_L).powi(2);
    let n = f64::from(win_w * win_h);

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for y in y0..y0 + win_h {
        for x in x0..x0 + win_w {
            sum_a += f64::from(a.get_pixel(x, y)[0]);
            sum_b += f64::from(b.get_pixel(x, y)[0]);
        }
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut covar = 0.0;
    for y in y0..y0 + win_h {
        for x in x0..x0 + win_w {
            let da = f64::from(a.get_pixel(x, y)[0]) - mean_a;
            let db = f64::from(b.get_pixel(x, y)[0]) - mean_b;
            var_a += da * da;
            var_b += db * db;
            covar += da * db;
        }
    }
    var_a /= n;
    var_b /= n;
    covar /= n;

    let numerator = (2.0 * mean_a * mean_b + c1) * (2.0 * covar + c2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2);
    numerator / denominator
}

/// Geometry of one outer contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourShape {
    /// Polygon area (shoelace)
    pub area: f64,
    /// Bounding box width
    pub width: u32,
    /// Bounding box height
    pub height: u32,
}

impl ContourShape {
    /// Bounding box width / height
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

/// Outer (parentless) contours of a binary edge map
#[must_use]
pub fn outer_contours(edges: &GrayImage) -> Vec<ContourShape> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
        .filter_map(|contour| {
            let points = &contour.points;
            let first = points.first()?;
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
            let mut twice_area = 0_i64;
            for (i, p) in points.iter().enumerate() {
                let q = &points[(i + 1) % points.len()];
                twice_area += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
                min_x = min_x.min(p.x);
                max_x = max_x.max(p.x);
                min_y = min_y.min(p.y);
                max_y = max_y.max(p.y);
            }
            Some(ContourShape {
                area: twice_area.abs() as f64 / 2.0,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    mod image_tests {
        use super::*;

        #[test]
        fn test_rgb_has_no_alpha() {
            let image = RenderedImage::from_rgb(RgbImage::new(4, 4));
            assert!(!image.has_alpha());
            assert_eq!(image.alpha_plane().get_pixel(0, 0)[0], 255);
        }

        #[test]
        fn test_transparent_composites_to_white() {
            let image = RenderedImage::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
            assert!(image.has_alpha());
            assert_eq!(image.composited_over_white().get_pixel(1, 1).0, [255, 255, 255]);
            assert_eq!(image.luminance().get_pixel(0, 0)[0], 255);
        }

        #[test]
        fn test_opaque_composite_is_identity() {
            let image =
                RenderedImage::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
            assert_eq!(image.composited_over_white().get_pixel(0, 0).0, [10, 20, 30]);
        }

        #[test]
        fn test_load_missing_file() {
            let err = RenderedImage::load(Path::new("/nonexistent/render.png")).unwrap_err();
            assert!(matches!(err, QaError::MissingResource { .. }));
        }

        #[test]
        fn test_load_corrupt_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("broken.png");
            std::fs::write(&path, b"definitely not a png").unwrap();
            let err = RenderedImage::load(&path).unwrap_err();
            assert!(matches!(err, QaError::ImageDecode { .. }));
        }

        #[test]
        fn test_load_png_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("render.png");
            RgbaImage::from_pixel(5, 3, Rgba([1, 2, 3, 200]))
                .save(&path)
                .unwrap();
            let image = RenderedImage::load(&path).unwrap();
            assert_eq!((image.width(), image.height()), (5, 3));
            assert!(image.has_alpha());
            assert_eq!(image.path(), Some(path.as_path()));
        }
    }

    mod edge_tests {
        use super::*;

        #[test]
        fn test_flat_image_has_no_edges() {
            let flat = GrayImage::from_pixel(32, 32, Luma([128]));
            assert_eq!(edge_density(&flat, 50.0, 150.0), 0.0);
        }

        #[test]
        fn test_tiny_image_skips_canny() {
            let tiny = GrayImage::from_pixel(2, 2, Luma([255]));
            assert_eq!(edge_density(&tiny, 50.0, 150.0), 0.0);
        }

        #[test]
        fn test_checkerboard_has_edges() {
            let density = edge_density(&checkerboard(64, 8), 50.0, 150.0);
            assert!(density > 0.05, "{density}");
            assert!(density <= 1.0);
        }
    }

    mod ssim_tests {
        use super::*;

        #[test]
        fn test_identical_images() {
            let img = checkerboard(32, 4);
            assert!((windowed_ssim(&img, &img) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn test_flat_image_is_blur_stable() {
            let flat = GrayImage::from_pixel(16, 16, Luma([200]));
            let blurred = box_blur_3x3(&flat);
            assert!((windowed_ssim(&flat, &blurred) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn test_blur_lowers_ssim_for_fine_texture() {
            let img = checkerboard(32, 1);
            let blurred = box_blur_3x3(&img);
            assert!(windowed_ssim(&img, &blurred) < 0.5);
        }

        #[test]
        fn test_small_image_single_window() {
            let img = GrayImage::from_pixel(3, 5, Luma([10]));
            assert!((windowed_ssim(&img, &img) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn test_dimension_mismatch() {
            let a = GrayImage::new(8, 8);
            let b = GrayImage::new(9, 8);
            assert_eq!(windowed_ssim(&a, &b), 0.0);
        }
    }

    mod contour_tests {
        use super::*;

        #[test]
        fn test_filled_rectangle_contour() {
            let mut img = GrayImage::new(40, 40);
            for y in 10..30 {
                for x in 5..25 {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
            let shapes = outer_contours(&img);
            assert_eq!(shapes.len(), 1);
            let shape = shapes[0];
            assert_eq!((shape.width, shape.height), (20, 20));
            assert!((shape.area - 361.0).abs() < 1e-9, "{}", shape.area);
            assert!((shape.aspect_ratio() - 1.0).abs() < 1e-12);
        }

        #[test]
        fn test_empty_image_has_no_contours() {
            assert!(outer_contours(&GrayImage::new(10, 10)).is_empty());
        }
    }
}
