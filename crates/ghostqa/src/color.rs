//! Color-space math: hex parsing, sRGB → CIE LAB, and ΔE color difference.
//!
//! - CIE76: Euclidean distance in LAB (baseline, used by the default thresholds)
//! - CIEDE2000: CIE ΔE₀₀ (ISO/CIE 11664-6:2014), stricter alternative
//! - RGB Euclidean ×100: fallback used only when LAB conversion is unavailable

use crate::result::{QaError, QaResult};
use serde::{Deserialize, Serialize};

/// sRGB color with channels normalized to 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red (0.0-1.0)
    pub r: f64,
    /// Green (0.0-1.0)
    pub g: f64,
    /// Blue (0.0-1.0)
    pub b: f64,
}

impl Rgb {
    /// Pure white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    /// Pure black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a new color from normalized channels
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create a color from 8-bit channels
    #[must_use]
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        )
    }

    /// Parse a `#RRGGBB` / `RRGGBB` hex string
    pub fn from_hex(hex: &str) -> QaResult<Self> {
        hex_to_rgb(hex)
    }

    /// Format as lowercase `#rrggbb`
    #[must_use]
    pub fn to_hex(&self) -> String {
        rgb_to_hex(*self)
    }

    /// Convert to CIE LAB, `None` when a channel is not finite
    #[must_use]
    pub fn to_lab(&self) -> Option<Lab> {
        rgb_to_lab(*self)
    }

    /// Whether every channel is a finite number
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }
}

/// CIE LAB color (D65 reference white)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lab {
    /// Lightness (0-100)
    pub l: f64,
    /// Green-Red axis
    pub a: f64,
    /// Blue-Yellow axis
    pub b: f64,
}

impl Lab {
    /// Create a new Lab color
    #[must_use]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }
}

/// ΔE formula used for color comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaEFormula {
    /// CIE 1976 (Euclidean in LAB)
    #[default]
    Cie76,
    /// CIE ΔE₀₀
    Ciede2000,
}

/// Method that actually produced a ΔE value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaEMethod {
    /// CIE 1976
    Cie76,
    /// CIE ΔE₀₀
    Ciede2000,
    /// Euclidean RGB distance ×100 (LAB unavailable)
    RgbEuclideanFallback,
}

impl DeltaEMethod {
    /// Stable string form used in gate details
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cie76 => "cie76",
            Self::Ciede2000 => "ciede2000",
            Self::RgbEuclideanFallback => "rgb_euclidean_fallback",
        }
    }

    /// Whether this value came from the fallback path
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::RgbEuclideanFallback)
    }
}

/// A ΔE value tagged with the method that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaE {
    /// Color difference (≥ 0)
    pub value: f64,
    /// How the value was computed
    pub method: DeltaEMethod,
}

/// Parse a hex color (`#RRGGBB` or `RRGGBB`) into normalized RGB
pub fn hex_to_rgb(hex: &str) -> QaResult<Rgb> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(QaError::invalid_format(format!(
            "expected 6 hex digits, got '{hex}'"
        )));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|e| QaError::invalid_format(format!("invalid hex color '{hex}': {e}")))
    };

    Ok(Rgb::from_u8(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Format normalized RGB as lowercase `#rrggbb`
#[must_use]
pub fn rgb_to_hex(rgb: Rgb) -> String {
    let to_u8 = |c: f64| {
        if c.is_finite() {
            (c.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            0
        }
    };
    format!("#{:02x}{:02x}{:02x}", to_u8(rgb.r), to_u8(rgb.g), to_u8(rgb.b))
}

/// Convert sRGB to CIE LAB (D65)
///
/// Returns `None` when any channel is not finite.
#[must_use]
pub fn rgb_to_lab(rgb: Rgb) -> Option<Lab> {
    if !rgb.is_finite() {
        return None;
    }

    let r = srgb_to_linear(rgb.r);
    let g = srgb_to_linear(rgb.g);
    let b = srgb_to_linear(rgb.b);

    // sRGB to XYZ (D65 illuminant)
    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    // D65 reference white
    let fx = f_xyz(x / 0.95047);
    let fy = f_xyz(y / 1.00000);
    let fz = f_xyz(z / 1.08883);

    let lab = Lab::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz));
    (lab.l.is_finite() && lab.a.is_finite() && lab.b.is_finite()).then_some(lab)
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn f_xyz(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE76 color difference
#[must_use]
pub fn delta_e_76(lab1: &Lab, lab2: &Lab) -> f64 {
    let dl = lab1.l - lab2.l;
    let da = lab1.a - lab2.a;
    let db = lab1.b - lab2.b;
    (dl * dl + da * da + db * db).sqrt()
}

/// CIEDE2000 color difference with unit weights (kL = kC = kH = 1)
#[must_use]
pub fn delta_e_2000(lab1: &Lab, lab2: &Lab) -> f64 {
    const POW25_7: f64 = 6_103_515_625.0; // 25^7

    let c1 = lab1.a.hypot(lab1.b);
    let c2 = lab2.a.hypot(lab2.b);
    let c_avg_7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (c_avg_7 / (c_avg_7 + POW25_7)).sqrt());

    let a1_prime = lab1.a * (1.0 + g);
    let a2_prime = lab2.a * (1.0 + g);
    let c1_prime = a1_prime.hypot(lab1.b);
    let c2_prime = a2_prime.hypot(lab2.b);

    let hue = |a: f64, b: f64| {
        if a == 0.0 && b == 0.0 {
            0.0
        } else {
            b.atan2(a).to_degrees().rem_euclid(360.0)
        }
    };
    let h1_prime = hue(a1_prime, lab1.b);
    let h2_prime = hue(a2_prime, lab2.b);

    let delta_l_prime = lab2.l - lab1.l;
    let delta_c_prime = c2_prime - c1_prime;
    let chroma_product = c1_prime * c2_prime;

    let delta_h_deg = if chroma_product == 0.0 {
        0.0
    } else {
        let dh = h2_prime - h1_prime;
        if dh.abs() <= 180.0 {
            dh
        } else if dh > 180.0 {
            dh - 360.0
        } else {
            dh + 360.0
        }
    };
    let delta_h_prime = 2.0 * chroma_product.sqrt() * (delta_h_deg.to_radians() / 2.0).sin();

    let l_prime_avg = (lab1.l + lab2.l) / 2.0;
    let c_prime_avg = (c1_prime + c2_prime) / 2.0;
    let h_prime_avg = if chroma_product == 0.0 {
        h1_prime + h2_prime
    } else if (h1_prime - h2_prime).abs() <= 180.0 {
        (h1_prime + h2_prime) / 2.0
    } else if h1_prime + h2_prime < 360.0 {
        (h1_prime + h2_prime + 360.0) / 2.0
    } else {
        (h1_prime + h2_prime - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (h_prime_avg - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_prime_avg).to_radians().cos()
        + 0.32 * (3.0 * h_prime_avg + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_prime_avg - 63.0).to_radians().cos();
    let delta_theta = 30.0 * (-((h_prime_avg - 275.0) / 25.0).powi(2)).exp();
    let c_prime_avg_7 = c_prime_avg.powi(7);
    let rc = 2.0 * (c_prime_avg_7 / (c_prime_avg_7 + POW25_7)).sqrt();

    let l_50_sq = (l_prime_avg - 50.0).powi(2);
    let sl = 1.0 + (0.015 * l_50_sq) / (20.0 + l_50_sq).sqrt();
    let sc = 1.0 + 0.045 * c_prime_avg;
    let sh = 1.0 + 0.015 * c_prime_avg * t;
    let rt = -(2.0 * delta_theta).to_radians().sin() * rc;

    let dl = delta_l_prime / sl;
    let dc = delta_c_prime / sc;
    let dh = delta_h_prime / sh;

    (dl * dl + dc * dc + dh * dh + rt * dc * dh).max(0.0).sqrt()
}

/// Euclidean RGB distance ×100 (fallback scale roughly comparable to ΔE)
#[must_use]
pub fn rgb_distance_scaled(rgb1: Rgb, rgb2: Rgb) -> f64 {
    let dr = rgb1.r - rgb2.r;
    let dg = rgb1.g - rgb2.g;
    let db = rgb1.b - rgb2.b;
    (dr * dr + dg * dg + db * db).sqrt() * 100.0
}

/// Compare two colors in LAB with the given formula
#[must_use]
pub fn delta_e_lab(lab1: &Lab, lab2: &Lab, formula: DeltaEFormula) -> f64 {
    match formula {
        DeltaEFormula::Cie76 => delta_e_76(lab1, lab2),
        DeltaEFormula::Ciede2000 => delta_e_2000(lab1, lab2),
    }
}

/// Compare two RGB colors, falling back to scaled RGB distance when LAB is unavailable
#[must_use]
pub fn delta_e(rgb1: Rgb, rgb2: Rgb, formula: DeltaEFormula) -> DeltaE {
    match (rgb_to_lab(rgb1), rgb_to_lab(rgb2)) {
        (Some(lab1), Some(lab2)) => DeltaE {
            value: delta_e_lab(&lab1, &lab2, formula),
            method: match formula {
                DeltaEFormula::Cie76 => DeltaEMethod::Cie76,
                DeltaEFormula::Ciede2000 => DeltaEMethod::Ciede2000,
            },
        },
        _ => DeltaE {
            value: rgb_distance_scaled(rgb1, rgb2),
            method: DeltaEMethod::RgbEuclideanFallback,
        },
    }
}
