//! Threshold configuration for the QA engine.
//!
//! Loaded from JSON or YAML (chosen by file extension). Every key is
//! optional; unspecified keys take the defaults below.

use crate::color::DeltaEFormula;
use crate::result::{QaError, QaResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tolerance for weight sums
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Gate names accepted in `aggregator.blocking_gates`
pub const KNOWN_GATES: [&str; 5] = [
    "color_accuracy",
    "edge_quality",
    "background",
    "constraints",
    "perceptual",
];

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Color accuracy gate
    pub color_accuracy: ColorAccuracyConfig,
    /// Edge quality gate
    pub edge_quality: EdgeQualityConfig,
    /// Background purity gate
    pub background: BackgroundConfig,
    /// Constraint gate
    pub constraints: ConstraintConfig,
    /// Perceptual gate
    pub perceptual: PerceptualConfig,
    /// Score aggregation
    pub aggregator: AggregatorConfig,
    /// Batch execution
    pub batch: BatchConfig,
}

/// Color accuracy thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorAccuracyConfig {
    /// ΔE ceiling for uniform fabrics
    #[serde(alias = "delta_e_uni_max")]
    pub delta_e_uniform_max: f64,
    /// ΔE ceiling for textured fabrics
    pub delta_e_textured_max: f64,
    /// ΔE formula
    pub formula: DeltaEFormula,
    /// Center crop side is `min(w, h) / center_crop_divisor`
    pub center_crop_divisor: u32,
}

impl Default for ColorAccuracyConfig {
    fn default() -> Self {
        Self {
            delta_e_uniform_max: 3.0,
            delta_e_textured_max: 5.0,
            formula: DeltaEFormula::Cie76,
            center_crop_divisor: 4,
        }
    }
}

/// Edge quality composite weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeWeights {
    /// Blur-stability SSIM
    pub similarity: f64,
    /// Mean alpha
    pub alpha_mean: f64,
    /// `1 - alpha_std`
    pub alpha_uniformity: f64,
    /// Alpha-plane edge density
    pub edge_density: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            similarity: 0.4,
            alpha_mean: 0.3,
            alpha_uniformity: 0.2,
            edge_density: 0.1,
        }
    }
}

impl EdgeWeights {
    /// Sum of all weights
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.similarity + self.alpha_mean + self.alpha_uniformity + self.edge_density
    }
}

/// Edge quality thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeQualityConfig {
    /// Minimum composite score
    pub min_score: f64,
    /// Composite weights
    pub weights: EdgeWeights,
    /// Use `1 - ssim` instead of `ssim`
    pub invert_similarity: bool,
}

impl Default for EdgeQualityConfig {
    fn default() -> Self {
        Self {
            min_score: 0.75,
            weights: EdgeWeights::default(),
            invert_similarity: false,
        }
    }
}

/// Background purity thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Minimum purity score
    pub purity_min: f64,
    /// Weight of whiteness; variance takes the remainder
    pub whiteness_weight: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            purity_min: 0.95,
            whiteness_weight: 0.7,
        }
    }
}

/// Structural constraint heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Allowed |expected - detected| pockets
    pub pocket_tolerance: u32,
    /// Minimum contour area counted as a pocket (exclusive)
    pub pocket_min_area: f64,
    /// Maximum contour area counted as a pocket (exclusive)
    pub pocket_max_area: f64,
    /// Cap on detected pockets
    pub max_pockets: u32,
    /// Luminance edge density above which halo/fringing is reported
    pub halo_edge_density_max: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            pocket_tolerance: 1,
            pocket_min_area: 100.0,
            pocket_max_area: 5000.0,
            max_pockets: 4,
            halo_edge_density_max: 0.10,
        }
    }
}

/// Perceptual gate threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptualConfig {
    /// Minimum oracle score
    pub min_score: f64,
}

impl Default for PerceptualConfig {
    fn default() -> Self {
        Self { min_score: 0.75 }
    }
}

/// Aggregator weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorWeights {
    /// Edge quality
    pub edge: f64,
    /// Background purity
    pub background: f64,
    /// Color fidelity
    pub color: f64,
    /// Semantic (perceptual)
    pub semantic: f64,
}

impl Default for AggregatorWeights {
    fn default() -> Self {
        Self {
            edge: 0.4,
            background: 0.3,
            color: 0.2,
            semantic: 0.1,
        }
    }
}

impl AggregatorWeights {
    /// Sum of all weights
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.edge + self.background + self.color + self.semantic
    }
}

/// How the aggregator treats a missing semantic score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableSemantic {
    /// Substitute `neutral_semantic_score`
    #[default]
    Neutral,
    /// Renormalize the remaining three weights
    Redistribute,
}

/// Aggregation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Component weights
    pub weights: AggregatorWeights,
    /// Minimum `qa_total` to accept
    pub pass_threshold: f64,
    /// Semantic score used when the oracle is unavailable
    pub neutral_semantic_score: f64,
    /// Missing-semantic policy
    pub unavailable_semantic: UnavailableSemantic,
    /// Gates whose failure vetoes acceptance
    pub blocking_gates: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            weights: AggregatorWeights::default(),
            pass_threshold: 0.85,
            neutral_semantic_score: 0.9,
            unavailable_semantic: UnavailableSemantic::Neutral,
            blocking_gates: vec!["constraints".to_string()],
        }
    }
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads (0 = rayon default)
    pub jobs: usize,
    /// Minimum pass rate for a successful run
    pub target_pass_rate: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            target_pass_rate: 0.9,
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Field that failed validation
    pub field: String,
    /// Error message
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl QaConfig {
    /// Parse configuration from JSON
    pub fn from_json(json: &str) -> QaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> QaResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> QaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> QaResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Load and validate a configuration file (`.json`, `.yaml` or `.yml`)
    pub fn load(path: &Path) -> QaResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QaError::config(format!("cannot read {}: {e}", path.display())))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parsed = match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => {
                return Err(QaError::config(format!(
                    "unsupported config format for {} (expected .json, .yaml or .yml)",
                    path.display()
                )))
            }
        };

        let config = parsed
            .map_err(|e| QaError::config(format!("cannot parse {}: {e}", path.display())))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Set the worker thread count
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.batch.jobs = jobs;
        self
    }

    /// Set the batch target pass rate
    #[must_use]
    pub const fn with_target_pass_rate(mut self, rate: f64) -> Self {
        self.batch.target_pass_rate = rate;
        self
    }

    /// Set the ΔE formula
    #[must_use]
    pub const fn with_formula(mut self, formula: DeltaEFormula) -> Self {
        self.color_accuracy.formula = formula;
        self
    }

    /// Set the aggregator weights
    #[must_use]
    pub const fn with_aggregator_weights(mut self, weights: AggregatorWeights) -> Self {
        self.aggregator.weights = weights;
        self
    }

    /// Set the missing-semantic policy
    #[must_use]
    pub const fn with_unavailable_semantic(mut self, policy: UnavailableSemantic) -> Self {
        self.aggregator.unavailable_semantic = policy;
        self
    }

    /// Replace the blocking gate list
    #[must_use]
    pub fn with_blocking_gates(mut self, gates: Vec<String>) -> Self {
        self.aggregator.blocking_gates = gates;
        self
    }

    /// Validate configuration values
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let unit = |errors: &mut Vec<ConfigValidationError>, field: &str, value: f64| {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigValidationError::new(field, "Must be between 0 and 1"));
            }
        };
        let non_negative = |errors: &mut Vec<ConfigValidationError>, field: &str, value: f64| {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ConfigValidationError::new(field, "Must be non-negative"));
            }
        };

        // Color accuracy
        let color = &self.color_accuracy;
        non_negative(&mut errors, "color_accuracy.delta_e_uniform_max", color.delta_e_uniform_max);
        non_negative(&mut errors, "color_accuracy.delta_e_textured_max", color.delta_e_textured_max);
        if color.center_crop_divisor == 0 {
            errors.push(ConfigValidationError::new(
                "color_accuracy.center_crop_divisor",
                "Must be at least 1",
            ));
        }

        // Edge quality
        unit(&mut errors, "edge_quality.min_score", self.edge_quality.min_score);
        let edge_weights = self.edge_quality.weights;
        for (field, value) in [
            ("edge_quality.weights.similarity", edge_weights.similarity),
            ("edge_quality.weights.alpha_mean", edge_weights.alpha_mean),
            ("edge_quality.weights.alpha_uniformity", edge_weights.alpha_uniformity),
            ("edge_quality.weights.edge_density", edge_weights.edge_density),
        ] {
            non_negative(&mut errors, field, value);
        }
        if (edge_weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(ConfigValidationError::new(
                "edge_quality.weights",
                format!("Must sum to 1.0 (got {:.6})", edge_weights.sum()),
            ));
        }

        // Background
        unit(&mut errors, "background.purity_min", self.background.purity_min);
        unit(&mut errors, "background.whiteness_weight", self.background.whiteness_weight);

        // Constraints
        let constraints = &self.constraints;
        non_negative(&mut errors, "constraints.pocket_min_area", constraints.pocket_min_area);
        non_negative(&mut errors, "constraints.pocket_max_area", constraints.pocket_max_area);
        if constraints.pocket_min_area >= constraints.pocket_max_area {
            errors.push(ConfigValidationError::new(
                "constraints.pocket_max_area",
                "Must be greater than pocket_min_area",
            ));
        }
        unit(&mut errors, "constraints.halo_edge_density_max", constraints.halo_edge_density_max);

        // Perceptual
        unit(&mut errors, "perceptual.min_score", self.perceptual.min_score);

        // Aggregator
        let aggregator = &self.aggregator;
        let weights = aggregator.weights;
        for (field, value) in [
            ("aggregator.weights.edge", weights.edge),
            ("aggregator.weights.background", weights.background),
            ("aggregator.weights.color", weights.color),
            ("aggregator.weights.semantic", weights.semantic),
        ] {
            non_negative(&mut errors, field, value);
        }
        if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(ConfigValidationError::new(
                "aggregator.weights",
                format!("Must sum to 1.0 (got {:.6})", weights.sum()),
            ));
        }
        if aggregator.unavailable_semantic == UnavailableSemantic::Redistribute
            && weights.semantic >= 1.0
        {
            errors.push(ConfigValidationError::new(
                "aggregator.unavailable_semantic",
                "Cannot redistribute when the semantic weight is 1.0",
            ));
        }
        for gate in &aggregator.blocking_gates {
            if !KNOWN_GATES.contains(&gate.as_str()) {
                errors.push(ConfigValidationError::new(
                    "aggregator.blocking_gates",
                    format!("Unknown gate '{gate}' (known: {})", KNOWN_GATES.join(", ")),
                ));
            }
        }
        unit(&mut errors, "aggregator.pass_threshold", aggregator.pass_threshold);
        unit(&mut errors, "aggregator.neutral_semantic_score", aggregator.neutral_semantic_score);

        // Batch
        unit(&mut errors, "batch.target_pass_rate", self.batch.target_pass_rate);

        errors
    }

    /// Check if configuration is valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Fail with [`QaError::Config`] listing every validation error
    pub fn ensure_valid(&self) -> QaResult<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(QaError::config(joined))
        }
    }
}
