//! Garment Facts: the machine-readable description a render is validated against.
//!
//! Every field is optional on the wire. Absent fields fall back to the
//! defaults documented on each struct; only a syntactically malformed
//! document (invalid JSON, wrong type) is rejected.

use crate::result::{QaError, QaResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Hex color assumed when `garment.color_hex` is absent
pub const DEFAULT_COLOR_HEX: &str = "#000000";

/// Fabric/category keywords that mark a garment as textured
pub const TEXTURED_KEYWORDS: [&str; 9] = [
    "tweed", "jacquard", "pattern", "textured", "woven", "denim", "corduroy", "flannel", "twill",
];

/// Root Facts record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarmentFacts {
    /// Facts schema version, if declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Garment description
    pub garment: Garment,
    /// Rendering contract
    pub constraints: Constraints,
}

/// Garment description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Garment {
    /// Garment category (e.g. "jacket")
    pub category: String,
    /// Fabric descriptor; empty means uniform
    pub fabric: String,
    /// Target color `#RRGGBB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    /// Expected number of visible pockets; 0 skips the pocket check
    pub pockets_count: u32,
    /// Expected label text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    /// Precomputed per-part analysis
    pub parts: Vec<GarmentPart>,
}

/// One analyzed garment part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarmentPart {
    /// Part name (e.g. "sleeve_left")
    pub part_name: String,
    /// Part color `#RRGGBB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    /// Texture descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    /// Pattern descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Whether the vision analysis completed for this part
    pub analyzed: bool,
}

/// Mandatory and forbidden rendering properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Elements that must not appear (e.g. "halo", "visible mannequin")
    pub forbidden_elements: BTreeSet<String>,
    /// Features the render must show
    pub mandatory_features: Vec<String>,
}

/// Summary of per-part analysis completeness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartAnalysis {
    /// Parts with completed analysis
    pub analyzed_parts: usize,
    /// Parts listed in Facts
    pub total_parts: usize,
    /// `analyzed_parts / total_parts` (0.0 without parts)
    pub coverage: f64,
}

impl GarmentFacts {
    /// Parse Facts from a JSON string
    pub fn from_json(json: &str) -> QaResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| QaError::invalid_format(format!("malformed facts document: {e}")))
    }

    /// Load Facts from a JSON file
    pub fn load(path: &Path) -> QaResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QaError::missing_resource(path, e.to_string()))?;
        Self::from_json(&content).map_err(|e| match e {
            QaError::InvalidFormat { message } => {
                QaError::invalid_format(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Target color, falling back to [`DEFAULT_COLOR_HEX`]
    #[must_use]
    pub fn color_hex(&self) -> &str {
        self.garment
            .color_hex
            .as_deref()
            .unwrap_or(DEFAULT_COLOR_HEX)
    }

    /// Whether the target color was absent and defaulted
    #[must_use]
    pub fn color_hex_defaulted(&self) -> bool {
        self.garment.color_hex.is_none()
    }

    /// Whether the garment counts as textured for color tolerance
    #[must_use]
    pub fn is_textured(&self) -> bool {
        is_textured(&self.garment.fabric, &self.garment.category)
    }

    /// Non-empty label text, if any
    #[must_use]
    pub fn label_text(&self) -> Option<&str> {
        self.garment
            .label_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Summarize per-part analysis completeness
    #[must_use]
    pub fn part_analysis(&self) -> PartAnalysis {
        let total_parts = self.garment.parts.len();
        let analyzed_parts = self.garment.parts.iter().filter(|p| p.analyzed).count();
        let coverage = if total_parts == 0 {
            0.0
        } else {
            analyzed_parts as f64 / total_parts as f64
        };
        PartAnalysis {
            analyzed_parts,
            total_parts,
            coverage,
        }
    }
}

/// Whether either descriptor contains a textured-fabric keyword (case-insensitive)
#[must_use]
pub fn is_textured(fabric: &str, category: &str) -> bool {
    let fabric = fabric.to_lowercase();
    let category = category.to_lowercase();
    TEXTURED_KEYWORDS
        .iter()
        .any(|k| fabric.contains(k) || category.contains(k))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const FULL_FACTS: &str = r##"{
        "schema_version": "1.2",
        "garment": {
            "category": "blazer",
            "fabric": "Wool Tweed",
            "color_hex": "#1A2B3C",
            "pockets_count": 2,
            "label_text": "ACME",
            "parts": [
                {"part_name": "body", "color_hex": "#1a2b3c", "texture": "tweed", "analyzed": true},
                {"part_name": "collar", "analyzed": false}
            ]
        },
        "constraints": {
            "forbidden_elements": ["halo", "visible mannequin"],
            "mandatory_features": ["collar"]
        }
    }"##;

    mod parsing_tests {
        use super::*;

        #[test]
        fn test_full_document() {
            let facts = GarmentFacts::from_json(FULL_FACTS).unwrap();
            assert_eq!(facts.schema_version.as_deref(), Some("1.2"));
            assert_eq!(facts.color_hex(), "#1A2B3C");
            assert!(!facts.color_hex_defaulted());
            assert_eq!(facts.garment.pockets_count, 2);
            assert_eq!(facts.label_text(), Some("ACME"));
            assert!(facts.constraints.forbidden_elements.contains("halo"));
            assert_eq!(facts.constraints.mandatory_features, vec!["collar"]);
        }

        #[test]
        fn test_empty_document_uses_defaults() {
            let facts = GarmentFacts::from_json("{}").unwrap();
            assert_eq!(facts.color_hex(), DEFAULT_COLOR_HEX);
            assert!(facts.color_hex_defaulted());
            assert_eq!(facts.garment.pockets_count, 0);
            assert!(facts.garment.fabric.is_empty());
            assert!(facts.label_text().is_none());
            assert!(facts.constraints.forbidden_elements.is_empty());
            assert!(!facts.is_textured());
        }

        #[test]
        fn test_partial_garment() {
            let facts = GarmentFacts::from_json(r#"{"garment": {"fabric": "cotton"}}"#).unwrap();
            assert_eq!(facts.garment.fabric, "cotton");
            assert!(facts.color_hex_defaulted());
        }

        #[test]
        fn test_invalid_json_is_invalid_format() {
            let err = GarmentFacts::from_json("{not json").unwrap_err();
            assert!(matches!(err, QaError::InvalidFormat { .. }));
        }

        #[test]
        fn test_negative_pocket_count_is_invalid_format() {
            let err =
                GarmentFacts::from_json(r#"{"garment": {"pockets_count": -1}}"#).unwrap_err();
            assert!(matches!(err, QaError::InvalidFormat { .. }));
        }

        #[test]
        fn test_blank_label_is_ignored() {
            let facts = GarmentFacts::from_json(r#"{"garment": {"label_text": "  "}}"#).unwrap();
            assert!(facts.label_text().is_none());
        }

        #[test]
        fn test_load_missing_file() {
            let err = GarmentFacts::load(Path::new("/nonexistent/facts.json")).unwrap_err();
            assert!(matches!(err, QaError::MissingResource { .. }));
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("shirt.json");
            std::fs::write(&path, FULL_FACTS).unwrap();
            let facts = GarmentFacts::load(&path).unwrap();
            assert_eq!(facts.garment.category, "blazer");
        }
    }

    mod texture_tests {
        use super::*;

        #[test]
        fn test_textured_keywords() {
            assert!(is_textured("Harris Tweed", ""));
            assert!(is_textured("", "DENIM jacket"));
            assert!(is_textured("herringbone twill", "trousers"));
            assert!(!is_textured("cotton", "t-shirt"));
            assert!(!is_textured("", ""));
        }

        #[test]
        fn test_facts_textured() {
            let facts = GarmentFacts::from_json(FULL_FACTS).unwrap();
            assert!(facts.is_textured());
        }
    }

    mod part_analysis_tests {
        use super::*;

        #[test]
        fn test_partial_coverage() {
            let facts = GarmentFacts::from_json(FULL_FACTS).unwrap();
            let summary = facts.part_analysis();
            assert_eq!(summary.analyzed_parts, 1);
            assert_eq!(summary.total_parts, 2);
            assert!((summary.coverage - 0.5).abs() < 1e-12);
        }

        #[test]
        fn test_no_parts() {
            let summary = GarmentFacts::default().part_analysis();
            assert_eq!(summary.total_parts, 0);
            assert_eq!(summary.coverage, 0.0);
        }
    }
}
