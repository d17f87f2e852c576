//! Report rendering: JSON, plain text summary and Markdown QA report.

use super::{BatchReport, ItemStatus};
use crate::config::QaConfig;
use crate::gates::GateKind;
use crate::result::QaResult;
use crate::verdict::QaVerdict;
use serde::{Deserialize, Serialize};

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Pretty JSON
    #[default]
    Json,
    /// Human-readable summary
    Text,
    /// Markdown QA report
    Markdown,
}

/// Render a batch report in the requested format
pub fn render(report: &BatchReport, format: ReportFormat, config: &QaConfig) -> QaResult<String> {
    match format {
        ReportFormat::Json => render_json(report),
        ReportFormat::Text => Ok(render_text(report, config.batch.target_pass_rate)),
        ReportFormat::Markdown => Ok(render_markdown(report, config)),
    }
}

/// Pretty-printed JSON
pub fn render_json(report: &BatchReport) -> QaResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn fmt_value(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{value:.precision$}")
    } else {
        "n/a".to_string()
    }
}

fn status_mark(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Plain-text summary
#[must_use]
pub fn render_text(report: &BatchReport, target_pass_rate: f64) -> String {
    let mut out = String::new();
    out.push_str("GhostQA Batch Report\n");
    out.push_str("====================\n\n");
    out.push_str(&format!("Total images:  {}\n", report.total_images));
    out.push_str(&format!("Passed:        {}\n", report.passed_images));
    out.push_str(&format!("Failed:        {}\n", report.failed_images));
    out.push_str(&format!("Errors:        {}\n", report.error_images));
    out.push_str(&format!(
        "Pass rate:     {:.1}% (target {:.1}%) {}\n",
        report.pass_rate * 100.0,
        target_pass_rate * 100.0,
        status_mark(report.meets_target(target_pass_rate))
    ));

    if !report.per_metric_statistics.is_empty() {
        out.push_str("\nMetrics:\n");
        for (metric, stats) in &report.per_metric_statistics {
            out.push_str(&format!(
                "  {metric:<18} mean {:>8} median {:>8} min {:>8} max {:>8} std {:>8}\n",
                fmt_value(stats.mean, 3),
                fmt_value(stats.median, 3),
                fmt_value(stats.min, 3),
                fmt_value(stats.max, 3),
                fmt_value(stats.stddev, 3),
            ));
        }
    }

    if !report.verdicts.is_empty() {
        out.push_str("\nItems:\n");
        for item in &report.verdicts {
            match (&item.verdict, &item.error) {
                (Some(verdict), _) => out.push_str(&format!(
                    "  [{}] {} qa_total {} ({}) {}\n",
                    status_mark(verdict.passed),
                    verdict.image_id,
                    fmt_value(verdict.qa_total, 3),
                    verdict.quality_tier,
                    verdict.recommendation
                )),
                (None, Some(error)) => out.push_str(&format!(
                    "  [ERR ] {} {}: {}\n",
                    item.image_id(),
                    error.kind,
                    error.message
                )),
                (None, None) => {}
            }
        }
    }

    out
}

/// Plain-text rendering of a single verdict
#[must_use]
pub fn render_verdict_text(verdict: &QaVerdict) -> String {
    let mut out = String::new();
    out.push_str(&format!("Image:          {}\n", verdict.image_id));
    out.push_str(&format!(
        "QA total:       {} ({})\n",
        fmt_value(verdict.qa_total, 4),
        verdict.quality_tier
    ));
    out.push_str(&format!("Recommendation: {}\n", verdict.recommendation));
    if !verdict.blocking_gates.is_empty() {
        out.push_str(&format!(
            "Blocked by:     {}\n",
            verdict.blocking_gates.join(", ")
        ));
    }
    out.push_str("\nGates:\n");
    for gate in &verdict.gate_results {
        out.push_str(&format!(
            "  {:<15} {:<9} {} score {} threshold {}\n",
            gate.gate_name,
            gate.status.to_string(),
            status_mark(gate.passed),
            fmt_value(gate.score, 4),
            fmt_value(gate.threshold, 4)
        ));
        if let Some(failures) = gate.detail("failures").and_then(|f| f.as_array()) {
            for failure in failures.iter().filter_map(|f| f.as_str()) {
                out.push_str(&format!("      - {failure}\n"));
            }
        }
        if let Some(error) = gate.detail("error").and_then(|e| e.as_str()) {
            out.push_str(&format!("      ! {error}\n"));
        }
    }
    out
}

/// Markdown QA report
#[must_use]
pub fn render_markdown(report: &BatchReport, config: &QaConfig) -> String {
    let target = config.batch.target_pass_rate;
    let uniform_max = config.color_accuracy.delta_e_uniform_max;
    let textured_max = config.color_accuracy.delta_e_textured_max;

    let mut md = String::new();
    md.push_str("# Ghost-Mannequin Quality Assurance Report\n\n");
    md.push_str(&format!(
        "**Generated:** {}  \n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("**Total Images:** {}  \n", report.total_images));
    md.push_str(&format!("**Passed Images:** {}  \n", report.passed_images));
    md.push_str(&format!("**Failed Images:** {}  \n", report.failed_images));
    md.push_str(&format!("**Errored Images:** {}  \n", report.error_images));
    md.push_str(&format!(
        "**Overall Pass Rate:** {:.1}%\n\n",
        report.pass_rate * 100.0
    ));

    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Status | Details |\n");
    md.push_str("|--------|--------|---------|\n");
    md.push_str(&format!(
        "| **Overall Pass Rate** | {} | {:.1}% ({}/{}), target {:.1}% |\n",
        if report.meets_target(target) {
            "PASS"
        } else {
            "NEEDS IMPROVEMENT"
        },
        report.pass_rate * 100.0,
        report.passed_images,
        report.total_images,
        target * 100.0
    ));
    let perceptual_available = report
        .verdicts
        .iter()
        .filter_map(|o| o.verdict.as_ref())
        .any(|v| v.scores.semantic.is_some() && perceptual_evaluated(v));
    md.push_str(&format!(
        "| **Perceptual Quality** | {} | external oracle |\n\n",
        if perceptual_available {
            "AVAILABLE"
        } else {
            "UNAVAILABLE"
        }
    ));

    md.push_str("## Metric Statistics\n\n");
    if report.per_metric_statistics.is_empty() {
        md.push_str("No evaluated images.\n\n");
    } else {
        md.push_str("| Metric | Count | Mean | Median | Min | Max | Std Dev |\n");
        md.push_str("|--------|-------|------|--------|-----|-----|---------|\n");
        for (metric, stats) in &report.per_metric_statistics {
            md.push_str(&format!(
                "| {metric} | {} | {} | {} | {} | {} | {} |\n",
                stats.count,
                fmt_value(stats.mean, 3),
                fmt_value(stats.median, 3),
                fmt_value(stats.min, 3),
                fmt_value(stats.max, 3),
                fmt_value(stats.stddev, 3),
            ));
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "**Color target:** ΔE ≤ {uniform_max:.1} (uniform fabrics), ΔE ≤ {textured_max:.1} (textured fabrics)\n\n"
    ));

    md.push_str("## Individual Image Results\n\n");
    md.push_str("| Image | Result | QA Total | Tier | Color ΔE | Edge | Background | Notes |\n");
    md.push_str("|-------|--------|----------|------|----------|------|------------|-------|\n");
    for item in &report.verdicts {
        let image = item.image_id();
        match (&item.verdict, &item.error) {
            (Some(v), _) => md.push_str(&format!(
                "| {image} | {} | {} | {} | {} | {} | {} | {} |\n",
                if item.status == ItemStatus::Passed {
                    "PASS"
                } else {
                    "FAIL"
                },
                fmt_value(v.qa_total, 3),
                v.quality_tier,
                fmt_value(v.delta_e, 2),
                fmt_value(v.scores.edge, 3),
                fmt_value(v.scores.background, 3),
                failure_notes(v)
            )),
            (None, Some(e)) => md.push_str(&format!(
                "| {image} | ERROR | - | - | - | - | - | {}: {} |\n",
                e.kind,
                e.message.replace('|', "\\|")
            )),
            (None, None) => {}
        }
    }

    md.push_str("\n## Recommendations\n\n");
    let mut recommendations = Vec::new();
    if !report.meets_target(target) {
        recommendations.push(format!(
            "- **Improve overall pass rate:** {:.1}% is below the {:.1}% target. Re-render the failed images.",
            report.pass_rate * 100.0,
            target * 100.0
        ));
    }
    if let Some(stats) = report.per_metric_statistics.get("delta_e") {
        if stats.mean > uniform_max {
            recommendations.push(format!(
                "- **Color accuracy:** mean ΔE {:.2} exceeds the uniform-fabric ceiling of {uniform_max:.1}.",
                stats.mean
            ));
        }
    }
    if report.error_images > 0 {
        recommendations.push(format!(
            "- **Inputs:** {} image(s) could not be evaluated; check missing Facts files and corrupt renders.",
            report.error_images
        ));
    }
    if recommendations.is_empty() {
        md.push_str("No action required.\n");
    } else {
        for line in recommendations {
            md.push_str(&line);
            md.push('\n');
        }
    }

    md
}

fn perceptual_evaluated(verdict: &QaVerdict) -> bool {
    verdict
        .gate(GateKind::Perceptual)
        .is_some_and(|g| g.status == crate::gates::GateStatus::Evaluated)
}

fn failure_notes(verdict: &QaVerdict) -> String {
    let mut notes: Vec<String> = verdict
        .gate_results
        .iter()
        .filter(|g| !g.passed)
        .map(|g| g.gate_name.clone())
        .collect();
    if let Some(failures) = verdict
        .gate(GateKind::Constraints)
        .and_then(|g| g.detail("failures"))
        .and_then(|f| f.as_array())
    {
        notes.extend(failures.iter().filter_map(|f| f.as_str()).map(str::to_string));
    }
    notes.join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::batch::{ItemError, ItemOutcome};
    use crate::facts::GarmentFacts;
    use crate::raster::RenderedImage;
    use crate::result::ErrorKind;
    use crate::verdict::QaEngine;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn sample_report() -> BatchReport {
        let engine = QaEngine::new(QaConfig::default()).unwrap();
        let image = RenderedImage::from_rgba(RgbaImage::from_pixel(32, 32, Rgba([255, 0, 0, 255])));
        let facts = GarmentFacts::from_json(r##"{"garment": {"color_hex": "#0000ff"}}"##).unwrap();
        let verdict = engine.evaluate("red", &image, &facts, None);
        BatchReport::from_outcomes(vec![
            ItemOutcome {
                image: PathBuf::from("renders/red.png"),
                facts: Some(PathBuf::from("facts/red.json")),
                status: ItemStatus::Failed,
                verdict: Some(verdict),
                error: None,
            },
            ItemOutcome {
                image: PathBuf::from("renders/orphan.png"),
                facts: None,
                status: ItemStatus::Error,
                verdict: None,
                error: Some(ItemError {
                    kind: ErrorKind::MissingResource,
                    message: "no facts file found".into(),
                }),
            },
        ])
    }

    #[test]
    fn test_text_summary() {
        let text = render_text(&sample_report(), 0.9);
        assert!(text.contains("Total images:  2"));
        assert!(text.contains("Errors:        1"));
        assert!(text.contains("[FAIL] red"));
        assert!(text.contains("[ERR ] orphan missing_resource"));
    }

    #[test]
    fn test_markdown_sections() {
        let md = render_markdown(&sample_report(), &QaConfig::default());
        assert!(md.starts_with("# Ghost-Mannequin Quality Assurance Report"));
        assert!(md.contains("## Individual Image Results"));
        assert!(md.contains("| orphan | ERROR |"));
        assert!(md.contains("color_accuracy"));
        assert!(md.contains("Color accuracy:"));
        assert!(md.contains("UNAVAILABLE"));
    }

    #[test]
    fn test_json_is_parseable() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_images"], 2);
        assert_eq!(value["verdicts"][1]["status"], "error");
        assert_eq!(value["verdicts"][1]["error"]["kind"], "missing_resource");
    }

    #[test]
    fn test_render_dispatch() {
        let report = sample_report();
        let config = QaConfig::default();
        assert!(render(&report, ReportFormat::Markdown, &config)
            .unwrap()
            .starts_with('#'));
        assert!(render(&report, ReportFormat::Json, &config)
            .unwrap()
            .starts_with('{'));
    }

    #[test]
    fn test_verdict_text() {
        let report = sample_report();
        let verdict = report.verdicts[0].verdict.as_ref().unwrap();
        let text = render_verdict_text(verdict);
        assert!(text.contains("Recommendation: re-render"));
        assert!(text.contains("color_accuracy"));
    }

    #[test]
    fn test_non_finite_formatting() {
        assert_eq!(fmt_value(f64::INFINITY, 2), "n/a");
        assert_eq!(fmt_value(1.23456, 2), "1.23");
    }
}
