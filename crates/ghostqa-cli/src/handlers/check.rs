//! Check command handler

use super::load_qa_config;
use crate::commands::VerdictFormatArg;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::CheckArgs;
use ghostqa::raster::load_mask;
use ghostqa::{GarmentFacts, QaEngine, QaError, QaVerdict, RenderedImage};
use std::path::Path;

/// Execute the check command
///
/// Succeeds only when the render is accepted.
pub fn execute_check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    let verdict = evaluate_single(args)?;

    let rendered = render_verdict(&verdict, args.format)?;
    print!("{rendered}");

    if config.verbosity.is_verbose() {
        for gate in &verdict.gate_results {
            tracing::info!(
                gate = %gate.gate_name,
                status = %gate.status,
                passed = gate.passed,
                score = gate.score,
                "gate result"
            );
        }
    }

    if verdict.passed {
        Ok(())
    } else {
        Err(CliError::Rejected {
            image: verdict.image_id,
            qa_total: verdict.qa_total,
        })
    }
}

/// Load the inputs named by `args` and evaluate them
pub fn evaluate_single(args: &CheckArgs) -> CliResult<QaVerdict> {
    let qa = load_qa_config(args.config.as_deref())?;
    qa.ensure_valid()?;
    let engine = QaEngine::new(qa)?;

    let facts = GarmentFacts::load(&args.facts)?;
    let image = RenderedImage::load(&args.image)?;
    let mask = args.mask.as_deref().map(load_mask).transpose()?;

    Ok(engine.evaluate(&image_id(&args.image), &image, &facts, mask.as_ref()))
}

/// Render a verdict for stdout
pub fn render_verdict(verdict: &QaVerdict, format: VerdictFormatArg) -> CliResult<String> {
    match format {
        VerdictFormatArg::Json => {
            let mut json = serde_json::to_string_pretty(verdict).map_err(QaError::from)?;
            json.push('\n');
            Ok(json)
        }
        VerdictFormatArg::Text => Ok(ghostqa::batch::render_verdict_text(verdict)),
    }
}

fn image_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn write_inputs(dir: &Path, block: [u8; 3], color_hex: &str) -> CheckArgs {
        let mut img = RgbaImage::from_pixel(256, 256, Rgba([255, 255, 255, 255]));
        for y in 78..178 {
            for x in 78..178 {
                img.put_pixel(x, y, Rgba([block[0], block[1], block[2], 255]));
            }
        }
        let image = dir.join("shirt.png");
        img.save(&image).unwrap();
        let facts = dir.join("shirt.json");
        std::fs::write(
            &facts,
            format!(r#"{{"garment": {{"fabric": "cotton", "color_hex": "{color_hex}"}}}}"#),
        )
        .unwrap();
        CheckArgs {
            image,
            facts,
            mask: None,
            config: None,
            format: VerdictFormatArg::Json,
        }
    }

    #[test]
    fn test_image_id_from_stem() {
        assert_eq!(image_id(Path::new("renders/shirt_01.png")), "shirt_01");
    }

    #[test]
    fn test_matching_color_evaluates() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(dir.path(), [0x33, 0x66, 0x99], "#336699");
        let verdict = evaluate_single(&args).unwrap();
        assert_eq!(verdict.image_id, "shirt");
        assert_eq!(verdict.delta_e, 0.0);
    }

    #[test]
    fn test_wrong_color_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(dir.path(), [255, 0, 0], "#0000FF");
        let config = CliConfig::new().with_verbosity(crate::config::Verbosity::Quiet);
        assert!(matches!(
            execute_check(&config, &args),
            Err(CliError::Rejected { .. })
        ));
    }

    #[test]
    fn test_missing_facts_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = write_inputs(dir.path(), [0, 0, 0], "#000000");
        args.facts = PathBuf::from("/nonexistent/facts.json");
        assert!(matches!(evaluate_single(&args), Err(CliError::Qa(_))));
    }

    #[test]
    fn test_json_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_inputs(dir.path(), [0x33, 0x66, 0x99], "#336699");
        let verdict = evaluate_single(&args).unwrap();
        let json = render_verdict(&verdict, VerdictFormatArg::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["image_id"], "shirt");
        assert!(parsed["gate_results"].is_array());
    }
}
