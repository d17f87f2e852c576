//! Pairing renders with their Facts and masks.

use crate::result::{QaError, QaResult};
use std::path::{Path, PathBuf};

/// Render file extensions (matched case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tiff", "bmp"];

/// One discovered render and its companions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    /// Image identifier (file stem)
    pub image_id: String,
    /// Render path
    pub image: PathBuf,
    /// Facts path, `None` when no naming convention matched
    pub facts: Option<PathBuf>,
    /// Segmentation mask path
    pub mask: Option<PathBuf>,
}

/// Whether a path has a supported render extension
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Candidate Facts file names for a stem, in lookup order
#[must_use]
pub fn facts_candidates(stem: &str) -> Vec<String> {
    let mut names = vec![format!("{stem}.json"), format!("{stem}_facts.json")];
    let trimmed = stem.trim_end_matches('_');
    if trimmed != stem && !trimmed.is_empty() {
        names.push(format!("{trimmed}.json"));
        names.push(format!("{trimmed}_facts.json"));
    }
    names
}

/// First existing Facts file for a stem
#[must_use]
pub fn find_facts(facts_dir: &Path, stem: &str) -> Option<PathBuf> {
    facts_candidates(stem)
        .into_iter()
        .map(|name| facts_dir.join(name))
        .find(|p| p.is_file())
}

/// First existing mask file for a stem
#[must_use]
pub fn find_mask(mask_dir: &Path, stem: &str) -> Option<PathBuf> {
    [format!("{stem}_mask.png"), format!("{stem}.png")]
        .into_iter()
        .map(|name| mask_dir.join(name))
        .find(|p| p.is_file())
}

/// Enumerate renders in `images_dir` (sorted by file name) and resolve companions
pub fn discover(
    images_dir: &Path,
    facts_dir: &Path,
    mask_dir: Option<&Path>,
) -> QaResult<Vec<ImagePair>> {
    if !images_dir.is_dir() {
        return Err(QaError::missing_resource(
            images_dir,
            "image directory not found",
        ));
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(images_dir)
        .map_err(|e| QaError::missing_resource(images_dir, e.to_string()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let pairs: Vec<ImagePair> = images
        .into_iter()
        .map(|image| {
            let image_id = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let facts = find_facts(facts_dir, &image_id);
            if facts.is_none() {
                tracing::warn!(image = %image.display(), "no facts file found");
            }
            let mask = mask_dir.and_then(|dir| find_mask(dir, &image_id));
            ImagePair {
                image_id,
                image,
                facts,
                mask,
            }
        })
        .collect();

    tracing::debug!(dir = %images_dir.display(), count = pairs.len(), "discovered renders");
    Ok(pairs)
}
