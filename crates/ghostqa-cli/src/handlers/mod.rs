//! Command handlers
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod check;
pub mod config;
pub mod validate;

pub use check::execute_check;
pub use config::{execute_config, serialize_for_path};
pub use validate::{apply_overrides, execute_validate};

use crate::error::CliResult;
use ghostqa::QaConfig;
use std::path::Path;

/// Load `--config`, or the defaults when none was given
pub fn load_qa_config(path: Option<&Path>) -> CliResult<QaConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            Ok(QaConfig::load(path)?)
        }
        None => Ok(QaConfig::default()),
    }
}

/// Write rendered output, creating parent directories
pub fn write_output(path: &Path, content: &str) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_path() {
        let config = load_qa_config(None).unwrap();
        assert_eq!(config.batch.target_pass_rate, 0.9);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(load_qa_config(Some(Path::new("/nonexistent/qa.yaml"))).is_err());
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/report.md");
        write_output(&path, "# Report\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report\n");
    }
}
