//! Config command handler

use super::write_output;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::ConfigArgs;
use ghostqa::QaConfig;
use std::path::Path;

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let defaults = QaConfig::default();

    match args.output {
        Some(ref path) => {
            let content = serialize_for_path(&defaults, path)?;
            write_output(path, &content)?;
            ProgressReporter::from_config(config)
                .success(&format!("Default configuration written to {}", path.display()));
        }
        None => print!("{}", defaults.to_yaml()?),
    }
    Ok(())
}

/// Serialize a configuration in the format implied by `path`'s extension
pub fn serialize_for_path(qa: &QaConfig, path: &Path) -> CliResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => Ok(qa.to_json()?),
        Some("yaml" | "yml") => Ok(qa.to_yaml()?),
        _ => Err(CliError::invalid_argument(format!(
            "unsupported config extension for {} (use .json, .yaml or .yml)",
            path.display()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_json() {
        let text = serialize_for_path(&QaConfig::default(), Path::new("qa.json")).unwrap();
        let parsed = QaConfig::from_json(&text).unwrap();
        assert_eq!(parsed.aggregator.pass_threshold, 0.85);
    }

    #[test]
    fn test_serialize_yaml() {
        let text = serialize_for_path(&QaConfig::default(), Path::new("qa.YML")).unwrap();
        assert!(text.contains("pass_threshold"));
    }

    #[test]
    fn test_unknown_extension() {
        let err = serialize_for_path(&QaConfig::default(), Path::new("qa.toml")).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.yaml");
        let args = ConfigArgs {
            output: Some(path.clone()),
        };
        let config = CliConfig::new().with_verbosity(crate::config::Verbosity::Quiet);
        execute_config(&config, &args).unwrap();
        let loaded = QaConfig::load(&path).unwrap();
        assert!(loaded.is_valid());
    }
}
