//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// GhostQA: quality gates for ghost-mannequin product renders
#[derive(Parser, Debug)]
#[command(name = "ghostqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a directory of renders against their Facts
    Validate(ValidateArgs),

    /// Validate a single render
    Check(CheckArgs),

    /// Print the default configuration
    Config(ConfigArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Directory of rendered images
    #[arg(long)]
    pub images: PathBuf,

    /// Directory of Facts JSON files
    #[arg(long)]
    pub facts: PathBuf,

    /// Directory of segmentation masks
    #[arg(long)]
    pub masks: Option<PathBuf>,

    /// Directory of `{image}.perceptual.json` score sidecars
    #[arg(long)]
    pub perceptual_scores: Option<PathBuf>,

    /// Configuration file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormatArg,

    /// Required pass rate (overrides the configuration)
    #[arg(long)]
    pub target_pass_rate: Option<f64>,

    /// Number of worker threads (0 = all cores)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Rendered image
    pub image: PathBuf,

    /// Facts JSON file
    #[arg(long)]
    pub facts: PathBuf,

    /// Segmentation mask
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// Configuration file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: VerdictFormatArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Write to this file; the extension picks YAML or JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Batch report format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormatArg {
    /// JSON report
    Json,
    /// Plain-text summary
    #[default]
    Text,
    /// Markdown report
    Markdown,
}

impl From<ReportFormatArg> for ghostqa::ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Json => Self::Json,
            ReportFormatArg::Text => Self::Text,
            ReportFormatArg::Markdown => Self::Markdown,
        }
    }
}

/// Single-verdict format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerdictFormatArg {
    /// JSON verdict
    Json,
    /// Plain-text verdict
    #[default]
    Text,
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_validate_command() {
            let cli = Cli::parse_from([
                "ghostqa", "validate", "--images", "renders", "--facts", "facts",
            ]);
            match cli.command {
                Commands::Validate(args) => {
                    assert_eq!(args.images, PathBuf::from("renders"));
                    assert_eq!(args.facts, PathBuf::from("facts"));
                    assert!(args.masks.is_none());
                    assert_eq!(args.format, ReportFormatArg::Text);
                    assert!(args.jobs.is_none());
                    assert!(args.target_pass_rate.is_none());
                }
                _ => panic!("expected validate command"),
            }
        }

        #[test]
        fn test_parse_validate_all_options() {
            let cli = Cli::parse_from([
                "ghostqa",
                "validate",
                "--images",
                "r",
                "--facts",
                "f",
                "--masks",
                "m",
                "--perceptual-scores",
                "p",
                "--config",
                "qa.yaml",
                "--report",
                "out.md",
                "--format",
                "markdown",
                "--target-pass-rate",
                "0.8",
                "-j",
                "4",
            ]);
            match cli.command {
                Commands::Validate(args) => {
                    assert_eq!(args.masks, Some(PathBuf::from("m")));
                    assert_eq!(args.perceptual_scores, Some(PathBuf::from("p")));
                    assert_eq!(args.config, Some(PathBuf::from("qa.yaml")));
                    assert_eq!(args.report, Some(PathBuf::from("out.md")));
                    assert_eq!(args.format, ReportFormatArg::Markdown);
                    assert_eq!(args.target_pass_rate, Some(0.8));
                    assert_eq!(args.jobs, Some(4));
                }
                _ => panic!("expected validate command"),
            }
        }

        #[test]
        fn test_parse_check_command() {
            let cli = Cli::parse_from([
                "ghostqa", "check", "shirt.png", "--facts", "shirt.json", "--format", "json",
            ]);
            match cli.command {
                Commands::Check(args) => {
                    assert_eq!(args.image, PathBuf::from("shirt.png"));
                    assert_eq!(args.facts, PathBuf::from("shirt.json"));
                    assert_eq!(args.format, VerdictFormatArg::Json);
                }
                _ => panic!("expected check command"),
            }
        }

        #[test]
        fn test_parse_global_flags() {
            let cli = Cli::parse_from([
                "ghostqa",
                "-vv",
                "--color",
                "never",
                "--log-format",
                "json",
                "config",
            ]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert_eq!(cli.log_format, LogFormatArg::Json);
            assert!(matches!(cli.command, Commands::Config(_)));
        }

        #[test]
        fn test_validate_requires_facts() {
            let result = Cli::try_parse_from(["ghostqa", "validate", "--images", "r"]);
            assert!(result.is_err());
        }
    }

    mod conversion_tests {
        use super::*;
        use crate::config::ColorChoice;

        #[test]
        fn test_report_format_conversion() {
            assert_eq!(
                ghostqa::ReportFormat::from(ReportFormatArg::Markdown),
                ghostqa::ReportFormat::Markdown
            );
            assert_eq!(
                ghostqa::ReportFormat::from(ReportFormatArg::Json),
                ghostqa::ReportFormat::Json
            );
        }

        #[test]
        fn test_color_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
        }
    }
}
