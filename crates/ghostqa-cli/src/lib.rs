//! GhostQA CLI Library
//!
//! Command-line interface for batch and single-image quality gating of
//! ghost-mannequin renders.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    CheckArgs, Cli, ColorArg, Commands, ConfigArgs, LogFormatArg, ReportFormatArg, ValidateArgs,
    VerdictFormatArg,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{init_logging, ProgressReporter};
