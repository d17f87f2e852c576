//! GhostQA CLI: quality gates for ghost-mannequin renders
//!
//! ## Usage
//!
//! ```bash
//! ghostqa validate --images renders/ --facts facts/        # Batch validation
//! ghostqa validate ... --format markdown --report qa.md    # Markdown report
//! ghostqa check renders/shirt.png --facts facts/shirt.json # Single render
//! ghostqa config --output qa.yaml                          # Default configuration
//! ```

use clap::Parser;
use ghostqa_cli::{
    handlers, init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_logging(&config)?;

    match cli.command {
        Commands::Validate(args) => handlers::execute_validate(&config, &args),
        Commands::Check(args) => handlers::execute_check(&config, &args),
        Commands::Config(args) => handlers::execute_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_format(cli.log_format.into())
}
