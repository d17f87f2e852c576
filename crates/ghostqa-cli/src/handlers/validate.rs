//! Validate command handler

use super::{load_qa_config, write_output};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::ValidateArgs;
use ghostqa::{
    BatchOrchestrator, ItemOutcome, PerceptualOracle, QaConfig, QaEngine, SidecarScoreOracle,
    UnavailableOracle,
};
use std::sync::Arc;
use std::time::Instant;

/// Execute the validate command
///
/// Succeeds only when the batch pass rate reaches the target.
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let mut qa = load_qa_config(args.config.as_deref())?;
    apply_overrides(&mut qa, args);
    qa.ensure_valid()?;

    let oracle: Arc<dyn PerceptualOracle> = match args.perceptual_scores {
        Some(ref dir) => Arc::new(SidecarScoreOracle::new(dir)),
        None => Arc::new(UnavailableOracle),
    };
    let orchestrator = BatchOrchestrator::new(QaEngine::with_oracle(qa.clone(), oracle)?)?;
    let pairs = ghostqa::batch::discover(&args.images, &args.facts, args.masks.as_deref())?;

    let mut reporter = ProgressReporter::from_config(config);
    if config.verbosity.is_verbose() {
        reporter.info(&format!(
            "Validating {} renders with {} workers",
            pairs.len(),
            orchestrator.jobs()
        ));
    }

    let start = Instant::now();
    reporter.start_progress(pairs.len() as u64, "validating");
    let bar = reporter.progress_bar();
    let progress = |outcome: &ItemOutcome| {
        if let Some(ref pb) = bar {
            pb.set_message(outcome.image_id());
            pb.inc(1);
        }
    };
    let report = orchestrator.run(&pairs, Some(&progress));
    reporter.finish();

    if config.verbosity.is_verbose() {
        for item in &report.verdicts {
            reporter.item_line(item);
        }
    }
    reporter.report_errors(&report);

    let rendered = ghostqa::batch::render(&report, args.format.into(), &qa)?;
    match args.report {
        Some(ref path) => {
            write_output(path, &rendered)?;
            reporter.info(&format!("Report written to {}", path.display()));
        }
        None => println!("{rendered}"),
    }

    let target = qa.batch.target_pass_rate;
    reporter.summary(&report, target, start.elapsed());

    if report.meets_target(target) {
        Ok(())
    } else {
        Err(CliError::BelowTarget {
            pass_rate: report.pass_rate * 100.0,
            target: target * 100.0,
        })
    }
}

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(qa: &mut QaConfig, args: &ValidateArgs) {
    if let Some(rate) = args.target_pass_rate {
        qa.batch.target_pass_rate = rate;
    }
    if let Some(jobs) = args.jobs {
        qa.batch.jobs = jobs;
    }
}
