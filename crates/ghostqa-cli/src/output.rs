//! Output formatting, progress reporting and log setup

use crate::config::{CliConfig, LogFormat};
use crate::error::{CliError, CliResult};
use console::{style, Style, StyledObject, Term};
use ghostqa::{BatchReport, ItemOutcome, ItemStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` overrides the level implied by `-q`/`-v`.
pub fn init_logging(config: &CliConfig) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()));
    let registry = Registry::default().with(filter);

    let result = match config.log_format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(config.color.should_color()),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| CliError::logging(e.to_string()))
}

/// Progress reporter for batch validation
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Build a reporter honoring the CLI configuration
    #[must_use]
    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(config.color.should_color(), config.verbosity.is_quiet())
    }

    /// Start a progress bar over `total` renders
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || total == 0 {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Handle to the running bar, shared with worker threads
    #[must_use]
    pub fn progress_bar(&self) -> Option<ProgressBar> {
        self.progress_bar.clone()
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.tagged(style("✓").green().bold(), "PASS", message);
        }
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        self.tagged(style("✗").red().bold(), "FAIL", message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.tagged(style("⚠").yellow().bold(), "WARN", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.tagged(style("ℹ").blue().bold(), "INFO", message);
        }
    }

    /// Print the batch summary line
    pub fn summary(&self, report: &BatchReport, target: f64, duration: Duration) {
        let met = report.meets_target(target);
        if self.quiet && met {
            return;
        }

        self.write_line("");
        self.write_line(&summary_line(report, met, duration, self.use_color));
    }

    fn tagged(&self, icon: StyledObject<&str>, tag: &str, message: &str) {
        self.write_line(&tagged_line(self.use_color, icon, tag, message));
    }

    fn write_line(&self, line: &str) {
        if let Err(e) = self.term.write_line(line) {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    /// Report every render that could not be evaluated
    pub fn report_errors(&self, report: &BatchReport) {
        for item in report.errors() {
            if let Some(ref error) = item.error {
                self.warning(&format!("{}: {} ({})", item.image_id(), error.message, error.kind));
            }
        }
    }

    /// One line per render in verbose mode
    pub fn item_line(&self, item: &ItemOutcome) {
        match (item.status, &item.verdict) {
            (ItemStatus::Passed, Some(v)) => {
                self.success(&format!("{} qa_total {:.3}", item.image_id(), v.qa_total));
            }
            (ItemStatus::Failed, Some(v)) => {
                self.failure(&format!(
                    "{} qa_total {:.3} ({})",
                    item.image_id(),
                    v.qa_total,
                    v.recommendation
                ));
            }
            _ => {}
        }
    }
}

/// `"{prefix} {message}"`, with the styled icon or the plain tag as prefix
fn tagged_line(use_color: bool, icon: StyledObject<&str>, tag: &str, message: &str) -> String {
    if use_color {
        format!("{icon} {message}")
    } else {
        format!("{tag} {message}")
    }
}

fn summary_line(report: &BatchReport, met: bool, duration: Duration, use_color: bool) -> String {
    let duration_secs = duration.as_secs_f64();
    let rate = report.pass_rate * 100.0;

    if use_color {
        let passed_style = Style::new().green().bold();
        let failed_style = Style::new().red().bold();
        let error_style = Style::new().yellow();

        let status = if met {
            passed_style.apply_to("PASSED")
        } else {
            failed_style.apply_to("FAILED")
        };
        let failed = if report.failed_images > 0 {
            failed_style.apply_to(report.failed_images).to_string()
        } else {
            report.failed_images.to_string()
        };

        format!(
            "{status} {} renders in {duration_secs:.2}s ({} passed, {failed} failed, {} errors), pass rate {rate:.1}%",
            report.total_images,
            passed_style.apply_to(report.passed_images),
            error_style.apply_to(report.error_images),
        )
    } else {
        let status = if met { "PASSED" } else { "FAILED" };
        format!(
            "{status} {} renders in {duration_secs:.2}s ({} passed, {} failed, {} errors), pass rate {rate:.1}%",
            report.total_images, report.passed_images, report.failed_images, report.error_images
        )
    }
}
