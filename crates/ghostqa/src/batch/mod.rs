//! Batch orchestration.
//!
//! ```text
//! discover ─▶ rayon pool ─▶ per pair: facts + image + mask ─▶ QaEngine
//!                                         │ error / panic
//!                                         ▼
//!                                    error item
//! collect (discovery order) ─▶ statistics ─▶ BatchReport
//! ```
//!
//! A failing pair never affects its siblings.

mod discovery;
pub mod render;
mod statistics;

pub use discovery::{
    discover, facts_candidates, find_facts, find_mask, is_image_file, ImagePair, IMAGE_EXTENSIONS,
};
pub use render::{render, render_json, render_markdown, render_text, render_verdict_text, ReportFormat};
pub use statistics::MetricStatistics;

use crate::facts::GarmentFacts;
use crate::gates::{GateKind, GateStatus};
use crate::raster::{load_mask, RenderedImage};
use crate::result::{ErrorKind, QaError, QaResult};
use crate::verdict::{QaEngine, QaVerdict};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Metrics summarized in every report
pub const REPORT_METRICS: [&str; 4] = ["delta_e", "edge_score", "background_purity", "qa_total"];

/// Resolution of one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Evaluated and accepted
    Passed,
    /// Evaluated and rejected
    Failed,
    /// Could not be evaluated
    Error,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Why a pair could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable reason
    pub message: String,
}

impl From<&QaError> for ItemError {
    fn from(err: &QaError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-pair entry of a batch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    /// Render path
    pub image: PathBuf,
    /// Facts path, if one was found
    pub facts: Option<PathBuf>,
    /// Resolution
    pub status: ItemStatus,
    /// Verdict for evaluated pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<QaVerdict>,
    /// Error for unevaluated pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

impl ItemOutcome {
    fn evaluated(pair: &ImagePair, verdict: QaVerdict) -> Self {
        Self {
            image: pair.image.clone(),
            facts: pair.facts.clone(),
            status: if verdict.passed {
                ItemStatus::Passed
            } else {
                ItemStatus::Failed
            },
            verdict: Some(verdict),
            error: None,
        }
    }

    fn errored(pair: &ImagePair, error: ItemError) -> Self {
        Self {
            image: pair.image.clone(),
            facts: pair.facts.clone(),
            status: ItemStatus::Error,
            verdict: None,
            error: Some(error),
        }
    }

    /// Image identifier (file stem)
    #[must_use]
    pub fn image_id(&self) -> String {
        self.image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Aggregated result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Every discovered render
    pub total_images: usize,
    /// Accepted renders
    pub passed_images: usize,
    /// Rejected renders
    pub failed_images: usize,
    /// Renders that could not be evaluated
    pub error_images: usize,
    /// `passed_images / total_images` (0 for an empty batch)
    pub pass_rate: f64,
    /// Statistics over evaluated renders
    pub per_metric_statistics: BTreeMap<String, MetricStatistics>,
    /// Items in discovery order
    pub verdicts: Vec<ItemOutcome>,
    /// When the report was built
    pub generated_at: DateTime<Utc>,
}

impl BatchReport {
    /// Build a report from resolved items
    #[must_use]
    pub fn from_outcomes(verdicts: Vec<ItemOutcome>) -> Self {
        let total_images = verdicts.len();
        let count = |status| verdicts.iter().filter(|o| o.status == status).count();
        let passed_images = count(ItemStatus::Passed);
        let failed_images = count(ItemStatus::Failed);
        let error_images = count(ItemStatus::Error);
        let pass_rate = if total_images == 0 {
            0.0
        } else {
            passed_images as f64 / total_images as f64
        };

        let evaluated: Vec<&QaVerdict> = verdicts.iter().filter_map(|o| o.verdict.as_ref()).collect();
        let mut per_metric_statistics = BTreeMap::new();
        for metric in REPORT_METRICS {
            let values: Vec<f64> = evaluated
                .iter()
                .filter_map(|v| metric_value(v, metric))
                .collect();
            if let Some(stats) = MetricStatistics::from_values(&values) {
                per_metric_statistics.insert(metric.to_string(), stats);
            }
        }

        Self {
            total_images,
            passed_images,
            failed_images,
            error_images,
            pass_rate,
            per_metric_statistics,
            verdicts,
            generated_at: Utc::now(),
        }
    }

    /// Whether the pass rate reaches `target`
    #[must_use]
    pub fn meets_target(&self, target: f64) -> bool {
        self.pass_rate >= target
    }

    /// Items that could not be evaluated
    pub fn errors(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.verdicts.iter().filter(|o| o.status == ItemStatus::Error)
    }
}

/// Value of a report metric, `None` when the gate behind it errored
fn metric_value(verdict: &QaVerdict, metric: &str) -> Option<f64> {
    let measured = |kind: GateKind, value: f64| {
        verdict
            .gate(kind)
            .filter(|g| g.status != GateStatus::Error)
            .map(|_| value)
    };
    match metric {
        "delta_e" => Some(verdict.delta_e),
        "edge_score" => measured(GateKind::EdgeQuality, verdict.edge_score()),
        "background_purity" => measured(GateKind::Background, verdict.background_purity()),
        _ => Some(verdict.qa_total),
    }
}

/// Runs the engine over many pairs on a bounded rayon pool
#[derive(Debug)]
pub struct BatchOrchestrator {
    engine: QaEngine,
    pool: rayon::ThreadPool,
}

impl BatchOrchestrator {
    /// Build an orchestrator with `engine.config().batch.jobs` workers
    pub fn new(engine: QaEngine) -> QaResult<Self> {
        let jobs = engine.config().batch.jobs;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("ghostqa-worker-{i}"))
            .build()
            .map_err(|e| QaError::config(format!("cannot start worker pool: {e}")))?;
        Ok(Self { engine, pool })
    }

    /// The wrapped engine
    #[must_use]
    pub const fn engine(&self) -> &QaEngine {
        &self.engine
    }

    /// Worker count
    #[must_use]
    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Discover and validate a directory of renders
    pub fn validate_directory(
        &self,
        images_dir: &Path,
        facts_dir: &Path,
        mask_dir: Option<&Path>,
        progress: Option<&(dyn Fn(&ItemOutcome) + Sync)>,
    ) -> QaResult<BatchReport> {
        let pairs = discover(images_dir, facts_dir, mask_dir)?;
        Ok(self.run(&pairs, progress))
    }

    /// Validate discovered pairs; results keep the input order
    pub fn run(
        &self,
        pairs: &[ImagePair],
        progress: Option<&(dyn Fn(&ItemOutcome) + Sync)>,
    ) -> BatchReport {
        tracing::info!(pairs = pairs.len(), jobs = self.jobs(), "batch started");

        let outcomes: Vec<ItemOutcome> = self.pool.install(|| {
            pairs
                .par_iter()
                .map(|pair| {
                    let outcome = self.run_isolated(pair);
                    if let Some(report) = progress {
                        report(&outcome);
                    }
                    outcome
                })
                .collect()
        });

        let report = BatchReport::from_outcomes(outcomes);
        tracing::info!(
            total = report.total_images,
            passed = report.passed_images,
            failed = report.failed_images,
            errors = report.error_images,
            pass_rate = report.pass_rate,
            "batch finished"
        );
        report
    }

    fn run_isolated(&self, pair: &ImagePair) -> ItemOutcome {
        match catch_unwind(AssertUnwindSafe(|| self.validate_pair(pair))) {
            Ok(Ok(verdict)) => ItemOutcome::evaluated(pair, verdict),
            Ok(Err(err)) => {
                tracing::warn!(image = %pair.image.display(), %err, "pair not evaluated");
                ItemOutcome::errored(pair, ItemError::from(&err))
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(image = %pair.image.display(), %message, "validation panicked");
                ItemOutcome::errored(
                    pair,
                    ItemError {
                        kind: ErrorKind::Internal,
                        message: format!("validation panicked: {message}"),
                    },
                )
            }
        }
    }

    /// Validate a single pair
    pub fn validate_pair(&self, pair: &ImagePair) -> QaResult<QaVerdict> {
        let facts_path = pair.facts.as_ref().ok_or_else(|| {
            QaError::missing_resource(&pair.image, "no facts file found for this image")
        })?;
        let facts = GarmentFacts::load(facts_path)?;
        let image = RenderedImage::load(&pair.image)?;
        let mask = pair.mask.as_deref().map(load_mask).transpose()?;

        Ok(self
            .engine
            .evaluate(&pair.image_id, &image, &facts, mask.as_ref()))
    }
}
