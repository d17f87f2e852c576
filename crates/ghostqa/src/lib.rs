//! GhostQA: quality assurance for ghost-mannequin product renders
//!
//! Validates machine-generated garment images against their Facts record
//! and decides whether each render should be accepted or re-rendered.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        GhostQA Pipeline                           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────────────┐   ┌──────────────────┐    │
//! │  │ Discovery │──►│ Gates (per image)  │──►│ Hierarchical     │    │
//! │  │ image +   │   │ color · edge ·     │   │ Aggregator       │    │
//! │  │ facts     │   │ background ·       │   │ qa_total, veto   │    │
//! │  └───────────┘   │ constraints ·      │   └────────┬─────────┘    │
//! │                  │ perceptual oracle  │            ▼              │
//! │                  └────────────────────┘   ┌──────────────────┐    │
//! │                                           │ BatchReport      │    │
//! │                                           │ stats · markdown │    │
//! │                                           └──────────────────┘    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ghostqa::{BatchOrchestrator, QaConfig, QaEngine};
//! use std::path::Path;
//!
//! let engine = QaEngine::new(QaConfig::default())?;
//! let orchestrator = BatchOrchestrator::new(engine)?;
//! let report = orchestrator.validate_directory(
//!     Path::new("renders"),
//!     Path::new("facts"),
//!     None,
//!     None,
//! )?;
//! println!("pass rate {:.1}%", report.pass_rate * 100.0);
//! # Ok::<(), ghostqa::QaError>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod aggregator;
pub mod batch;
pub mod color;
pub mod config;
pub mod facts;
pub mod gates;
pub mod raster;
mod result;
pub mod verdict;

pub use aggregator::{
    color_fidelity, AggregateScore, ComponentScores, GateScores, HierarchicalAggregator,
    QualityTier, Recommendation,
};
pub use batch::{
    BatchOrchestrator, BatchReport, ImagePair, ItemError, ItemOutcome, ItemStatus,
    MetricStatistics, ReportFormat,
};
pub use color::{DeltaE, DeltaEFormula, DeltaEMethod, Lab, Rgb};
pub use config::{QaConfig, UnavailableSemantic};
pub use facts::GarmentFacts;
pub use gates::{
    FixedScoreOracle, GateKind, GateResult, GateStatus, OracleScore, PerceptualOracle,
    QualityGate, SidecarScoreOracle, UnavailableOracle,
};
pub use raster::RenderedImage;
pub use result::{ErrorKind, QaError, QaResult};
pub use verdict::{QaEngine, QaVerdict};
