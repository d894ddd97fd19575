//! # mopred-bench - Static vs Incremental Prequential Benchmark
//!
//! Drives a simulated detection stream through two model families and
//! records per-window metrics:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           mopred-bench                               │
//! │                                                                      │
//! │  ExperimentConfig ──► SimulationEngine ──► TemporalWindower          │
//! │                                                  │                   │
//! │                                     PairwiseFeatureExtractor         │
//! │                                                  │                   │
//! │                                      DualModelEvaluator              │
//! │                              ┌───────────────────┴──────────┐        │
//! │                              ▼                              ▼        │
//! │                   [basic pipeline thread]     [multimodal pipeline]  │
//! │                    static + incremental        static + incremental  │
//! │                              └───────────────────┬──────────┘        │
//! │                                                  ▼                   │
//! │                                           MetricsLedger              │
//! │                                   metrics.csv / metrics.jsonl        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Four variants are reported per window: `static`, `static_multimodal`,
//! `incremental` and `incremental_multimodal`.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod runner;
pub mod worker;

pub use config::{EvaluationConfig, ExperimentConfig, OutputConfig};
pub use error::{BenchError, LedgerError};
pub use evaluator::{PipelineOutput, VariantPipeline};
pub use ledger::{
    LedgerSummary, METRICS_CSV_HEADER, MetricRow, MetricsLedger, ModelKind, ScoreTrace, Variant,
};
pub use runner::{ExperimentOutcome, ExperimentRunner, RunReport};
pub use worker::{DualModelEvaluator, PipelineSummary};
