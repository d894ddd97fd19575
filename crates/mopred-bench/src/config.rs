//! Experiment configuration.
//!
//! One JSON document drives a whole run:
//!
//! ```json
//! {
//!   "simulation": { "seed": 7, "fleet": { "total_entities": 500 } },
//!   "evaluation": { "window_hours": 2.0, "balance_multimodal": false },
//!   "output": { "dir": "results/run-7" }
//! }
//! ```
//!
//! Every section and field is optional and falls back to its default.

use crate::error::BenchError;
use mopred_core::error::ensure_range;
use mopred_core::{ArfConfig, BalancerConfig, ConfigError, ExtractorConfig, FeatureSet, ForestConfig};
use mopred_sim::{EventLogFormat, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub window_hours: f64,
    pub extractor: ExtractorConfig,
    pub balancer: BalancerConfig,
    /// Rebalance incremental training batches of the basic pipeline.
    pub balance_basic: bool,
    /// Rebalance incremental training batches of the multimodal pipeline.
    pub balance_multimodal: bool,
    pub forest: ForestConfig,
    pub arf: ArfConfig,
    /// Windows with fewer pairs produce null rows.
    pub min_window_pairs: usize,
    /// Model and balancer seed; defaults to the simulation seed.
    pub seed: Option<u64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            window_hours: 2.0,
            extractor: ExtractorConfig::default(),
            balancer: BalancerConfig::default(),
            balance_basic: true,
            balance_multimodal: true,
            forest: ForestConfig::default(),
            arf: ArfConfig::default(),
            min_window_pairs: 1,
            seed: None,
        }
    }
}

impl EvaluationConfig {
    pub fn window_ms(&self) -> i64 {
        (self.window_hours * MS_PER_HOUR).round() as i64
    }

    pub fn balance_enabled(&self, set: FeatureSet) -> bool {
        match set {
            FeatureSet::Basic => self.balance_basic,
            FeatureSet::Multimodal => self.balance_multimodal,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_range("window_hours", self.window_hours, 1.0 / 60.0, 24.0 * 365.0)?;
        self.extractor.validate()?;
        self.balancer.validate()?;
        self.forest.validate()?;
        self.arf.validate()?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write the generated event log.
    pub write_events: bool,
    pub event_format: EventLogFormat,
    /// Write per-window labels and scores for auditing.
    pub write_scores: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            write_events: false,
            event_format: EventLogFormat::Csv,
            write_scores: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    pub simulation: SimulationConfig,
    pub evaluation: EvaluationConfig,
    pub output: OutputConfig,
}

impl ExperimentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.evaluation.validate()
    }

    pub fn model_seed(&self) -> u64 {
        self.evaluation.seed.unwrap_or(self.simulation.seed)
    }
}
