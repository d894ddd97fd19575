//! End-to-end experiment: simulate, window, extract, evaluate, record.

use crate::config::ExperimentConfig;
use crate::error::BenchError;
use crate::ledger::{LedgerSummary, MetricsLedger, ScoreTrace, write_score_traces};
use crate::worker::{DualModelEvaluator, PipelineSummary};
use chrono::{DateTime, Utc};
use mopred_core::{DetectionEvent, PairwiseFeatureExtractor};
use mopred_sim::{EventLogFormat, SimulationEngine, SimulationStats, write_events_to_path};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub const METRICS_CSV: &str = "metrics.csv";
pub const METRICS_JSONL: &str = "metrics.jsonl";
pub const SCORES_JSONL: &str = "scores.jsonl";
pub const REPORT_JSON: &str = "report.json";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub seed: u64,
    pub scenario: String,
    pub window_hours: f64,
    pub simulation: SimulationStats,
    pub windows: usize,
    pub pairs: usize,
    pub positive_pairs: usize,
    pub rows: usize,
    pub pipelines: Vec<PipelineSummary>,
    pub summary: LedgerSummary,
}

pub struct ExperimentOutcome {
    pub report: RunReport,
    pub ledger: MetricsLedger,
    pub traces: Vec<ScoreTrace>,
}

pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Runs in memory without touching the filesystem.
    pub fn run(&self) -> Result<ExperimentOutcome, BenchError> {
        self.run_with(|_| Ok(()))
    }

    /// Runs and writes every configured artifact to the output directory.
    pub fn run_and_export(&self) -> Result<ExperimentOutcome, BenchError> {
        let output = &self.config.output;
        std::fs::create_dir_all(&output.dir)?;

        let outcome = self.run_with(|events| {
            if output.write_events {
                let name = match output.event_format {
                    EventLogFormat::Csv => "events.csv",
                    EventLogFormat::JsonLines => "events.jsonl",
                };
                write_events_to_path(output.dir.join(name), events, output.event_format)?;
            }
            Ok(())
        })?;

        outcome.ledger.write_csv_to_path(output.dir.join(METRICS_CSV))?;
        outcome.ledger.write_json_lines_to_path(output.dir.join(METRICS_JSONL))?;
        if output.write_scores {
            write_score_traces(output.dir.join(SCORES_JSONL), &outcome.traces)?;
        }
        std::fs::write(
            output.dir.join(REPORT_JSON),
            serde_json::to_string_pretty(&outcome.report)?,
        )?;
        info!(dir = %output.dir.display(), run_id = %outcome.report.run_id, "Results written");
        Ok(outcome)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.config.output.dir.join(METRICS_CSV)
    }

    fn run_with(
        &self,
        on_events: impl FnOnce(&[DetectionEvent]) -> Result<(), BenchError>,
    ) -> Result<ExperimentOutcome, BenchError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = Uuid::new_v4();
        let eval = &self.config.evaluation;
        let seed = self.config.model_seed();

        info!(
            %run_id,
            seed,
            scenario = %self.config.simulation.drift.scenario,
            window_hours = eval.window_hours,
            "Experiment started"
        );

        let simulation = SimulationEngine::new(self.config.simulation.clone())?.run()?;
        on_events(&simulation.events)?;
        let sim_stats = simulation.stats.clone();

        let extractor = PairwiseFeatureExtractor::new(eval.extractor.clone());
        let evaluator = DualModelEvaluator::new(eval, seed)?;
        let mut ledger = MetricsLedger::new();
        let mut traces = Vec::new();
        let (mut windows, mut pairs_total, mut positives) = (0usize, 0usize, 0usize);

        for window in simulation.into_windows(eval.window_ms()) {
            let pairs = extractor.extract_window(&window.events);
            let n_pairs = pairs.len();
            let n_pos = pairs.iter().filter(|p| p.label == 1).count();
            debug!(
                window = window.index,
                events = window.len(),
                pairs = n_pairs,
                positives = n_pos,
                "Window extracted"
            );

            let out = evaluator.evaluate(window.index, pairs)?;
            ledger.extend(out.rows)?;
            traces.extend(out.traces);

            windows += 1;
            pairs_total += n_pairs;
            positives += n_pos;
        }
        let pipelines = evaluator.finish()?;

        let summary = ledger.summary();
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
            seed,
            scenario: self.config.simulation.drift.scenario.clone(),
            window_hours: eval.window_hours,
            simulation: sim_stats,
            windows,
            pairs: pairs_total,
            positive_pairs: positives,
            rows: ledger.len(),
            pipelines,
            summary,
        };
        info!(
            %run_id,
            windows,
            pairs = pairs_total,
            rows = report.rows,
            elapsed_ms = report.elapsed_ms,
            "Experiment finished"
        );
        Ok(ExperimentOutcome {
            report,
            ledger,
            traces,
        })
    }
}
