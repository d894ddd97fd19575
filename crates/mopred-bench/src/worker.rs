//! Pipeline worker threads.
//!
//! Each feature-set pipeline is owned by one thread and receives windows
//! over a bounded channel, so exactly one writer ever touches a model:
//!
//! ```text
//!                     ┌──► [mopred-basic]      ──┐
//!   evaluate(k) ──────┤                          ├──► rows for window k
//!                     └──► [mopred-multimodal] ──┘
//! ```
//!
//! `evaluate` blocks until both pipelines answer, which keeps windows
//! strictly sequential per model.

use crate::config::EvaluationConfig;
use crate::error::BenchError;
use crate::evaluator::{PipelineOutput, VariantPipeline};
use crossbeam_channel::{Receiver, Sender, bounded};
use mopred_core::model::ArfStats;
use mopred_core::{FeaturePair, FeatureSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

struct WindowJob {
    index: usize,
    pairs: Arc<Vec<FeaturePair>>,
}

/// Final state of one pipeline's adaptive model.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PipelineSummary {
    pub feature_set: FeatureSet,
    pub warm_start_window: Option<usize>,
    pub incremental: ArfStats,
}

struct PipelineWorker {
    pipeline: VariantPipeline,
    rx: Receiver<WindowJob>,
    tx: Sender<PipelineOutput>,
}

impl PipelineWorker {
    fn spawn(
        pipeline: VariantPipeline,
        rx: Receiver<WindowJob>,
        tx: Sender<PipelineOutput>,
    ) -> std::io::Result<thread::JoinHandle<PipelineSummary>> {
        let set = pipeline.feature_set();
        thread::Builder::new()
            .name(format!("mopred-{set}"))
            .spawn(move || {
                let mut worker = PipelineWorker { pipeline, rx, tx };
                worker.run();
                info!(set = %set, "Pipeline worker stopped.");
                PipelineSummary {
                    feature_set: set,
                    warm_start_window: worker.pipeline.warm_start_window(),
                    incremental: worker.pipeline.incremental_stats(),
                }
            })
    }

    fn run(&mut self) {
        debug!(set = %self.pipeline.feature_set(), "Pipeline worker active.");
        while let Ok(job) = self.rx.recv() {
            let output = self.pipeline.process(job.index, &job.pairs);
            if self.tx.send(output).is_err() {
                break;
            }
        }
    }
}

struct WorkerHandle {
    set: FeatureSet,
    jobs: Sender<WindowJob>,
    results: Receiver<PipelineOutput>,
    thread: thread::JoinHandle<PipelineSummary>,
}

/// Runs the basic and multimodal pipelines side by side.
pub struct DualModelEvaluator {
    workers: Vec<WorkerHandle>,
}

impl DualModelEvaluator {
    pub fn new(config: &EvaluationConfig, seed: u64) -> Result<Self, BenchError> {
        let mut workers = Vec::with_capacity(FeatureSet::ALL.len());
        for set in FeatureSet::ALL {
            let pipeline = VariantPipeline::new(set, config, seed)?;
            let (job_tx, job_rx) = bounded::<WindowJob>(1);
            let (out_tx, out_rx) = bounded::<PipelineOutput>(1);
            let thread = PipelineWorker::spawn(pipeline, job_rx, out_tx).map_err(BenchError::Spawn)?;
            workers.push(WorkerHandle {
                set,
                jobs: job_tx,
                results: out_rx,
                thread,
            });
        }
        Ok(Self { workers })
    }

    /// Scores and learns one window in every pipeline.
    ///
    /// Returns exactly four rows, in variant order.
    pub fn evaluate(&self, index: usize, pairs: Vec<FeaturePair>) -> Result<PipelineOutput, BenchError> {
        let pairs = Arc::new(pairs);
        for w in &self.workers {
            w.jobs
                .send(WindowJob {
                    index,
                    pairs: Arc::clone(&pairs),
                })
                .map_err(|_| BenchError::WorkerGone(w.set.to_string()))?;
        }

        let mut combined = PipelineOutput::default();
        for w in &self.workers {
            let out = w
                .results
                .recv()
                .map_err(|_| BenchError::WorkerGone(w.set.to_string()))?;
            combined.rows.extend(out.rows);
            combined.traces.extend(out.traces);
        }
        combined.rows.sort_by_key(|r| r.variant);
        combined.traces.sort_by_key(|t| t.variant);
        Ok(combined)
    }

    /// Closes the channels and joins the workers.
    pub fn finish(self) -> Result<Vec<PipelineSummary>, BenchError> {
        self.workers
            .into_iter()
            .map(|w| {
                let WorkerHandle { set, jobs, thread, .. } = w;
                drop(jobs);
                thread
                    .join()
                    .map_err(|_| BenchError::WorkerGone(set.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Variant;
    use mopred_core::{ArfConfig, ForestConfig, PairMetadata};

    fn pairs(n: usize) -> Vec<FeaturePair> {
        (0..n)
            .map(|i| {
                let label = (i % 3 == 0) as u8;
                let (d, t) = if label == 1 { (90.0, 100.0) } else { (4.0, 2400.0) };
                FeaturePair {
                    distance_km: d + (i % 5) as f64,
                    elapsed_seconds: t + (i % 7) as f64,
                    implied_speed_kmh: d / (t / 3600.0),
                    infraction_count: 2,
                    brand_model_equal: true,
                    type_equal: true,
                    color_equal: label == 0,
                    label,
                    meta: PairMetadata {
                        entity_id: format!("P{i}"),
                        sensor_a: "A".to_string(),
                        sensor_b: "B".to_string(),
                        ts_a: 0,
                        ts_b: 1,
                        ground_truth: false,
                    },
                }
            })
            .collect()
    }

    fn config() -> EvaluationConfig {
        EvaluationConfig {
            forest: ForestConfig {
                n_trees: 10,
                ..Default::default()
            },
            arf: ArfConfig {
                n_models: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_four_rows_per_window_in_variant_order() {
        let evaluator = DualModelEvaluator::new(&config(), 11).unwrap();
        for index in 0..3 {
            let out = evaluator.evaluate(index, pairs(30)).unwrap();
            let variants: Vec<Variant> = out.rows.iter().map(|r| r.variant).collect();
            assert_eq!(variants, Variant::ALL.to_vec());
            assert!(out.rows.iter().all(|r| r.window == index));
            if index == 0 {
                assert!(out.traces.is_empty());
            } else {
                assert_eq!(out.traces.len(), 4);
            }
        }
        let summaries = evaluator.finish().unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.warm_start_window == Some(0)));
        assert!(summaries.iter().all(|s| s.incremental.samples_seen >= 30));
    }

    #[test]
    fn test_empty_windows_still_produce_rows() {
        let evaluator = DualModelEvaluator::new(&config(), 12).unwrap();
        let out = evaluator.evaluate(0, Vec::new()).unwrap();
        assert_eq!(out.rows.len(), 4);
        assert!(out.rows.iter().all(|r| r.metrics.n_samples == 0 && r.metrics.f1.is_none()));
        let summaries = evaluator.finish().unwrap();
        assert!(summaries.iter().all(|s| s.warm_start_window.is_none()));
    }
}
