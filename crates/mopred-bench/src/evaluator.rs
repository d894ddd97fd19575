//! Prequential evaluation of a static and an incremental model.
//!
//! ```text
//!   window k pairs ──► FeatureBatch (basic | multimodal)
//!                           │
//!        ┌──────────────────┼───────────────────────┐
//!        ▼                  ▼                       │
//!   RandomForest      AdaptiveRandomForest          │
//!   (fit once)        (state after window k-1)      │
//!        │                  │                       ▼
//!        └──── scores ──────┘            ClassBalancer ──► learn_batch
//!                 ▼
//!           WindowMetrics ──► MetricRow × 2
//! ```
//!
//! Each pipeline moves through `Untrained → Ready`. The first window with a
//! non-empty batch is the warm-start window: the forest is fit on it, the
//! adaptive forest learns it, and both rows are null since nothing held out
//! has been predicted. Every later window is predicted first and learned
//! after, so the incremental score for window `k` only reflects windows
//! before `k`.

use crate::config::EvaluationConfig;
use crate::error::BenchError;
use crate::ledger::{MetricRow, ModelKind, ScoreTrace, Variant};
use mopred_core::model::ArfStats;
use mopred_core::{
    AdaptiveRandomForest, BalanceStrategy, ClassBalancer, Classifier, FeatureBatch,
    FeaturePair, FeatureSet, ForestConfig, IncrementalClassifier, ModelError, RandomForest,
    WindowMetrics,
};
use tracing::{debug, info, warn};

/// Rows and audit traces produced for one window.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    pub rows: Vec<MetricRow>,
    pub traces: Vec<ScoreTrace>,
}

enum StaticModel {
    Untrained,
    Ready(RandomForest),
}

/// One feature set's static/incremental pair.
pub struct VariantPipeline {
    set: FeatureSet,
    forest_config: ForestConfig,
    static_model: StaticModel,
    incremental: AdaptiveRandomForest,
    balancer: ClassBalancer,
    balance: bool,
    min_window_pairs: usize,
    seed: u64,
    warm_start_window: Option<usize>,
}

impl VariantPipeline {
    pub fn new(set: FeatureSet, config: &EvaluationConfig, seed: u64) -> Result<Self, BenchError> {
        let seed = pipeline_seed(seed, set);
        Ok(Self {
            set,
            forest_config: config.forest.clone(),
            static_model: StaticModel::Untrained,
            incremental: AdaptiveRandomForest::new(config.arf.clone(), set.dim(), seed)?,
            balancer: ClassBalancer::new(config.balancer.clone(), seed.rotate_left(17)),
            balance: config.balance_enabled(set),
            min_window_pairs: config.min_window_pairs,
            seed,
            warm_start_window: None,
        })
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.set
    }

    /// Window the static model was fit on, once it has been.
    pub fn warm_start_window(&self) -> Option<usize> {
        self.warm_start_window
    }

    pub fn incremental_stats(&self) -> ArfStats {
        self.incremental.stats()
    }

    pub fn process(&mut self, window: usize, pairs: &[FeaturePair]) -> PipelineOutput {
        let batch = FeatureBatch::from_pairs(pairs, self.set);

        if batch.is_empty() {
            debug!(window, set = %self.set, "Empty window, null rows");
            return self.null_output(window, &batch);
        }

        let forest = match &self.static_model {
            StaticModel::Untrained => {
                self.warm_start(window, &batch);
                return self.null_output(window, &batch);
            }
            StaticModel::Ready(forest) => forest,
        };

        let mut output = PipelineOutput::default();
        if batch.len() < self.min_window_pairs {
            debug!(
                window,
                set = %self.set,
                pairs = batch.len(),
                min = self.min_window_pairs,
                "Too few pairs to score"
            );
            output = self.null_output(window, &batch);
        } else {
            let scored = [
                (ModelKind::Static, forest.predict_proba(&batch)),
                (ModelKind::Incremental, self.incremental.predict_proba(&batch)),
            ];
            for (kind, scores) in scored {
                let variant = Variant::of(kind, self.set);
                output.push(window, variant, &batch, scores);
            }
        }

        self.learn(window, &batch);
        output
    }

    fn warm_start(&mut self, window: usize, batch: &FeatureBatch) {
        match RandomForest::fit(&self.forest_config, batch, self.seed) {
            Ok(forest) => {
                info!(
                    window,
                    set = %self.set,
                    samples = batch.len(),
                    positives = batch.n_positive(),
                    trees = forest.n_trees(),
                    "Static model fitted on warm-start window"
                );
                self.static_model = StaticModel::Ready(forest);
                self.warm_start_window = Some(window);
            }
            Err(e) => {
                warn!(window, set = %self.set, error = %e, "Static fit failed, retrying next window");
                return;
            }
        }
        self.learn(window, batch);
    }

    fn learn(&mut self, window: usize, batch: &FeatureBatch) {
        let result = if self.balance {
            let (balanced, strategy) = self.balancer.balance(batch);
            if strategy != BalanceStrategy::Unchanged {
                debug!(
                    window,
                    set = %self.set,
                    ?strategy,
                    before = ?batch.class_counts(),
                    after = ?balanced.class_counts(),
                    "Training batch rebalanced"
                );
            }
            self.incremental.learn_batch(&balanced)
        } else {
            self.incremental.learn_batch(batch)
        };
        if let Err(e) = result {
            warn!(window, set = %self.set, error = %e, "Incremental update skipped");
        }
    }

    fn null_output(&self, window: usize, batch: &FeatureBatch) -> PipelineOutput {
        let rows = [ModelKind::Static, ModelKind::Incremental]
            .into_iter()
            .map(|kind| {
                MetricRow::new(window, Variant::of(kind, self.set), WindowMetrics::null(&batch.labels))
            })
            .collect();
        PipelineOutput {
            rows,
            traces: Vec::new(),
        }
    }
}

impl PipelineOutput {
    fn push(
        &mut self,
        window: usize,
        variant: Variant,
        batch: &FeatureBatch,
        scores: Result<Vec<f64>, ModelError>,
    ) {
        match scores {
            Ok(y_score) => {
                self.rows.push(MetricRow::new(
                    window,
                    variant,
                    WindowMetrics::compute(&batch.labels, &y_score),
                ));
                self.traces.push(ScoreTrace {
                    window,
                    variant,
                    y_true: batch.labels.clone(),
                    y_score,
                });
            }
            Err(e) => {
                warn!(window, %variant, error = %e, "Prediction failed, null row");
                self.rows
                    .push(MetricRow::new(window, variant, WindowMetrics::null(&batch.labels)));
            }
        }
    }
}

fn pipeline_seed(seed: u64, set: FeatureSet) -> u64 {
    match set {
        FeatureSet::Basic => seed,
        FeatureSet::Multimodal => seed ^ 0x5DEE_CE66_D1CE_5EED,
    }
}
