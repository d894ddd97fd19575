//! Adaptive Random Forest.
//!
//! Online bagging ensemble of Hoeffding trees:
//! - Each member sees every sample `k ~ Poisson(lambda)` times
//! - Each leaf splits on a random feature subspace
//! - Per-member ADWIN monitors on the 0/1 error stream; a warning starts a
//!   background tree, a drift swaps it in (or a fresh tree if none)
//! - Votes are weighted by each member's running accuracy

use super::hoeffding::{HoeffdingConfig, HoeffdingTree, LeafPrediction};
use super::{Classifier, IncrementalClassifier, MaxFeatures};
use crate::algo::{Adwin, DriftState};
use crate::error::{ConfigError, ensure_range};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ArfConfig {
    pub n_models: usize,
    /// Poisson rate for online bagging.
    pub lambda: f64,
    pub max_features: MaxFeatures,
    pub grace_period: f64,
    pub split_confidence: f64,
    pub tie_threshold: f64,
    pub max_depth: usize,
    pub leaf_prediction: LeafPrediction,
    pub warning_delta: f64,
    pub drift_delta: f64,
    /// Capacity of each ADWIN monitor.
    pub detector_window: usize,
}

impl Default for ArfConfig {
    fn default() -> Self {
        Self {
            n_models: 10,
            lambda: 6.0,
            max_features: MaxFeatures::Sqrt,
            grace_period: 50.0,
            split_confidence: 0.01,
            tie_threshold: 0.05,
            max_depth: 20,
            leaf_prediction: LeafPrediction::NaiveBayesAdaptive,
            warning_delta: 0.01,
            drift_delta: 0.001,
            detector_window: 1000,
        }
    }
}

impl ArfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_models == 0 {
            return Err(ConfigError::invalid("arf.n_models", "must be at least 1"));
        }
        ensure_range("arf.lambda", self.lambda, 1e-6, 100.0)?;
        ensure_range("arf.grace_period", self.grace_period, 1.0, 1e9)?;
        ensure_range("arf.split_confidence", self.split_confidence, 1e-12, 1.0)?;
        ensure_range("arf.warning_delta", self.warning_delta, 1e-6, 1.0)?;
        ensure_range("arf.drift_delta", self.drift_delta, 1e-6, 1.0)?;
        Ok(())
    }

    fn tree_config(&self, n_features: usize) -> HoeffdingConfig {
        HoeffdingConfig {
            grace_period: self.grace_period,
            split_confidence: self.split_confidence,
            tie_threshold: self.tie_threshold,
            max_depth: self.max_depth,
            leaf_prediction: self.leaf_prediction,
            subspace_size: Some(self.max_features.resolve(n_features)),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArfStats {
    pub samples_seen: u64,
    pub warnings: u64,
    pub drifts: u64,
    pub background_trees: usize,
    pub leaves: usize,
}

#[derive(Clone, Debug)]
struct Member {
    tree: HoeffdingTree,
    background: Option<HoeffdingTree>,
    warning: Adwin,
    drift: Adwin,
    correct: f64,
    seen: f64,
}

impl Member {
    fn accuracy(&self) -> f64 {
        if self.seen > 0.0 {
            self.correct / self.seen
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdaptiveRandomForest {
    config: ArfConfig,
    tree_config: HoeffdingConfig,
    n_features: usize,
    members: Vec<Member>,
    poisson: Poisson<f64>,
    rng: StdRng,
    stats: ArfStats,
}

impl AdaptiveRandomForest {
    pub fn new(config: ArfConfig, n_features: usize, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let poisson = Poisson::new(config.lambda)
            .map_err(|e| ConfigError::invalid("arf.lambda", e.to_string()))?;
        let tree_config = config.tree_config(n_features);
        let mut rng = StdRng::seed_from_u64(seed);
        let members = (0..config.n_models)
            .map(|_| Member {
                tree: HoeffdingTree::new(tree_config.clone(), n_features, &mut rng),
                background: None,
                warning: Adwin::new(config.warning_delta, config.detector_window),
                drift: Adwin::new(config.drift_delta, config.detector_window),
                correct: 0.0,
                seen: 0.0,
            })
            .collect();

        Ok(Self {
            config,
            tree_config,
            n_features,
            members,
            poisson,
            rng,
            stats: ArfStats::default(),
        })
    }

    pub fn stats(&self) -> ArfStats {
        ArfStats {
            background_trees: self.members.iter().filter(|m| m.background.is_some()).count(),
            leaves: self.members.iter().map(|m| m.tree.n_leaves()).sum(),
            ..self.stats
        }
    }
}

impl Classifier for AdaptiveRandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba_one(&self, x: &[f64]) -> f64 {
        let (mut weighted, mut total_weight, mut plain) = (0.0, 0.0, 0.0);
        for m in &self.members {
            let p = m.tree.predict_proba_one(x);
            let w = m.accuracy();
            weighted += w * p;
            total_weight += w;
            plain += p;
        }
        let p = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            plain / self.members.len() as f64
        };
        p.clamp(0.0, 1.0)
    }
}

impl IncrementalClassifier for AdaptiveRandomForest {
    fn learn_one(&mut self, x: &[f64], y: u8) {
        self.stats.samples_seen += 1;
        for (i, member) in self.members.iter_mut().enumerate() {
            let correct = (member.tree.predict_proba_one(x) > 0.5) == (y == 1);
            member.seen += 1.0;
            if correct {
                member.correct += 1.0;
            }

            let k = self.poisson.sample(&mut self.rng);
            if k > 0.0 {
                member.tree.learn_one(x, y, k, &mut self.rng);
                if let Some(bg) = member.background.as_mut() {
                    bg.learn_one(x, y, k, &mut self.rng);
                }
            }

            let err = if correct { 0.0 } else { 1.0 };
            if member.warning.update(err) == DriftState::Drift {
                self.stats.warnings += 1;
                member.background = Some(HoeffdingTree::new(
                    self.tree_config.clone(),
                    self.n_features,
                    &mut self.rng,
                ));
            }
            if member.drift.update(err) == DriftState::Drift {
                self.stats.drifts += 1;
                debug!(member = i, "Drift detected, replacing tree");
                member.tree = match member.background.take() {
                    Some(bg) => bg,
                    None => HoeffdingTree::new(
                        self.tree_config.clone(),
                        self.n_features,
                        &mut self.rng,
                    ),
                };
                member.warning = Adwin::new(self.config.warning_delta, self.config.detector_window);
                member.correct = 0.0;
                member.seen = 0.0;
            }
        }
    }
}
