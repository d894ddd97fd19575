//! Batch random forest of weighted-Gini CART trees.
//!
//! Fitting consumes a batch and returns an immutable model; there is no
//! way to refit a `RandomForest` in place.

use super::{Classifier, MaxFeatures, check_dim};
use crate::error::{ConfigError, ModelError};
use crate::features::FeatureBatch;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Reweight classes inversely to their frequency.
    pub class_weight_balanced: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight_balanced: true,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::invalid("forest.n_trees", "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::invalid(
                "forest.min_samples_split",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum TreeNode {
    Leaf {
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

struct TreeBuilder<'a> {
    data: &'a FeatureBatch,
    config: &'a ForestConfig,
    mtry: usize,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Grows a subtree over `(row, weight)` samples; returns its node index.
    fn grow(&mut self, samples: &mut [(usize, f64)], depth: usize, rng: &mut StdRng) -> usize {
        let dist = class_weights(self.data, samples);
        let total = dist[0] + dist[1];
        let proba = if total > 0.0 { dist[1] / total } else { 0.0 };

        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { proba });

        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || samples.len() < self.config.min_samples_split
            || dist[0] <= 0.0
            || dist[1] <= 0.0
        {
            return idx;
        }

        let Some((feature, threshold)) = self.best_split(samples, dist, rng) else {
            return idx;
        };

        let mid = partition(samples, |&(row, _)| self.data.rows[row][feature] <= threshold);
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);
        self.nodes[idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    /// Examines `mtry` random features, continuing past them only while no
    /// valid split has been found.
    fn best_split(
        &self,
        samples: &mut [(usize, f64)],
        parent: [f64; 2],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..self.data.dim).collect();
        features.shuffle(rng);

        let total = parent[0] + parent[1];
        let parent_impurity = gini(parent) * total;
        let mut best: Option<(f64, usize, f64)> = None;

        for (visited, &f) in features.iter().enumerate() {
            if visited >= self.mtry && best.is_some() {
                break;
            }
            samples.sort_by(|a, b| self.data.rows[a.0][f].total_cmp(&self.data.rows[b.0][f]));
            let mut left = [0.0; 2];
            for i in 0..samples.len() - 1 {
                let (row, w) = samples[i];
                left[self.data.labels[row] as usize] += w;
                let x = self.data.rows[row][f];
                let next = self.data.rows[samples[i + 1].0][f];
                if next <= x {
                    continue;
                }
                let right = [parent[0] - left[0], parent[1] - left[1]];
                let impurity =
                    gini(left) * (left[0] + left[1]) + gini(right) * (right[0] + right[1]);
                if impurity < parent_impurity - 1e-12
                    && best.is_none_or(|(b, _, _)| impurity < b)
                {
                    best = Some((impurity, f, x + (next - x) / 2.0));
                }
            }
        }
        best.map(|(_, f, t)| (f, t))
    }
}

impl DecisionTree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { proba } => return *proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

fn gini(dist: [f64; 2]) -> f64 {
    let total = dist[0] + dist[1];
    if total <= 0.0 {
        return 0.0;
    }
    let p = dist[1] / total;
    2.0 * p * (1.0 - p)
}

fn class_weights(data: &FeatureBatch, samples: &[(usize, f64)]) -> [f64; 2] {
    let mut dist = [0.0; 2];
    for &(row, w) in samples {
        dist[data.labels[row] as usize] += w;
    }
    dist
}

/// In-place partition; returns the count of elements satisfying `pred`.
fn partition<T, F: Fn(&T) -> bool>(items: &mut [T], pred: F) -> usize {
    let mut mid = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[derive(Clone, Debug)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(config: &ForestConfig, batch: &FeatureBatch, seed: u64) -> Result<Self, ModelError> {
        if batch.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        for row in &batch.rows {
            check_dim(batch.dim, row.len())?;
        }

        let [neg, pos] = batch.class_counts();
        let n = batch.len() as f64;
        let class_weight = if config.class_weight_balanced {
            [
                if neg > 0 { n / (2.0 * neg as f64) } else { 0.0 },
                if pos > 0 { n / (2.0 * pos as f64) } else { 0.0 },
            ]
        } else {
            [1.0, 1.0]
        };
        let mtry = config.max_features.resolve(batch.dim);

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed ^ (t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                let mut counts = vec![0u32; batch.len()];
                if config.bootstrap {
                    for _ in 0..batch.len() {
                        counts[rng.random_range(0..batch.len())] += 1;
                    }
                } else {
                    counts.fill(1);
                }
                let mut samples: Vec<(usize, f64)> = counts
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c > 0)
                    .map(|(row, &c)| (row, c as f64 * class_weight[batch.labels[row] as usize]))
                    .collect();

                let mut builder = TreeBuilder {
                    data: batch,
                    config,
                    mtry,
                    nodes: Vec::new(),
                };
                builder.grow(&mut samples, 0, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        debug!(
            trees = trees.len(),
            samples = batch.len(),
            positives = pos,
            "Random forest fitted"
        );
        Ok(Self {
            trees,
            n_features: batch.dim,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba_one(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        sum / self.trees.len() as f64
    }
}
