//! Class-imbalance correction for incremental training batches.
//!
//! Strategy, in order:
//! 1. Batch already balanced enough (`majority / minority <= threshold`) or
//!    single-class: returned unchanged
//! 2. Batch + rolling history has `k + 1` minority samples: SMOTE-style
//!    interpolation between minority neighbours until the classes are equal
//! 3. Otherwise: duplicate the batch's minority samples with replacement
//!
//! History is bucketed by feature dimensionality, so batches of different
//! feature sets never mix.

use crate::error::{ConfigError, ensure_range};
use crate::features::{FeatureBatch, FeatureVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Majority/minority ratio above which the batch is rebalanced.
    pub imbalance_threshold: f64,
    /// Neighbours considered for interpolation.
    pub k_neighbors: usize,
    /// Batches retained per dimensionality bucket.
    pub history_depth: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: 2.0,
            k_neighbors: 3,
            history_depth: 5,
        }
    }
}

impl BalancerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_range("imbalance_threshold", self.imbalance_threshold, 1.0, 1e9)?;
        if self.k_neighbors == 0 {
            return Err(ConfigError::invalid("k_neighbors", "must be at least 1"));
        }
        Ok(())
    }
}

/// How a batch was rebalanced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStrategy {
    Unchanged,
    Interpolated { synthesized: usize },
    Duplicated { duplicated: usize },
}

#[derive(Debug)]
pub struct ClassBalancer {
    config: BalancerConfig,
    history: HashMap<usize, VecDeque<FeatureBatch>>,
    rng: StdRng,
}

impl ClassBalancer {
    pub fn new(config: BalancerConfig, seed: u64) -> Self {
        Self {
            config,
            history: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Balances `batch`, then records the raw batch in its history bucket.
    pub fn balance(&mut self, batch: &FeatureBatch) -> (FeatureBatch, BalanceStrategy) {
        let result = self.rebalance(batch);
        self.remember(batch);
        result
    }

    /// Number of batches held for a dimensionality.
    pub fn history_len(&self, dim: usize) -> usize {
        self.history.get(&dim).map_or(0, VecDeque::len)
    }

    fn rebalance(&mut self, batch: &FeatureBatch) -> (FeatureBatch, BalanceStrategy) {
        let [neg, pos] = batch.class_counts();
        if neg == 0 || pos == 0 {
            return (batch.clone(), BalanceStrategy::Unchanged);
        }
        let ratio = neg.max(pos) as f64 / neg.min(pos) as f64;
        if ratio <= self.config.imbalance_threshold {
            return (batch.clone(), BalanceStrategy::Unchanged);
        }

        let combined = self.combined_with_history(batch);
        let [c_neg, c_pos] = combined.class_counts();
        if c_neg.min(c_pos) > self.config.k_neighbors {
            let synthesized = c_neg.abs_diff(c_pos);
            let minority = if c_pos < c_neg { 1 } else { 0 };
            let out = self.interpolate(combined, minority, synthesized);
            debug!(ratio, synthesized, "Minority interpolation applied");
            return (out, BalanceStrategy::Interpolated { synthesized });
        }

        let duplicated = neg.abs_diff(pos);
        let minority = if pos < neg { 1 } else { 0 };
        let out = self.duplicate(batch, minority, duplicated);
        debug!(ratio, duplicated, "Too few minority samples, duplicating instead");
        (out, BalanceStrategy::Duplicated { duplicated })
    }

    fn combined_with_history(&self, batch: &FeatureBatch) -> FeatureBatch {
        let mut combined = batch.clone();
        if let Some(bucket) = self.history.get(&batch.dim) {
            for past in bucket {
                combined.rows.extend(past.rows.iter().cloned());
                combined.labels.extend_from_slice(&past.labels);
            }
        }
        combined
    }

    fn interpolate(&mut self, mut set: FeatureBatch, minority: u8, count: usize) -> FeatureBatch {
        let pool: Vec<FeatureVector> = set
            .rows
            .iter()
            .zip(&set.labels)
            .filter(|&(_, &y)| y == minority)
            .map(|(r, _)| r.clone())
            .collect();
        let k = self.config.k_neighbors.min(pool.len() - 1);

        for _ in 0..count {
            let i = self.rng.random_range(0..pool.len());
            let neighbours = nearest(&pool, i, k);
            let j = neighbours[self.rng.random_range(0..neighbours.len())];
            let u: f64 = self.rng.random();
            let synthetic: FeatureVector = pool[i]
                .iter()
                .zip(&pool[j])
                .map(|(a, b)| a + u * (b - a))
                .collect();
            set.push(synthetic, minority);
        }
        set
    }

    fn duplicate(&mut self, batch: &FeatureBatch, minority: u8, count: usize) -> FeatureBatch {
        let idx: Vec<usize> = (0..batch.len())
            .filter(|&i| batch.labels[i] == minority)
            .collect();
        let mut out = batch.clone();
        for _ in 0..count {
            let pick = idx[self.rng.random_range(0..idx.len())];
            out.push(batch.rows[pick].clone(), minority);
        }
        out
    }

    fn remember(&mut self, batch: &FeatureBatch) {
        if batch.is_empty() || self.config.history_depth == 0 {
            return;
        }
        let bucket = self.history.entry(batch.dim).or_default();
        bucket.push_back(batch.clone());
        while bucket.len() > self.config.history_depth {
            bucket.pop_front();
        }
    }
}

/// Indices of the `k` nearest points to `pool[i]`, excluding `i` itself.
fn nearest(pool: &[FeatureVector], i: usize, k: usize) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = pool
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(j, row)| (squared_distance(&pool[i], row), j))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k.max(1)).map(|(_, j)| j).collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    fn batch(neg: usize, pos: usize, dim: usize) -> FeatureBatch {
        let mut b = FeatureBatch::with_dim(dim);
        for i in 0..neg {
            b.push((0..dim).map(|d| (i + d) as f64).collect(), 0);
        }
        for i in 0..pos {
            b.push((0..dim).map(|d| 1000.0 + (i * 3 + d) as f64).collect(), 1);
        }
        b
    }

    fn balancer() -> ClassBalancer {
        ClassBalancer::new(BalancerConfig::default(), 7)
    }

    #[test]
    fn test_noop_when_ratio_within_threshold() {
        let input = batch(10, 5, 3);
        let (out, strategy) = balancer().balance(&input);
        assert_eq!(strategy, BalanceStrategy::Unchanged);
        assert_eq!(out, input);
    }

    #[test]
    fn test_noop_on_single_class() {
        let input = batch(12, 0, 3);
        let (out, strategy) = balancer().balance(&input);
        assert_eq!(strategy, BalanceStrategy::Unchanged);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn test_falls_back_to_duplication_with_lone_minority() {
        let input = batch(19, 1, 3);
        let (out, strategy) = balancer().balance(&input);
        assert_eq!(strategy, BalanceStrategy::Duplicated { duplicated: 18 });
        assert_eq!(out.class_counts(), [19, 19]);
        let positives: Vec<_> = out
            .rows
            .iter()
            .zip(&out.labels)
            .filter(|&(_, &y)| y == 1)
            .collect();
        assert!(positives.iter().all(|(r, _)| **r == input.rows[19]));
    }

    #[test]
    fn test_interpolation_balances_exactly() {
        let input = batch(40, 5, 3);
        let (out, strategy) = balancer().balance(&input);
        assert_eq!(strategy, BalanceStrategy::Interpolated { synthesized: 35 });
        let [neg, pos] = out.class_counts();
        assert_eq!(neg, pos);
    }

    #[test]
    fn test_synthetic_points_stay_inside_minority_hull() {
        let input = batch(40, 5, 2);
        let (out, _) = balancer().balance(&input);
        for (row, &y) in out.rows.iter().zip(&out.labels) {
            if y == 1 {
                assert!(row.iter().all(|&v| (1000.0..=1013.0).contains(&v)), "{row:?}");
            }
        }
    }

    #[test]
    fn test_history_enables_interpolation() {
        let mut b = balancer();
        // Two minority samples per batch: not enough alone for k = 3.
        let (_, first) = b.balance(&batch(20, 2, 3));
        assert_eq!(first, BalanceStrategy::Duplicated { duplicated: 18 });
        let (out, second) = b.balance(&batch(20, 2, 3));
        assert!(matches!(second, BalanceStrategy::Interpolated { .. }));
        assert_eq!(out.len(), 80);
    }

    #[test]
    fn test_history_is_bucketed_and_bounded() {
        let mut b = ClassBalancer::new(
            BalancerConfig {
                history_depth: 2,
                ..Default::default()
            },
            1,
        );
        for _ in 0..4 {
            b.balance(&batch(3, 3, 3));
        }
        b.balance(&batch(3, 3, 7));
        assert_eq!(b.history_len(3), 2);
        assert_eq!(b.history_len(7), 1);
    }

    #[test]
    fn test_other_dimension_history_is_ignored() {
        let mut b = balancer();
        b.balance(&batch(5, 5, 7));
        b.balance(&batch(5, 5, 7));
        let (_, strategy) = b.balance(&batch(20, 2, 3));
        assert!(matches!(strategy, BalanceStrategy::Duplicated { .. }));
    }

    #[test]
    fn test_same_seed_same_output() {
        let input = batch(30, 6, 3);
        let (a, _) = ClassBalancer::new(BalancerConfig::default(), 99).balance(&input);
        let (b, _) = ClassBalancer::new(BalancerConfig::default(), 99).balance(&input);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearest_excludes_self() {
        let pool: Vec<FeatureVector> = vec![smallvec![0.0], smallvec![1.0], smallvec![5.0]];
        assert_eq!(nearest(&pool, 0, 1), vec![1]);
        assert_eq!(nearest(&pool, 2, 2), vec![1, 0]);
    }

    proptest! {
        #[test]
        fn prop_balanced_output_respects_threshold(
            batches in prop::collection::vec((0usize..60, 0usize..60), 1..8),
            threshold in 1.0f64..5.0,
            k_neighbors in 1usize..5,
            history_depth in 0usize..6,
            seed in any::<u64>(),
        ) {
            let config = BalancerConfig { imbalance_threshold: threshold, k_neighbors, history_depth };
            let mut b = ClassBalancer::new(config, seed);
            for (neg, pos) in batches {
                let input = batch(neg, pos, 3);
                let (out, strategy) = b.balance(&input);
                let [out_neg, out_pos] = out.class_counts();

                let skewed = neg > 0 && pos > 0 && neg.max(pos) as f64 / neg.min(pos) as f64 > threshold;
                if skewed {
                    prop_assert_ne!(strategy, BalanceStrategy::Unchanged);
                    prop_assert!(out_neg.max(out_pos) as f64 / out_neg.min(out_pos) as f64 <= threshold);
                } else {
                    prop_assert_eq!(strategy, BalanceStrategy::Unchanged);
                    prop_assert_eq!(&out, &input);
                }
                prop_assert!(out_neg >= neg && out_pos >= pos);
                prop_assert!(out.rows.iter().all(|r| r.len() == 3));
                prop_assert!(b.history_len(3) <= history_depth);
            }
        }
    }
}
