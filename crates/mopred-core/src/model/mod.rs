//! Binary classifiers over feature batches.
//!
//! ```text
//!   Classifier ──────────── predict_proba / predict (pure)
//!     ├── RandomForest            fit once, immutable afterwards
//!     └── IncrementalClassifier   learn_one / learn_batch
//!           └── AdaptiveRandomForest (Hoeffding trees + ADWIN)
//! ```

pub mod arf;
pub mod forest;
pub mod hoeffding;

pub use arf::{AdaptiveRandomForest, ArfConfig, ArfStats};
pub use forest::{ForestConfig, RandomForest};
pub use hoeffding::{HoeffdingConfig, HoeffdingTree, LeafPrediction};

use crate::error::ModelError;
use crate::features::FeatureBatch;
use crate::metrics::DECISION_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Number of candidate features examined per split.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt().round() as usize,
            MaxFeatures::Log2 => n.log2().round() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

pub trait Classifier: Send {
    fn n_features(&self) -> usize;

    /// Probability of the positive class for one row.
    fn predict_proba_one(&self, x: &[f64]) -> f64;

    fn predict_proba(&self, batch: &FeatureBatch) -> Result<Vec<f64>, ModelError> {
        check_dim(self.n_features(), batch.dim)?;
        Ok(batch
            .rows
            .iter()
            .map(|x| self.predict_proba_one(x).clamp(0.0, 1.0))
            .collect())
    }

    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(batch)?
            .into_iter()
            .map(|p| (p > DECISION_THRESHOLD) as u8)
            .collect())
    }
}

pub trait IncrementalClassifier: Classifier {
    fn learn_one(&mut self, x: &[f64], y: u8);

    fn learn_batch(&mut self, batch: &FeatureBatch) -> Result<(), ModelError> {
        check_dim(self.n_features(), batch.dim)?;
        for (x, &y) in batch.rows.iter().zip(&batch.labels) {
            self.learn_one(x, y);
        }
        Ok(())
    }
}

pub(crate) fn check_dim(expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModelError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::features::FeatureBatch;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two well-separated blobs: label 1 iff the first coordinate is large.
    pub fn separable(n: usize, dim: usize, seed: u64) -> FeatureBatch {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut batch = FeatureBatch::with_dim(dim);
        for i in 0..n {
            let y = (i % 2) as u8;
            let centre = if y == 1 { 10.0 } else { 0.0 };
            let row = (0..dim)
                .map(|d| {
                    if d == 0 {
                        centre + rng.random_range(-1.0..1.0)
                    } else {
                        rng.random_range(-5.0..5.0)
                    }
                })
                .collect();
            batch.push(row, y);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(3), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(7), 3);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
        assert_eq!(MaxFeatures::Count(20).resolve(7), 7);
    }
}
