//! Hoeffding tree for binary streams.
//!
//! - Numeric attributes summarised per class by Gaussian estimators
//! - Split candidates evaluated at evenly spaced points between the
//!   observed min and max, scored by information gain
//! - A leaf splits once the gain advantage of the best candidate over the
//!   runner-up exceeds the Hoeffding bound, or the bound falls below the
//!   tie threshold
//! - Leaves predict by majority class or naive Bayes, whichever has been
//!   more accurate on the leaf's own stream (`NaiveBayesAdaptive`)

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

const MIN_BRANCH_FRACTION: f64 = 0.01;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeafPrediction {
    MajorityClass,
    NaiveBayes,
    NaiveBayesAdaptive,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HoeffdingConfig {
    /// Weight a leaf must see between split attempts.
    pub grace_period: f64,
    /// Allowed probability of choosing the wrong split.
    pub split_confidence: f64,
    pub tie_threshold: f64,
    pub max_depth: usize,
    pub n_split_points: usize,
    pub leaf_prediction: LeafPrediction,
    /// Features considered at each leaf; `None` means all.
    pub subspace_size: Option<usize>,
}

impl Default for HoeffdingConfig {
    fn default() -> Self {
        Self {
            grace_period: 200.0,
            split_confidence: 1e-7,
            tie_threshold: 0.05,
            max_depth: 20,
            n_split_points: 10,
            leaf_prediction: LeafPrediction::NaiveBayesAdaptive,
            subspace_size: None,
        }
    }
}

/// Weighted running mean and variance, with observed range.
#[derive(Clone, Debug, Default)]
pub(crate) struct GaussianEstimator {
    weight: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl GaussianEstimator {
    pub(crate) fn update(&mut self, x: f64, w: f64) {
        if self.weight == 0.0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        self.weight += w;
        let delta = x - self.mean;
        self.mean += w * delta / self.weight;
        self.m2 += w * delta * (x - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.weight > 1.0 {
            (self.m2 / (self.weight - 1.0)).max(0.0).sqrt()
        } else {
            0.0
        }
    }

    /// Fraction of this estimator's mass at or below `t`.
    fn cdf(&self, t: f64) -> f64 {
        let step = if t >= self.mean { 1.0 } else { 0.0 };
        let sd = self.std_dev();
        if sd < 1e-9 {
            return step;
        }
        Normal::new(self.mean, sd).map_or(step, |n| n.cdf(t))
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        let sd = self.std_dev().max(1e-3 * (1.0 + self.mean.abs()));
        Normal::new(self.mean, sd).map_or(f64::NEG_INFINITY, |n| n.ln_pdf(x))
    }
}

fn entropy(dist: [f64; 2]) -> f64 {
    let total = dist[0] + dist[1];
    if total <= 0.0 {
        return 0.0;
    }
    dist.iter()
        .filter(|&&w| w > 0.0)
        .map(|&w| {
            let p = w / total;
            -p * p.log2()
        })
        .sum()
}

#[derive(Clone, Debug)]
struct Leaf {
    class_weight: [f64; 2],
    /// One `[negative, positive]` estimator pair per feature.
    observers: Vec<[GaussianEstimator; 2]>,
    subspace: Vec<usize>,
    depth: usize,
    weight_at_last_eval: f64,
    mc_correct: f64,
    nb_correct: f64,
}

impl Leaf {
    fn new(class_weight: [f64; 2], n_features: usize, subspace: Vec<usize>, depth: usize) -> Self {
        Self {
            class_weight,
            observers: vec![Default::default(); n_features],
            subspace,
            depth,
            weight_at_last_eval: class_weight[0] + class_weight[1],
            mc_correct: 0.0,
            nb_correct: 0.0,
        }
    }

    fn total(&self) -> f64 {
        self.class_weight[0] + self.class_weight[1]
    }

    fn majority_proba(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.class_weight[1] / total
        } else {
            0.0
        }
    }

    fn naive_bayes_proba(&self, x: &[f64]) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let mut log_p = [f64::NEG_INFINITY; 2];
        for (c, lp) in log_p.iter_mut().enumerate() {
            if self.class_weight[c] <= 0.0 {
                continue;
            }
            *lp = (self.class_weight[c] / total).ln();
            for &f in &self.subspace {
                let est = &self.observers[f][c];
                if est.weight > 0.0 {
                    *lp += est.ln_pdf(x[f]);
                }
            }
        }
        if log_p[1] == f64::NEG_INFINITY {
            return 0.0;
        }
        if log_p[0] == f64::NEG_INFINITY {
            return 1.0;
        }
        // Two-class softmax.
        1.0 / (1.0 + (log_p[0] - log_p[1]).exp())
    }

    fn predict(&self, x: &[f64], mode: LeafPrediction) -> f64 {
        match mode {
            LeafPrediction::MajorityClass => self.majority_proba(),
            LeafPrediction::NaiveBayes => self.naive_bayes_proba(x),
            LeafPrediction::NaiveBayesAdaptive => {
                if self.nb_correct > self.mc_correct {
                    self.naive_bayes_proba(x)
                } else {
                    self.majority_proba()
                }
            }
        }
    }

    fn learn(&mut self, x: &[f64], y: u8, w: f64, mode: LeafPrediction) {
        if mode == LeafPrediction::NaiveBayesAdaptive && self.total() > 0.0 {
            let truth = y == 1;
            if (self.majority_proba() > 0.5) == truth {
                self.mc_correct += w;
            }
            if (self.naive_bayes_proba(x) > 0.5) == truth {
                self.nb_correct += w;
            }
        }
        let c = usize::from(y == 1);
        self.class_weight[c] += w;
        for &f in &self.subspace {
            self.observers[f][c].update(x[f], w);
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(Leaf),
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    merit: f64,
    left: [f64; 2],
    right: [f64; 2],
}

#[derive(Clone, Debug)]
pub struct HoeffdingTree {
    config: HoeffdingConfig,
    n_features: usize,
    nodes: Vec<Node>,
}

impl HoeffdingTree {
    pub fn new<R: Rng + ?Sized>(config: HoeffdingConfig, n_features: usize, rng: &mut R) -> Self {
        let mut tree = Self {
            config,
            n_features,
            nodes: Vec::new(),
        };
        let subspace = tree.draw_subspace(rng);
        tree.nodes.push(Node::Leaf(Leaf::new([0.0; 2], n_features, subspace, 0)));
        tree
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Leaf(l) => Some(l.depth),
                Node::Split { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn predict_proba_one(&self, x: &[f64]) -> f64 {
        match &self.nodes[self.sort(x)] {
            Node::Leaf(leaf) => leaf.predict(x, self.config.leaf_prediction),
            Node::Split { .. } => 0.0,
        }
    }

    pub fn learn_one<R: Rng + ?Sized>(&mut self, x: &[f64], y: u8, weight: f64, rng: &mut R) {
        let idx = self.sort(x);
        let grace = self.config.grace_period;
        let mode = self.config.leaf_prediction;
        let ready = match &mut self.nodes[idx] {
            Node::Leaf(leaf) => {
                leaf.learn(x, y, weight, mode);
                leaf.total() - leaf.weight_at_last_eval >= grace
            }
            Node::Split { .. } => false,
        };
        if ready {
            self.attempt_split(idx, rng);
        }
    }

    fn sort(&self, x: &[f64]) -> usize {
        let mut idx = 0;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
        } = &self.nodes[idx]
        {
            idx = if x[*feature] <= *threshold { *left } else { *right };
        }
        idx
    }

    fn draw_subspace<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let k = self
            .config
            .subspace_size
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features.max(1));
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut chosen = index::sample(rng, self.n_features, k).into_vec();
        chosen.sort_unstable();
        chosen
    }

    fn attempt_split<R: Rng + ?Sized>(&mut self, idx: usize, rng: &mut R) {
        let Node::Leaf(leaf) = &mut self.nodes[idx] else {
            return;
        };
        leaf.weight_at_last_eval = leaf.total();
        let leaf = &*leaf;
        let pure = leaf.class_weight.iter().any(|&w| w <= 0.0);
        if pure || leaf.depth >= self.config.max_depth {
            return;
        }

        let mut candidates: Vec<SplitCandidate> = leaf
            .subspace
            .iter()
            .filter_map(|&f| best_split_for(leaf, f, self.config.n_split_points))
            .collect();
        candidates.sort_by(|a, b| b.merit.total_cmp(&a.merit));

        let Some(best) = candidates.first() else {
            return;
        };
        let second = candidates.get(1).map_or(0.0, |c| c.merit);
        let n = leaf.total();
        let epsilon = ((1.0 / self.config.split_confidence).ln() / (2.0 * n)).sqrt();

        let accept = best.merit > 0.0
            && (best.merit - second > epsilon || epsilon < self.config.tie_threshold);
        if !accept {
            return;
        }

        let (feature, threshold, left_dist, right_dist) =
            (best.feature, best.threshold, best.left, best.right);
        let depth = leaf.depth + 1;

        let left_subspace = self.draw_subspace(rng);
        let right_subspace = self.draw_subspace(rng);
        let left = self.nodes.len();
        self.nodes
            .push(Node::Leaf(Leaf::new(left_dist, self.n_features, left_subspace, depth)));
        self.nodes
            .push(Node::Leaf(Leaf::new(right_dist, self.n_features, right_subspace, depth)));
        self.nodes[idx] = Node::Split {
            feature,
            threshold,
            left,
            right: left + 1,
        };
    }
}

fn best_split_for(leaf: &Leaf, feature: usize, n_points: usize) -> Option<SplitCandidate> {
    let [neg, pos] = &leaf.observers[feature];
    let observed: Vec<&GaussianEstimator> = [neg, pos].into_iter().filter(|e| e.weight > 0.0).collect();
    if observed.is_empty() {
        return None;
    }
    let lo = observed.iter().map(|e| e.min).fold(f64::INFINITY, f64::min);
    let hi = observed.iter().map(|e| e.max).fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return None;
    }

    let dist = [neg.weight, pos.weight];
    let total = dist[0] + dist[1];
    let parent = entropy(dist);
    let mut best: Option<SplitCandidate> = None;

    for k in 1..=n_points {
        let t = lo + (hi - lo) * k as f64 / (n_points + 1) as f64;
        let left = [neg.weight * neg.cdf(t), pos.weight * pos.cdf(t)];
        let right = [dist[0] - left[0], dist[1] - left[1]];
        let (wl, wr) = (left[0] + left[1], right[0] + right[1]);
        if wl.min(wr) / total < MIN_BRANCH_FRACTION {
            continue;
        }
        let merit = parent - (wl / total) * entropy(left) - (wr / total) * entropy(right);
        if best.as_ref().is_none_or(|b| merit > b.merit) {
            best = Some(SplitCandidate {
                feature,
                threshold: t,
                merit,
                left,
                right,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::separable;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn train(config: HoeffdingConfig, n: usize) -> HoeffdingTree {
        let mut rng = StdRng::seed_from_u64(3);
        let data = separable(n, 3, 11);
        let mut tree = HoeffdingTree::new(config, 3, &mut rng);
        for (x, &y) in data.rows.iter().zip(&data.labels) {
            tree.learn_one(x, y, 1.0, &mut rng);
        }
        tree
    }

    #[test]
    fn test_gaussian_estimator_moments() {
        let mut est = GaussianEstimator::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            est.update(x, 1.0);
        }
        assert!((est.mean - 5.0).abs() < 1e-12);
        assert!((est.std_dev() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!((est.min, est.max), (2.0, 9.0));
        assert!((est.cdf(5.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy([0.0, 0.0]), 0.0);
        assert_eq!(entropy([5.0, 0.0]), 0.0);
        assert!((entropy([3.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_splits_on_separable_stream() {
        let tree = train(HoeffdingConfig::default(), 2000);
        assert!(tree.n_leaves() >= 2);
        assert!(tree.predict_proba_one(&[10.0, 0.0, 0.0]) > 0.5);
        assert!(tree.predict_proba_one(&[0.0, 0.0, 0.0]) < 0.5);
    }

    #[test]
    fn test_no_split_before_grace_period() {
        let tree = train(
            HoeffdingConfig {
                grace_period: 1000.0,
                ..Default::default()
            },
            500,
        );
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let tree = train(
            HoeffdingConfig {
                grace_period: 20.0,
                tie_threshold: 1.0,
                max_depth: 2,
                ..Default::default()
            },
            3000,
        );
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_empty_tree_predicts_negative() {
        let mut rng = StdRng::seed_from_u64(0);
        let tree = HoeffdingTree::new(HoeffdingConfig::default(), 3, &mut rng);
        assert_eq!(tree.predict_proba_one(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_naive_bayes_leaf_separates_without_split() {
        let tree = train(
            HoeffdingConfig {
                grace_period: 1e9,
                leaf_prediction: LeafPrediction::NaiveBayes,
                ..Default::default()
            },
            400,
        );
        assert_eq!(tree.n_leaves(), 1);
        assert!(tree.predict_proba_one(&[10.0, 0.0, 0.0]) > 0.9);
        assert!(tree.predict_proba_one(&[0.0, 0.0, 0.0]) < 0.1);
    }

    #[test]
    fn test_subspace_size() {
        let mut rng = StdRng::seed_from_u64(5);
        let tree = HoeffdingTree::new(
            HoeffdingConfig {
                subspace_size: Some(2),
                ..Default::default()
            },
            7,
            &mut rng,
        );
        let Node::Leaf(root) = &tree.nodes[0] else {
            panic!("root should be a leaf");
        };
        assert_eq!(root.subspace.len(), 2);
        assert!(root.subspace.iter().all(|&f| f < 7));
    }
}
