//! Per-window classification metrics.
//!
//! Threshold metrics (accuracy, precision, recall, F1) are zero-division
//! safe. Ranking metrics (average precision, Brier) need scores and both
//! classes present; otherwise they are `None`.

use serde::{Deserialize, Serialize};

/// Scores strictly above this are predicted positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WindowMetrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub auprc: Option<f64>,
    pub brier: Option<f64>,
    pub n_samples: usize,
    pub n_positive: usize,
}

impl WindowMetrics {
    /// All-null metrics that still record sample counts.
    pub fn null(labels: &[u8]) -> Self {
        Self {
            n_samples: labels.len(),
            n_positive: labels.iter().filter(|&&y| y == 1).count(),
            ..Default::default()
        }
    }

    pub fn compute(y_true: &[u8], y_score: &[f64]) -> Self {
        debug_assert_eq!(y_true.len(), y_score.len());
        if y_true.is_empty() {
            return Self::default();
        }

        let (mut tp, mut fp, mut tn, mut fn_) = (0u64, 0u64, 0u64, 0u64);
        for (&y, &s) in y_true.iter().zip(y_score) {
            match (s > DECISION_THRESHOLD, y == 1) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }
        let (precision, recall, f1) = calculate_metrics(tp, fp, fn_);
        let n = y_true.len();
        let n_positive = (tp + fn_) as usize;
        let both_classes = n_positive > 0 && n_positive < n;

        Self {
            accuracy: Some((tp + tn) as f64 / n as f64),
            precision: Some(precision),
            recall: Some(recall),
            f1: Some(f1),
            auprc: both_classes.then(|| average_precision(y_true, y_score)),
            brier: both_classes.then(|| brier_score(y_true, y_score)),
            n_samples: n,
            n_positive,
        }
    }
}

/// Precision, recall and F1, each 0.0 when undefined.
pub fn calculate_metrics(tp: u64, fp: u64, fn_: u64) -> (f64, f64, f64) {
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Area under the precision-recall curve as a step-wise sum over
/// distinct score thresholds: `sum (R_n - R_{n-1}) * P_n`.
pub fn average_precision(y_true: &[u8], y_score: &[f64]) -> f64 {
    let total_pos = y_true.iter().filter(|&&y| y == 1).count();
    if total_pos == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));

    let (mut tp, mut seen) = (0usize, 0usize);
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut i = 0;
    while i < order.len() {
        // Ties share a threshold.
        let score = y_score[order[i]];
        while i < order.len() && y_score[order[i]] == score {
            tp += y_true[order[i]] as usize;
            seen += 1;
            i += 1;
        }
        let recall = tp as f64 / total_pos as f64;
        let precision = tp as f64 / seen as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    ap
}

pub fn brier_score(y_true: &[u8], y_score: &[f64]) -> f64 {
    let sum: f64 = y_true
        .iter()
        .zip(y_score)
        .map(|(&y, &s)| (s - y as f64).powi(2))
        .sum();
    sum / y_true.len() as f64
}
