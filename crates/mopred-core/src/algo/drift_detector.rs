//! Concept Drift Detector
//!
//! Two-window ADWIN test over a bounded stream of values (here: a tree's
//! 0/1 prediction errors). The older half of the window is the reference,
//! the newer half is compared against it; when their means differ by more
//! than the Hoeffding-style cut `epsilon`, drift is signalled and both
//! halves are cleared.
//!
//! ```text
//!   ┌──────── reference ────────┬──────── recent ────────┐
//!   │ oldest ...                │              ... newest│ ◄── push
//!   └───────────────────────────┴────────────────────────┘
//!           |mean_ref - mean_recent| > epsilon  ⇒  Drift
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftState {
    Stable,
    Drift,
}

/// Running sum and sum of squares of a sub-window.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct Moments {
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn add(&mut self, v: f64) {
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn remove(&mut self, v: f64) {
        self.sum -= v;
        self.sum_sq -= v * v;
    }

    fn mean_var(&self, n: f64) -> (f64, f64) {
        let mean = self.sum / n;
        (mean, (self.sum_sq / n - mean * mean).max(0.0))
    }
}

/// ADWIN (Adaptive Windowing) change detector.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adwin {
    reference: VecDeque<f64>,
    recent: VecDeque<f64>,
    reference_moments: Moments,
    recent_moments: Moments,
    /// Total capacity, split evenly between the halves.
    capacity: usize,
    /// Both halves need this many values before testing.
    min_sub_window: usize,
    delta: f64,
    detections: u64,
}

impl Adwin {
    pub fn new(delta: f64, capacity: usize) -> Self {
        let capacity = capacity.max(100);
        Self {
            reference: VecDeque::with_capacity(capacity / 2 + 1),
            recent: VecDeque::with_capacity(capacity / 2 + 1),
            reference_moments: Moments::default(),
            recent_moments: Moments::default(),
            capacity,
            min_sub_window: 30,
            delta: delta.clamp(0.001, 0.1),
            detections: 0,
        }
    }

    /// Pushes a value and tests for a change in mean.
    pub fn update(&mut self, value: f64) -> DriftState {
        self.recent.push_back(value);
        self.recent_moments.add(value);

        let half = self.capacity / 2;
        if self.recent.len() > half {
            if let Some(moved) = self.recent.pop_front() {
                self.recent_moments.remove(moved);
                self.reference.push_back(moved);
                self.reference_moments.add(moved);
            }
            if self.reference.len() > half {
                if let Some(dropped) = self.reference.pop_front() {
                    self.reference_moments.remove(dropped);
                }
            }
        }

        if self.reference.len() < self.min_sub_window || self.recent.len() < self.min_sub_window {
            return DriftState::Stable;
        }

        let n_ref = self.reference.len() as f64;
        let n_rec = self.recent.len() as f64;
        let (mean_ref, var_ref) = self.reference_moments.mean_var(n_ref);
        let (mean_rec, var_rec) = self.recent_moments.mean_var(n_rec);
        let variance = ((n_ref * var_ref + n_rec * var_rec) / (n_ref + n_rec)).max(1e-4);

        let m = (1.0 / n_ref + 1.0 / n_rec).sqrt();
        let log_term = (2.0 / self.delta).ln();
        let epsilon = (2.0 * variance * m * log_term).sqrt() + 2.0 / 3.0 * m * log_term;

        if (mean_ref - mean_rec).abs() > epsilon {
            self.detections += 1;
            self.reset();
            return DriftState::Drift;
        }
        DriftState::Stable
    }

    /// Mean over both halves.
    pub fn estimate(&self) -> f64 {
        let n = self.len();
        if n == 0 {
            0.0
        } else {
            (self.reference_moments.sum + self.recent_moments.sum) / n as f64
        }
    }

    pub fn len(&self) -> usize {
        self.reference.len() + self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn reset(&mut self) {
        self.reference.clear();
        self.recent.clear();
        self.reference_moments = Moments::default();
        self.recent_moments = Moments::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_errors_are_stable() {
        let mut adwin = Adwin::new(0.001, 200);
        for i in 0..1000 {
            let err = if i % 10 == 0 { 1.0 } else { 0.0 };
            assert_eq!(adwin.update(err), DriftState::Stable, "step {i}");
        }
        assert!((adwin.estimate() - 0.1).abs() < 0.02);
        assert_eq!(adwin.len(), 200);
    }

    #[test]
    fn test_detects_error_rate_jump() {
        let mut adwin = Adwin::new(0.001, 200);
        for _ in 0..300 {
            adwin.update(0.0);
        }
        let detected = (0..300).any(|_| adwin.update(1.0) == DriftState::Drift);
        assert!(detected);
        assert_eq!(adwin.detections(), 1);
    }

    #[test]
    fn test_reset_after_detection() {
        let mut adwin = Adwin::new(0.01, 100);
        for _ in 0..100 {
            adwin.update(0.0);
        }
        while adwin.update(1.0) == DriftState::Stable {}
        assert!(adwin.is_empty());
    }

    #[test]
    fn test_parameters_are_clamped() {
        let adwin = Adwin::new(0.5, 10);
        assert_eq!(adwin.capacity, 100);
        assert_eq!(adwin.delta, 0.1);
    }

    #[test]
    fn test_no_test_before_min_sub_window() {
        let mut adwin = Adwin::new(0.1, 100);
        for _ in 0..50 {
            adwin.update(0.0);
        }
        // recent holds 50, reference is empty
        assert_eq!(adwin.update(1.0), DriftState::Stable);
    }
}
