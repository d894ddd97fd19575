//! Streaming statistics used by the online learners.

pub mod drift_detector;

pub use drift_detector::{Adwin, DriftState};
