//! Cloning surge: a burst of cloned-plate activity.

use super::{DriftScenario, Phase};
use mopred_core::DetectionEvent;
use tracing::debug;

pub struct CloneSurge {
    phase: Phase,
    every: usize,
}

impl CloneSurge {
    pub fn new(phase: Phase, every: usize) -> Self {
        Self {
            phase,
            every: every.max(1),
        }
    }
}

impl DriftScenario for CloneSurge {
    fn name(&self) -> &str {
        "clone_surge"
    }

    fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        let range = self.phase.range(events.len());
        let mut flagged = 0usize;
        let out = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| {
                if range.contains(&i) && (i - range.start) % self.every == 0 && !e.anomaly_flag {
                    flagged += 1;
                    e.with_anomaly_flag(true)
                } else {
                    e
                }
            })
            .collect();
        debug!(flagged, every = self.every, "Clone surge applied");
        out
    }
}
