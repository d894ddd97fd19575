//! Hot zones: cloned plates concentrate around specific cities.

use super::{DriftScenario, Phase};
use crate::topology::Topology;
use mopred_core::DetectionEvent;
use tracing::{debug, warn};

pub struct HotZones {
    phase: Phase,
    /// `(lat, lon)` centres.
    centres: Vec<(f64, f64)>,
    radius_deg: f64,
}

impl HotZones {
    pub fn new(phase: Phase, centres: Vec<(f64, f64)>, radius_deg: f64) -> Self {
        Self {
            phase,
            centres,
            radius_deg,
        }
    }

    /// Centres on the named regions. Names with no region are skipped.
    pub fn from_regions(phase: Phase, names: &[String], radius_deg: f64, topology: &Topology) -> Self {
        let centres = names
            .iter()
            .filter_map(|name| match topology.region(name) {
                Some(r) => Some((r.lat, r.lon)),
                None => {
                    warn!(region = %name, "Unknown hot-zone region, skipping");
                    None
                }
            })
            .collect();
        Self::new(phase, centres, radius_deg)
    }

    fn is_hot(&self, e: &DetectionEvent) -> bool {
        self.centres
            .iter()
            .any(|&(lat, lon)| ((e.lat - lat).powi(2) + (e.lon - lon).powi(2)).sqrt() <= self.radius_deg)
    }
}

impl DriftScenario for HotZones {
    fn name(&self) -> &str {
        "hot_zones"
    }

    fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        let range = self.phase.range(events.len());
        let mut flagged = 0usize;
        let out = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| {
                if range.contains(&i) && !e.anomaly_flag && self.is_hot(&e) {
                    flagged += 1;
                    e.with_anomaly_flag(true)
                } else {
                    e
                }
            })
            .collect();
        debug!(flagged, zones = self.centres.len(), "Hot zones applied");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::tests::stream;

    #[test]
    fn test_only_nearby_events_in_phase_are_flagged() {
        let zones = HotZones::new(Phase::Third, vec![(-26.3, -48.8)], 0.2);
        let mut events = stream(9, -26.35, -48.85);
        events[8].lat = -27.6;
        let out = zones.apply(events);
        let flags: Vec<bool> = out.iter().map(|e| e.anomaly_flag).collect();
        assert_eq!(
            flags,
            vec![false, false, false, false, false, false, true, true, false]
        );
    }

    #[test]
    fn test_unknown_region_is_skipped() {
        let topo = {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(0);
            Topology::build(&crate::config::SimulationConfig::default(), &mut rng).unwrap()
        };
        let names = vec!["Gotham".to_string(), "Joinville".to_string()];
        let zones = HotZones::from_regions(Phase::Third, &names, 0.2, &topo);
        assert_eq!(zones.centres.len(), 1);

        let events = zones.apply(stream(9, -26.35, -48.85));
        assert!(events[6].anomaly_flag);

        let none = HotZones::from_regions(Phase::Third, &["Gotham".to_string()], 0.2, &topo);
        assert!(none.centres.is_empty());
        assert!(none.apply(stream(9, -26.35, -48.85)).iter().all(|e| !e.anomaly_flag));
    }
}
