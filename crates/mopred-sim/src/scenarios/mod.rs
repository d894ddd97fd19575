//! Concept-drift scenarios.
//!
//! A scenario rewrites ground-truth flags on the globally sorted stream so
//! the anomaly concept changes over time. The stream is split into three
//! equal phases by event count:
//! - **phase 1**: untouched, the concept the static model is trained on
//! - **phase 2**: `clone_surge` flags every n-th event
//! - **phase 3**: `hot_zones` flags events near selected regions

pub mod hot_zones;
pub mod surge;

pub use hot_zones::HotZones;
pub use surge::CloneSurge;

use crate::config::DriftConfig;
use crate::topology::Topology;
use mopred_core::{ConfigError, DetectionEvent};
use std::ops::Range;

/// Trait for drift scenarios
pub trait DriftScenario: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the stream with (possibly) rewritten anomaly flags.
    fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent>;
}

/// Which third of the stream a scenario acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    First,
    Second,
    Third,
}

impl Phase {
    pub fn range(self, len: usize) -> Range<usize> {
        let third = len / 3;
        match self {
            Phase::First => 0..third,
            Phase::Second => third..2 * third,
            Phase::Third => 2 * third..len,
        }
    }
}

/// No drift.
pub struct Baseline;

impl DriftScenario for Baseline {
    fn name(&self) -> &str {
        "baseline"
    }

    fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        events
    }
}

/// Scenarios applied in sequence.
pub struct Phased {
    stages: Vec<Box<dyn DriftScenario>>,
}

impl Phased {
    pub fn new(stages: Vec<Box<dyn DriftScenario>>) -> Self {
        Self { stages }
    }
}

impl DriftScenario for Phased {
    fn name(&self) -> &str {
        "phased"
    }

    fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        self.stages.iter().fold(events, |acc, stage| stage.apply(acc))
    }
}

/// Create a scenario by name from the drift configuration.
pub fn create_scenario(
    config: &DriftConfig,
    topology: &Topology,
) -> Result<Box<dyn DriftScenario>, ConfigError> {
    let surge = || CloneSurge::new(Phase::Second, config.surge_every);
    let zones = || HotZones::from_regions(Phase::Third, &config.hot_zones, config.hot_zone_radius_deg, topology);

    match config.scenario.to_lowercase().as_str() {
        "baseline" | "none" => Ok(Box::new(Baseline)),
        "clone_surge" | "surge" => Ok(Box::new(surge())),
        "hot_zones" => Ok(Box::new(zones())),
        "phased" => {
            let stages: Vec<Box<dyn DriftScenario>> = vec![Box::new(surge()), Box::new(zones())];
            Ok(Box::new(Phased::new(stages)))
        }
        other => Err(ConfigError::UnknownScenario(other.to_string())),
    }
}

/// List all available scenarios
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("baseline", "No drift; ground truth as generated"),
        (
            "clone_surge",
            "Phase 2 flags every n-th event as a cloned-plate read",
        ),
        (
            "hot_zones",
            "Phase 3 flags events near the configured hot-zone regions",
        ),
        ("phased", "clone_surge followed by hot_zones (default)"),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use mopred_core::VehicleAttributes;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    pub(crate) fn stream(len: usize, lat: f64, lon: f64) -> Vec<DetectionEvent> {
        (0..len)
            .map(|i| DetectionEvent {
                entity_id: format!("E{i:04}"),
                timestamp_ms: i as i64 * 1000,
                sensor_id: "CAM001".to_string(),
                region: "Test".to_string(),
                lane: 1,
                lat,
                lon,
                attributes: VehicleAttributes::new("Fiat", "Argo", "car", "white"),
                infraction_count: 0,
                anomaly_flag: false,
            })
            .collect()
    }

    fn topology() -> Topology {
        let mut rng = StdRng::seed_from_u64(0);
        Topology::build(&SimulationConfig::default(), &mut rng).unwrap()
    }

    #[test]
    fn test_phase_ranges_cover_stream() {
        let len = 10;
        let (a, b, c) = (Phase::First.range(len), Phase::Second.range(len), Phase::Third.range(len));
        assert_eq!((a.start, a.end, b.end, c.end), (0, 3, 6, 10));
        assert_eq!(b.start, a.end);
        assert_eq!(c.start, b.end);
    }

    #[test]
    fn test_registry() {
        let topo = topology();
        for (name, _) in list_scenarios() {
            let config = DriftConfig {
                scenario: name.to_string(),
                ..Default::default()
            };
            let scenario = create_scenario(&config, &topo).unwrap();
            assert_eq!(scenario.name(), name);
        }
        let unknown = DriftConfig {
            scenario: "meteor".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_scenario(&unknown, &topo),
            Err(ConfigError::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_baseline_is_identity() {
        let events = stream(9, 0.0, 0.0);
        assert_eq!(Baseline.apply(events.clone()), events);
    }

    #[test]
    fn test_phased_only_touches_later_phases() {
        let topo = topology();
        let joinville = topo.region("Joinville").unwrap().clone();
        let scenario = create_scenario(&DriftConfig::default(), &topo).unwrap();
        let out = scenario.apply(stream(30, joinville.lat, joinville.lon));
        assert!(out[..10].iter().all(|e| !e.anomaly_flag));
        assert_eq!(out[10..20].iter().filter(|e| e.anomaly_flag).count(), 2);
        assert!(out[20..].iter().all(|e| e.anomaly_flag));
    }
}
