//! Simulation Engine
//!
//! Orchestrates topology, fleet, route generation and drift injection into
//! one chronologically sorted stream.
//!
//! Entities are generated in parallel. Each gets its own RNG seeded from
//! the run seed and a hash of its plate, so the merged stream is identical
//! across runs regardless of thread scheduling.

use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::fleet::Fleet;
use crate::generator::RouteTimelineGenerator;
use crate::scenarios::create_scenario;
use crate::stream::TemporalWindower;
use crate::topology::Topology;
use mopred_core::{DetectionEvent, sort_stream};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

/// Summary of a generated stream.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SimulationStats {
    pub entities: usize,
    pub anomalous_entities: usize,
    pub sensors: usize,
    pub events: usize,
    pub flagged_events: usize,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
}

impl SimulationStats {
    fn from_events(engine: &SimulationEngine, events: &[DetectionEvent]) -> Self {
        Self {
            entities: engine.fleet.len(),
            anomalous_entities: engine.fleet.anomalous_count(),
            sensors: engine.topology.sensors().len(),
            events: events.len(),
            flagged_events: events.iter().filter(|e| e.anomaly_flag).count(),
            first_ts: events.first().map(|e| e.timestamp_ms),
            last_ts: events.last().map(|e| e.timestamp_ms),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationOutput {
    pub events: Vec<DetectionEvent>,
    pub stats: SimulationStats,
}

impl SimulationOutput {
    pub fn into_windows(self, duration_ms: i64) -> TemporalWindower<std::vec::IntoIter<DetectionEvent>> {
        TemporalWindower::new(self.events, duration_ms)
    }
}

pub struct SimulationEngine {
    config: SimulationConfig,
    topology: Topology,
    fleet: Fleet,
}

impl SimulationEngine {
    /// Builds topology and fleet from the configuration.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let topology = Topology::build(&config, &mut rng)?;
        let fleet = Fleet::synthesize(&config.fleet, &topology, &mut rng);
        Self::with_parts(config, topology, fleet)
    }

    /// Uses an explicit topology and fleet.
    pub fn with_parts(config: SimulationConfig, topology: Topology, fleet: Fleet) -> Result<Self, SimError> {
        config.validate()?;
        if fleet.is_empty() {
            return Err(SimError::EmptyFleet);
        }
        Ok(Self {
            config,
            topology,
            fleet,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Per-entity RNG seed.
    pub fn entity_seed(&self, entity_id: &str) -> u64 {
        self.config.seed ^ xxh3_64(entity_id.as_bytes())
    }

    pub fn run(&self) -> Result<SimulationOutput, SimError> {
        let started = Instant::now();
        let generator = RouteTimelineGenerator::new(&self.config, &self.topology)?;
        let scenario = create_scenario(&self.config.drift, &self.topology)?;

        let mut events: Vec<DetectionEvent> = self
            .fleet
            .entities
            .par_iter()
            .flat_map_iter(|entity| {
                let mut rng = StdRng::seed_from_u64(self.entity_seed(&entity.id));
                generator.generate(entity, &mut rng)
            })
            .collect();
        sort_stream(&mut events);

        let events = scenario.apply(events);
        let stats = SimulationStats::from_events(self, &events);
        info!(
            events = stats.events,
            flagged = stats.flagged_events,
            entities = stats.entities,
            scenario = scenario.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Event stream generated"
        );
        Ok(SimulationOutput { events, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriftConfig, FleetConfig};

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            fleet: FleetConfig {
                total_entities: 60,
                anomalous_fraction: 0.1,
                ..Default::default()
            },
            drift: DriftConfig {
                scenario: "baseline".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_stream_is_sorted_and_bounded() {
        let config = small_config(1);
        let start = config.start_ms().unwrap();
        let end = start + config.horizon_ms();
        let out = SimulationEngine::new(config).unwrap().run().unwrap();

        assert!(out.stats.events >= 60 * 3 / 2);
        assert!(out.events.windows(2).all(|w| w[0].stream_order(&w[1]).is_le()));
        assert!(out.events.iter().all(|e| e.timestamp_ms >= start && e.timestamp_ms <= end));
        assert_eq!(out.stats.anomalous_entities, 6);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = SimulationEngine::new(small_config(5)).unwrap().run().unwrap();
        let b = SimulationEngine::new(small_config(5)).unwrap().run().unwrap();
        assert_eq!(a.events, b.events);

        let c = SimulationEngine::new(small_config(6)).unwrap().run().unwrap();
        assert_ne!(a.events, c.events);
    }

    #[test]
    fn test_baseline_flags_match_fleet() {
        let engine = SimulationEngine::new(small_config(2)).unwrap();
        let out = engine.run().unwrap();
        for e in &out.events {
            let owner = engine.fleet().entities.iter().find(|x| x.id == e.entity_id).unwrap();
            assert_eq!(e.anomaly_flag, owner.is_anomalous());
        }
    }

    #[test]
    fn test_phased_drift_adds_flags() {
        let base = SimulationEngine::new(small_config(3)).unwrap().run().unwrap();
        let drifted = SimulationEngine::new(SimulationConfig {
            drift: DriftConfig::default(),
            ..small_config(3)
        })
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(base.events.len(), drifted.events.len());
        assert!(drifted.stats.flagged_events > base.stats.flagged_events);
    }

    #[test]
    fn test_unknown_region_names_still_run() {
        let config = SimulationConfig {
            distant_regions: vec!["Atlantis".to_string()],
            drift: DriftConfig {
                hot_zones: vec!["Atlantis".to_string()],
                ..Default::default()
            },
            ..small_config(7)
        };
        let out = SimulationEngine::new(config).unwrap().run().unwrap();
        assert!(out.stats.events >= 60 * 3 / 2);
        assert!(out.stats.flagged_events > 0);
    }

    #[test]
    fn test_empty_fleet_is_rejected() {
        let config = small_config(1);
        let mut rng = StdRng::seed_from_u64(0);
        let topo = Topology::build(&config, &mut rng).unwrap();
        assert!(matches!(
            SimulationEngine::with_parts(config, topo, Fleet::default()),
            Err(SimError::EmptyFleet)
        ));
    }

    #[test]
    fn test_into_windows() {
        let out = SimulationEngine::new(small_config(4)).unwrap().run().unwrap();
        let total = out.events.len();
        let windowed: usize = out.into_windows(2 * 3_600_000).map(|w| w.len()).sum();
        assert_eq!(windowed, total);
    }
}
