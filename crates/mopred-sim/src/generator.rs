//! Route timeline generation.
//!
//! Produces one entity's detections in chronological order:
//! - **Normal** plates mostly stay in their home region, sometimes visit
//!   nearby regions, and travel at plausible speeds
//! - **Anomalous** (cloned) plates hop between distant regions with
//!   intervals too short for one vehicle to cover the distance
//!
//! Every timestamp stays inside `[start, start + horizon]`: the last leg is
//! clamped to the remaining budget, and a route whose remaining budget falls
//! below the minimum interval ends early.

use crate::config::SimulationConfig;
use crate::core::{Behavior, EntityDescriptor, Sensor};
use crate::error::SimError;
use crate::topology::Topology;
use mopred_core::{DetectionEvent, haversine_km};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom, index};
use std::collections::HashSet;
use tracing::warn;

pub struct RouteTimelineGenerator<'a> {
    config: &'a SimulationConfig,
    topology: &'a Topology,
    start_ms: i64,
    horizon_ms: i64,
}

impl<'a> RouteTimelineGenerator<'a> {
    pub fn new(config: &'a SimulationConfig, topology: &'a Topology) -> Result<Self, SimError> {
        for region in topology.unknown_regions(&config.distant_regions) {
            warn!(region, "Unknown distant region, ignoring");
        }
        Ok(Self {
            config,
            topology,
            start_ms: config.start_ms()?,
            horizon_ms: config.horizon_ms(),
        })
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.horizon_ms
    }

    pub fn generate<R: Rng + ?Sized>(&self, entity: &EntityDescriptor, rng: &mut R) -> Vec<DetectionEvent> {
        let stops = self.stop_count(entity.behavior, rng);
        let route = match entity.behavior {
            Behavior::Normal => self.normal_route(entity, stops, rng),
            Behavior::Anomalous => self.clone_route(entity, stops, rng),
        };
        if route.is_empty() {
            return Vec::new();
        }

        let identical = (self.config.identical_clone_fraction * route.len() as f64).ceil() as usize;
        let limit = self.end_ms();
        let mut ts = self.route_start(rng);
        let mut events: Vec<DetectionEvent> = Vec::with_capacity(route.len());

        for (i, &idx) in route.iter().enumerate() {
            let sensor = &self.topology.sensors()[idx];
            if let Some(prev) = events.last() {
                let dist = haversine_km(prev.lat, prev.lon, sensor.lat, sensor.lon);
                let mut delay_ms = self.delay_seconds(entity.behavior, dist, rng) as i64 * 1000;
                if ts + delay_ms > limit {
                    let remaining = limit - ts;
                    if remaining < self.config.min_interval_seconds as i64 * 1000 {
                        break;
                    }
                    delay_ms = remaining;
                }
                ts += delay_ms;
            }

            let attributes = match &entity.clone_attributes {
                Some(clone) if entity.is_anomalous() && i >= identical => clone.clone(),
                _ => entity.attributes.clone(),
            };
            events.push(self.detection(entity, sensor, ts, attributes, rng));
        }
        events
    }

    fn detection<R: Rng + ?Sized>(
        &self,
        entity: &EntityDescriptor,
        sensor: &Sensor,
        ts: i64,
        attributes: mopred_core::VehicleAttributes,
        rng: &mut R,
    ) -> DetectionEvent {
        DetectionEvent {
            entity_id: entity.id.clone(),
            timestamp_ms: ts,
            sensor_id: sensor.id.clone(),
            region: sensor.region.clone(),
            lane: rng.random_range(1..=sensor.lanes.max(1)),
            lat: sensor.lat,
            lon: sensor.lon,
            attributes,
            infraction_count: entity.infraction_count,
            anomaly_flag: entity.is_anomalous(),
        }
    }

    fn stop_count<R: Rng + ?Sized>(&self, behavior: Behavior, rng: &mut R) -> usize {
        let lo = self.config.stops_min;
        let hi = match behavior {
            Behavior::Normal => self.config.stops_max,
            Behavior::Anomalous => self.config.stops_max.min(self.config.anomalous_stops_cap),
        };
        rng.random_range(lo..=hi.max(lo))
    }

    fn route_start<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let reserve = self.config.route_reserve_minutes as i64 * 60_000;
        let latest = self.start_ms + self.horizon_ms - reserve;
        if latest <= self.start_ms {
            self.start_ms
        } else {
            rng.random_range(self.start_ms..=latest)
        }
    }

    fn delay_seconds<R: Rng + ?Sized>(&self, behavior: Behavior, dist_km: f64, rng: &mut R) -> u64 {
        let d = &self.config.delays;
        let (lo, hi) = match behavior {
            Behavior::Anomalous if dist_km > d.far_km => d.clone_far,
            Behavior::Anomalous => d.clone_near,
            Behavior::Normal if dist_km <= d.near_km => d.normal_near,
            Behavior::Normal if dist_km <= d.far_km => d.normal_mid,
            Behavior::Normal => d.normal_far,
        };
        rng.random_range(lo..=hi)
    }

    fn all_sensors(&self) -> Vec<usize> {
        (0..self.topology.sensors().len()).collect()
    }

    fn normal_route<R: Rng + ?Sized>(&self, entity: &EntityDescriptor, stops: usize, rng: &mut R) -> Vec<usize> {
        let home = entity.home_region.as_str();
        let mut pool: Vec<usize> = if rng.random_bool(self.config.local_route_probability) {
            self.topology.sensors_in(home).to_vec()
        } else {
            self.topology
                .nearby_regions(home, self.config.nearby_radius_km)
                .into_iter()
                .flat_map(|r| self.topology.sensors_in(r).iter().copied())
                .collect()
        };
        if pool.is_empty() {
            warn!(entity = %entity.id, region = home, "No sensors for home region, using all sensors");
            pool = self.all_sensors();
        }

        if pool.len() < stops {
            (0..stops)
                .map(|_| pool[rng.random_range(0..pool.len())])
                .collect()
        } else {
            index::sample(rng, pool.len(), stops)
                .into_iter()
                .map(|i| pool[i])
                .collect()
        }
    }

    fn clone_route<R: Rng + ?Sized>(&self, entity: &EntityDescriptor, stops: usize, rng: &mut R) -> Vec<usize> {
        let distant = self.topology.distant_regions(
            &entity.home_region,
            &self.config.distant_regions,
            self.config.distant_region_count,
        );
        if distant.is_empty() {
            warn!(entity = %entity.id, region = %entity.home_region, "No distant regions for home region, using all sensors");
        }
        let mut pool: Vec<usize> = Vec::new();
        for region in distant {
            let sensors = self.topology.sensors_in(region);
            if sensors.is_empty() {
                warn!(entity = %entity.id, region, "Distant region has no sensors");
                continue;
            }
            pool.extend(
                sensors
                    .choose_multiple(rng, self.config.sensors_per_distant_region)
                    .copied(),
            );
        }

        if pool.len() < stops {
            let taken: HashSet<usize> = pool.iter().copied().collect();
            let rest: Vec<usize> = self
                .all_sensors()
                .into_iter()
                .filter(|i| !taken.contains(i))
                .collect();
            let missing = stops - pool.len();
            pool.extend(rest.choose_multiple(rng, missing).copied());
        }

        pool.shuffle(rng);
        pool.truncate(stops);
        pool
    }
}
