//! Sensor topology: regions, their jittered sensors, and region distances.

use crate::config::{RegionSpec, SimulationConfig};
use crate::core::Sensor;
use crate::error::SimError;
use mopred_core::geo::{KM_PER_DEGREE, haversine_km};
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct Topology {
    regions: Vec<RegionSpec>,
    sensors: Vec<Sensor>,
    /// Region name -> indices into `sensors`.
    by_region: HashMap<String, Vec<usize>>,
}

impl Topology {
    /// Places each region's sensors around its centre with uniform jitter.
    pub fn build<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> Result<Self, SimError> {
        let jitter = config.sensor_jitter_km / KM_PER_DEGREE;
        let mut sensors = Vec::new();
        for region in &config.regions {
            for _ in 0..region.sensors {
                let (dlat, dlon) = if jitter > 0.0 {
                    (rng.random_range(-jitter..=jitter), rng.random_range(-jitter..=jitter))
                } else {
                    (0.0, 0.0)
                };
                sensors.push(Sensor {
                    id: format!("CAM{:03}", sensors.len() + 1),
                    region: region.name.clone(),
                    lat: region.lat + dlat,
                    lon: region.lon + dlon,
                    lanes: rng.random_range(1..=config.max_lanes),
                });
            }
            debug!(region = %region.name, sensors = region.sensors, "Region populated");
        }
        let topology = Self::from_parts(config.regions.clone(), sensors)?;
        info!(
            regions = topology.regions.len(),
            sensors = topology.sensors.len(),
            "Topology built"
        );
        Ok(topology)
    }

    /// Assembles a topology from explicit sensors.
    pub fn from_parts(regions: Vec<RegionSpec>, sensors: Vec<Sensor>) -> Result<Self, SimError> {
        if sensors.is_empty() {
            return Err(SimError::EmptyTopology);
        }
        let mut by_region: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, s) in sensors.iter().enumerate() {
            by_region.entry(s.region.clone()).or_default().push(i);
        }
        Ok(Self {
            regions,
            sensors,
            by_region,
        })
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn regions(&self) -> &[RegionSpec] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&RegionSpec> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Sensor indices of one region; empty if the region has none.
    pub fn sensors_in(&self, region: &str) -> &[usize] {
        self.by_region.get(region).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The region itself plus every region whose centre is within `radius_km`.
    pub fn nearby_regions(&self, region: &str, radius_km: f64) -> Vec<&str> {
        let Some(origin) = self.region(region) else {
            return Vec::new();
        };
        self.regions
            .iter()
            .filter(|r| {
                r.name == origin.name
                    || haversine_km(origin.lat, origin.lon, r.lat, r.lon) <= radius_km
            })
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Configured distant regions, or the `count` regions farthest from `home`.
    /// Configured names that match no region.
    pub fn unknown_regions<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .map(String::as_str)
            .filter(|n| self.region(n).is_none())
            .collect()
    }

    /// Regions a cloned plate hops between. A non-empty `configured` list
    /// wins, minus names with no matching region; otherwise the `count`
    /// regions farthest from `home`.
    pub fn distant_regions<'a>(&'a self, home: &str, configured: &'a [String], count: usize) -> Vec<&'a str> {
        if !configured.is_empty() {
            return configured
                .iter()
                .map(String::as_str)
                .filter(|n| self.region(n).is_some())
                .collect();
        }
        let Some(origin) = self.region(home) else {
            return Vec::new();
        };
        let mut others: Vec<(f64, &str)> = self
            .regions
            .iter()
            .filter(|r| r.name != home)
            .map(|r| (haversine_km(origin.lat, origin.lon, r.lat, r.lon), r.name.as_str()))
            .collect();
        others.sort_by(|a, b| b.0.total_cmp(&a.0));
        others.into_iter().take(count).map(|(_, n)| n).collect()
    }
}
