//! Simulation configuration.
//!
//! Every struct is `#[serde(default)]`, so a JSON file only needs the
//! fields it overrides.

use chrono::NaiveDateTime;
use mopred_core::ConfigError;
use mopred_core::error::ensure_range;
use serde::{Deserialize, Serialize};

pub const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A city with its sensor allocation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RegionSpec {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub sensors: usize,
}

impl RegionSpec {
    pub fn new(name: &str, lat: f64, lon: f64, sensors: usize) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
            sensors,
        }
    }
}

/// Santa Catarina cities.
pub fn default_regions() -> Vec<RegionSpec> {
    vec![
        RegionSpec::new("Florianópolis", -27.5954, -48.5480, 12),
        RegionSpec::new("São José", -27.6136, -48.6366, 6),
        RegionSpec::new("Joinville", -26.3045, -48.8487, 10),
        RegionSpec::new("Blumenau", -26.9194, -49.0661, 8),
        RegionSpec::new("Itajaí", -26.9078, -48.6619, 6),
        RegionSpec::new("Criciúma", -28.6775, -49.3697, 6),
        RegionSpec::new("Lages", -27.8160, -50.3260, 5),
        RegionSpec::new("Chapecó", -27.1004, -52.6152, 7),
    ]
}

/// Inter-detection delays in seconds, as `(min, max)` by distance band.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DelayProfile {
    pub near_km: f64,
    pub far_km: f64,
    pub normal_near: (u64, u64),
    pub normal_mid: (u64, u64),
    pub normal_far: (u64, u64),
    /// Clone legs longer than `far_km`: implausibly fast.
    pub clone_far: (u64, u64),
    pub clone_near: (u64, u64),
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            near_km: 5.0,
            far_km: 50.0,
            normal_near: (300, 1800),
            normal_mid: (1800, 3600),
            normal_far: (3600, 7200),
            clone_far: (60, 300),
            clone_near: (300, 1800),
        }
    }
}

impl DelayProfile {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, (lo, hi)) in [
            ("delays.normal_near", self.normal_near),
            ("delays.normal_mid", self.normal_mid),
            ("delays.normal_far", self.normal_far),
            ("delays.clone_far", self.clone_far),
            ("delays.clone_near", self.clone_near),
        ] {
            if lo > hi {
                return Err(ConfigError::invalid(field, format!("min {lo} > max {hi}")));
            }
        }
        if self.near_km > self.far_km {
            return Err(ConfigError::invalid("delays.near_km", "must not exceed far_km"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub total_entities: usize,
    pub anomalous_fraction: f64,
    pub normal_infractions: (u32, u32),
    pub anomalous_infractions: (u32, u32),
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            total_entities: 1000,
            anomalous_fraction: 0.05,
            normal_infractions: (0, 3),
            anomalous_infractions: (5, 20),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DriftConfig {
    /// Scenario name, see `scenarios::list_scenarios`.
    pub scenario: String,
    /// Every n-th event of the surge phase is flagged.
    pub surge_every: usize,
    pub hot_zones: Vec<String>,
    pub hot_zone_radius_deg: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            scenario: "phased".to_string(),
            surge_every: 5,
            hot_zones: vec!["Joinville".to_string(), "Chapecó".to_string()],
            hot_zone_radius_deg: 0.2,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// `YYYY-MM-DDTHH:MM:SS`, interpreted as UTC.
    pub start_time: String,
    pub horizon_hours: f64,
    pub stops_min: usize,
    pub stops_max: usize,
    pub anomalous_stops_cap: usize,
    /// Probability a normal route stays inside the home region.
    pub local_route_probability: f64,
    pub nearby_radius_km: f64,
    pub sensor_jitter_km: f64,
    pub max_lanes: u8,
    /// Floor for a clamped final interval.
    pub min_interval_seconds: u64,
    /// Routes start at least this long before the horizon ends.
    pub route_reserve_minutes: u64,
    /// Leading share of a clone route that shows the owner's appearance.
    pub identical_clone_fraction: f64,
    /// Explicit distant regions for clone routes; empty picks the farthest.
    pub distant_regions: Vec<String>,
    pub distant_region_count: usize,
    pub sensors_per_distant_region: usize,
    pub regions: Vec<RegionSpec>,
    pub delays: DelayProfile,
    pub fleet: FleetConfig,
    pub drift: DriftConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_time: "2025-01-01T00:00:00".to_string(),
            horizon_hours: 24.0,
            stops_min: 3,
            stops_max: 10,
            anomalous_stops_cap: 8,
            local_route_probability: 0.8,
            nearby_radius_km: 100.0,
            sensor_jitter_km: 5.0,
            max_lanes: 4,
            min_interval_seconds: 60,
            route_reserve_minutes: 60,
            identical_clone_fraction: 0.3,
            distant_regions: Vec::new(),
            distant_region_count: 4,
            sensors_per_distant_region: 2,
            regions: default_regions(),
            delays: DelayProfile::default(),
            fleet: FleetConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Simulation start in epoch milliseconds.
    pub fn start_ms(&self) -> Result<i64, ConfigError> {
        NaiveDateTime::parse_from_str(&self.start_time, START_TIME_FORMAT)
            .map(|dt| dt.and_utc().timestamp_millis())
            .map_err(|e| ConfigError::InvalidTimestamp {
                value: self.start_time.clone(),
                reason: e.to_string(),
            })
    }

    pub fn horizon_ms(&self) -> i64 {
        (self.horizon_hours * 3_600_000.0).round() as i64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start_ms()?;
        ensure_range("horizon_hours", self.horizon_hours, 1e-3, 24.0 * 366.0)?;
        if self.stops_min == 0 || self.stops_min > self.stops_max {
            return Err(ConfigError::invalid(
                "stops_min",
                format!("need 1 <= stops_min <= stops_max, got {}..{}", self.stops_min, self.stops_max),
            ));
        }
        if self.anomalous_stops_cap < self.stops_min {
            return Err(ConfigError::invalid(
                "anomalous_stops_cap",
                "must be at least stops_min",
            ));
        }
        ensure_range("local_route_probability", self.local_route_probability, 0.0, 1.0)?;
        ensure_range("identical_clone_fraction", self.identical_clone_fraction, 0.0, 1.0)?;
        ensure_range("nearby_radius_km", self.nearby_radius_km, 0.0, 20_000.0)?;
        ensure_range("sensor_jitter_km", self.sensor_jitter_km, 0.0, 1_000.0)?;
        ensure_range("fleet.anomalous_fraction", self.fleet.anomalous_fraction, 0.0, 1.0)?;
        ensure_range("drift.hot_zone_radius_deg", self.drift.hot_zone_radius_deg, 0.0, 180.0)?;
        if self.max_lanes == 0 {
            return Err(ConfigError::invalid("max_lanes", "must be at least 1"));
        }
        if self.drift.surge_every == 0 {
            return Err(ConfigError::invalid("drift.surge_every", "must be at least 1"));
        }
        for (field, (lo, hi)) in [
            ("fleet.normal_infractions", self.fleet.normal_infractions),
            ("fleet.anomalous_infractions", self.fleet.anomalous_infractions),
        ] {
            if lo > hi {
                return Err(ConfigError::invalid(field, format!("min {lo} > max {hi}")));
            }
        }
        self.delays.validate()
    }
}
