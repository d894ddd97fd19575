//! Pairwise feature extraction.
//!
//! Turns one entity's chronologically sorted detections into labeled
//! feature pairs:
//! - **Ordinary entities**: consecutive detections only
//! - **Known-anomalous entities**: every combination `i < j`, capped per entity
//! - **Filters**: same-sensor pairs and pairs closer than the elapsed-time floor
//!
//! The label is a heuristic: implied speed above the threshold, or the first
//! detection carries the ground-truth anomaly flag.

use crate::error::{ConfigError, ensure_range};
use crate::event::DetectionEvent;
use crate::geo::haversine_km;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Dense feature vector; every feature set fits inline.
pub type FeatureVector = SmallVec<[f64; 8]>;

/// Which projection of a [`FeaturePair`] a model consumes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// distance, elapsed time, implied speed
    Basic,
    /// basic + infractions and attribute-equality flags
    Multimodal,
}

impl FeatureSet {
    pub const ALL: [FeatureSet; 2] = [FeatureSet::Basic, FeatureSet::Multimodal];

    pub fn dim(self) -> usize {
        match self {
            FeatureSet::Basic => 3,
            FeatureSet::Multimodal => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureSet::Basic => "basic",
            FeatureSet::Multimodal => "multimodal",
        }
    }

    pub fn project(self, pair: &FeaturePair) -> FeatureVector {
        let mut v = FeatureVector::new();
        v.extend([pair.distance_km, pair.elapsed_seconds, pair.implied_speed_kmh]);
        if self == FeatureSet::Multimodal {
            v.extend([
                pair.infraction_count as f64,
                flag(pair.brand_model_equal),
                flag(pair.type_equal),
                flag(pair.color_equal),
            ]);
        }
        v
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Audit trail of where a pair came from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PairMetadata {
    pub entity_id: String,
    pub sensor_a: String,
    pub sensor_b: String,
    pub ts_a: i64,
    pub ts_b: i64,
    /// Ground-truth flag of the first detection.
    pub ground_truth: bool,
}

/// A labeled pair of detections of the same entity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeaturePair {
    pub distance_km: f64,
    pub elapsed_seconds: f64,
    pub implied_speed_kmh: f64,
    pub infraction_count: u32,
    pub brand_model_equal: bool,
    pub type_equal: bool,
    pub color_equal: bool,
    pub label: u8,
    pub meta: PairMetadata,
}

/// Rows of one feature set with their labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureBatch {
    pub dim: usize,
    pub rows: Vec<FeatureVector>,
    pub labels: Vec<u8>,
}

impl FeatureBatch {
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            rows: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn from_pairs(pairs: &[FeaturePair], set: FeatureSet) -> Self {
        Self {
            dim: set.dim(),
            rows: pairs.iter().map(|p| set.project(p)).collect(),
            labels: pairs.iter().map(|p| p.label).collect(),
        }
    }

    pub fn push(&mut self, row: FeatureVector, label: u8) {
        debug_assert_eq!(row.len(), self.dim);
        self.rows.push(row);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `[negatives, positives]`
    pub fn class_counts(&self) -> [usize; 2] {
        let pos = self.labels.iter().filter(|&&y| y == 1).count();
        [self.labels.len() - pos, pos]
    }

    pub fn n_positive(&self) -> usize {
        self.class_counts()[1]
    }
}

/// Thresholds for pair extraction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Implied speed above which a pair is labeled anomalous.
    pub speed_threshold_kmh: f64,
    /// Pairs closer in time than this are discarded.
    pub min_elapsed_seconds: f64,
    /// Upper bound on retained pairs per entity.
    pub max_pairs_per_entity: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            speed_threshold_kmh: 150.0,
            min_elapsed_seconds: 30.0,
            max_pairs_per_entity: 50,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_range("speed_threshold_kmh", self.speed_threshold_kmh, 1.0, 1e6)?;
        ensure_range("min_elapsed_seconds", self.min_elapsed_seconds, 0.0, 86_400.0)?;
        if self.max_pairs_per_entity == 0 {
            return Err(ConfigError::invalid(
                "max_pairs_per_entity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct PairwiseFeatureExtractor {
    config: ExtractorConfig,
}

impl PairwiseFeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts pairs from one entity's events, sorted by timestamp.
    pub fn extract_entity(&self, events: &[&DetectionEvent]) -> Vec<FeaturePair> {
        if events.len() < 2 {
            return Vec::new();
        }
        let known_anomalous = events.iter().any(|e| e.anomaly_flag);
        let cap = self.config.max_pairs_per_entity;
        let mut pairs = Vec::new();

        if known_anomalous {
            'outer: for i in 0..events.len() {
                for j in (i + 1)..events.len() {
                    if pairs.len() >= cap {
                        break 'outer;
                    }
                    if let Some(p) = self.pair(events[i], events[j]) {
                        pairs.push(p);
                    }
                }
            }
        } else {
            for w in events.windows(2) {
                if pairs.len() >= cap {
                    break;
                }
                if let Some(p) = self.pair(w[0], w[1]) {
                    pairs.push(p);
                }
            }
        }
        pairs
    }

    /// Groups a window's events by entity and extracts all pairs.
    ///
    /// Entities are visited in id order so output is deterministic
    /// regardless of how rayon schedules the work.
    pub fn extract_window(&self, events: &[DetectionEvent]) -> Vec<FeaturePair> {
        let mut by_entity: BTreeMap<&str, Vec<&DetectionEvent>> = BTreeMap::new();
        for e in events {
            by_entity.entry(e.entity_id.as_str()).or_default().push(e);
        }

        let groups: Vec<Vec<&DetectionEvent>> = by_entity.into_values().collect();
        groups
            .into_par_iter()
            .map(|mut group| {
                group.sort_by(|a, b| a.stream_order(b));
                self.extract_entity(&group)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn pair(&self, a: &DetectionEvent, b: &DetectionEvent) -> Option<FeaturePair> {
        if a.sensor_id == b.sensor_id {
            return None;
        }
        let elapsed_seconds = (b.timestamp_ms - a.timestamp_ms).abs() as f64 / 1000.0;
        if elapsed_seconds < self.config.min_elapsed_seconds || elapsed_seconds <= 0.0 {
            return None;
        }

        let distance_km = haversine_km(a.lat, a.lon, b.lat, b.lon);
        let implied_speed_kmh = distance_km / (elapsed_seconds / 3600.0);
        let label = implied_speed_kmh > self.config.speed_threshold_kmh || a.anomaly_flag;

        Some(FeaturePair {
            distance_km,
            elapsed_seconds,
            implied_speed_kmh,
            infraction_count: a.infraction_count,
            brand_model_equal: a.attributes.same_brand_model(&b.attributes),
            type_equal: a.attributes.vehicle_type == b.attributes.vehicle_type,
            color_equal: a.attributes.color == b.attributes.color,
            label: label as u8,
            meta: PairMetadata {
                entity_id: a.entity_id.clone(),
                sensor_a: a.sensor_id.clone(),
                sensor_b: b.sensor_id.clone(),
                ts_a: a.timestamp_ms,
                ts_b: b.timestamp_ms,
                ground_truth: a.anomaly_flag,
            },
        })
    }
}
