//! Detection events - the unit of data flowing through the pipeline.
//!
//! A `DetectionEvent` is a single plate read by one sensor at one instant.
//! Events are immutable once built; drift scenarios derive new events with
//! [`DetectionEvent::with_anomaly_flag`] instead of mutating in place.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Categorical appearance of a vehicle as read by a sensor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VehicleAttributes {
    pub brand: String,
    pub model: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub color: String,
}

impl VehicleAttributes {
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        vehicle_type: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            vehicle_type: vehicle_type.into(),
            color: color.into(),
        }
    }

    pub fn same_brand_model(&self, other: &Self) -> bool {
        self.brand == other.brand && self.model == other.model
    }
}

/// One sensor read of one entity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DetectionEvent {
    pub entity_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub sensor_id: String,
    pub region: String,
    pub lane: u8,
    pub lat: f64,
    pub lon: f64,
    pub attributes: VehicleAttributes,
    pub infraction_count: u32,
    /// Ground-truth anomaly flag.
    pub anomaly_flag: bool,
}

impl DetectionEvent {
    /// Returns the same event with its ground-truth flag replaced.
    pub fn with_anomaly_flag(self, anomaly_flag: bool) -> Self {
        Self {
            anomaly_flag,
            ..self
        }
    }

    /// Global ordering key: timestamp, then entity, then sensor.
    pub fn stream_order(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then_with(|| self.entity_id.cmp(&other.entity_id))
            .then_with(|| self.sensor_id.cmp(&other.sensor_id))
    }
}

/// Sorts events into global stream order.
pub fn sort_stream(events: &mut [DetectionEvent]) {
    events.sort_by(DetectionEvent::stream_order);
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn attrs() -> VehicleAttributes {
        VehicleAttributes::new("Fiat", "Argo", "car", "white")
    }

    pub fn event(entity: &str, ts_ms: i64, sensor: &str, lat: f64, lon: f64) -> DetectionEvent {
        DetectionEvent {
            entity_id: entity.to_string(),
            timestamp_ms: ts_ms,
            sensor_id: sensor.to_string(),
            region: "Florianópolis".to_string(),
            lane: 1,
            lat,
            lon,
            attributes: attrs(),
            infraction_count: 0,
            anomaly_flag: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::event;
    use super::*;

    #[test]
    fn test_with_anomaly_flag_preserves_fields() {
        let e = event("ABC1D23", 1_000, "CAM001", -27.0, -48.0);
        let flagged = e.clone().with_anomaly_flag(true);
        assert!(flagged.anomaly_flag);
        assert_eq!(flagged.entity_id, e.entity_id);
        assert_eq!(flagged.timestamp_ms, e.timestamp_ms);
    }

    #[test]
    fn test_sort_stream_tiebreaks_on_entity() {
        let mut events = vec![
            event("ZZZ9Z99", 2_000, "CAM002", 0.0, 0.0),
            event("BBB1B11", 1_000, "CAM001", 0.0, 0.0),
            event("AAA1A11", 1_000, "CAM003", 0.0, 0.0),
        ];
        sort_stream(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["AAA1A11", "BBB1B11", "ZZZ9Z99"]);
    }

    #[test]
    fn test_attributes_serialize_type_field() {
        let json = serde_json::to_string(&fixtures::attrs()).unwrap();
        assert!(json.contains("\"type\":\"car\""));
    }
}
