//! Core simulation types.
//!
//! Sensors and entity descriptors are the inputs of route generation; the
//! events they produce are `mopred_core::DetectionEvent`.

use mopred_core::VehicleAttributes;
use serde::{Deserialize, Serialize};

/// A fixed plate-reading camera.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Sensor {
    pub id: String,
    pub region: String,
    pub lat: f64,
    pub lon: f64,
    pub lanes: u8,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Normal,
    /// A cloned plate: two vehicles share one identity.
    Anomalous,
}

/// Everything route generation needs to know about one tracked plate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntityDescriptor {
    pub id: String,
    pub home_region: String,
    pub behavior: Behavior,
    pub infraction_count: u32,
    pub attributes: VehicleAttributes,
    /// Appearance of the clone vehicle, if it differs from the owner's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_attributes: Option<VehicleAttributes>,
}

impl EntityDescriptor {
    pub fn is_anomalous(&self) -> bool {
        self.behavior == Behavior::Anomalous
    }
}
