//! Demo fleet synthesis.
//!
//! A small built-in palette stands in for a real vehicle catalog. Clone
//! vehicles partially share the owner's appearance: type, color and
//! brand/model each survive with their own probability.

use crate::config::FleetConfig;
use crate::core::{Behavior, EntityDescriptor};
use crate::error::SimError;
use crate::topology::Topology;
use mopred_core::VehicleAttributes;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

const CATALOG: &[(&str, &[&str])] = &[
    ("Fiat", &["Argo", "Mobi", "Strada", "Toro"]),
    ("Volkswagen", &["Gol", "Polo", "T-Cross", "Saveiro"]),
    ("Chevrolet", &["Onix", "Tracker", "S10"]),
    ("Toyota", &["Corolla", "Hilux", "Yaris"]),
    ("Honda", &["Civic", "HR-V", "CG 160"]),
    ("Hyundai", &["HB20", "Creta"]),
];
const TYPES: &[&str] = &["car", "pickup", "suv", "motorcycle"];
const COLORS: &[&str] = &["white", "black", "silver", "gray", "red", "blue"];

const KEEP_TYPE: f64 = 0.8;
const KEEP_COLOR: f64 = 0.7;
const KEEP_BRAND_MODEL: f64 = 0.6;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Fleet {
    pub entities: Vec<EntityDescriptor>,
}

impl Fleet {
    pub fn new(entities: Vec<EntityDescriptor>) -> Self {
        Self { entities }
    }

    pub fn synthesize<R: Rng + ?Sized>(config: &FleetConfig, topology: &Topology, rng: &mut R) -> Self {
        let homes: Vec<&str> = if topology.regions().is_empty() {
            topology.sensors().iter().map(|s| s.region.as_str()).collect()
        } else {
            topology.regions().iter().map(|r| r.name.as_str()).collect()
        };
        let n_anomalous =
            ((config.total_entities as f64 * config.anomalous_fraction).round() as usize)
                .min(config.total_entities);

        let mut plates = HashSet::with_capacity(config.total_entities);
        let mut behaviors: Vec<Behavior> = (0..config.total_entities)
            .map(|i| {
                if i < n_anomalous {
                    Behavior::Anomalous
                } else {
                    Behavior::Normal
                }
            })
            .collect();
        behaviors.shuffle(rng);

        let entities = behaviors
            .into_iter()
            .map(|behavior| {
                let id = loop {
                    let plate = random_plate(rng);
                    if plates.insert(plate.clone()) {
                        break plate;
                    }
                };
                let (lo, hi) = match behavior {
                    Behavior::Normal => config.normal_infractions,
                    Behavior::Anomalous => config.anomalous_infractions,
                };
                let attributes = random_attributes(rng);
                let clone_attributes =
                    (behavior == Behavior::Anomalous).then(|| clone_of(&attributes, rng));
                EntityDescriptor {
                    id,
                    home_region: homes.choose(rng).map_or_else(String::new, |h| h.to_string()),
                    behavior,
                    infraction_count: rng.random_range(lo..=hi),
                    attributes,
                    clone_attributes,
                }
            })
            .collect();

        info!(
            entities = config.total_entities,
            anomalous = n_anomalous,
            "Fleet synthesized"
        );
        Self { entities }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn anomalous_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_anomalous()).count()
    }
}

/// Mercosur-style plate: `ABC1D23`.
pub fn random_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    "LLLDLDD"
        .chars()
        .map(|slot| match slot {
            'L' => char::from(b'A' + rng.random_range(0..26u8)),
            _ => char::from(b'0' + rng.random_range(0..10u8)),
        })
        .collect()
}

fn pick<'a, R: Rng + ?Sized>(options: &[&'a str], rng: &mut R) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// A different option, or the same one if there is no alternative.
fn pick_other<'a, R: Rng + ?Sized>(options: &[&'a str], current: &str, rng: &mut R) -> &'a str {
    let others: Vec<&str> = options.iter().copied().filter(|o| *o != current).collect();
    others.choose(rng).copied().unwrap_or_else(|| pick(options, rng))
}

pub fn random_attributes<R: Rng + ?Sized>(rng: &mut R) -> VehicleAttributes {
    let (brand, models) = CATALOG[rng.random_range(0..CATALOG.len())];
    VehicleAttributes::new(brand, pick(models, rng), pick(TYPES, rng), pick(COLORS, rng))
}

fn clone_of<R: Rng + ?Sized>(owner: &VehicleAttributes, rng: &mut R) -> VehicleAttributes {
    let mut clone = owner.clone();
    if !rng.random_bool(KEEP_TYPE) {
        clone.vehicle_type = pick_other(TYPES, &owner.vehicle_type, rng).to_string();
    }
    if !rng.random_bool(KEEP_COLOR) {
        clone.color = pick_other(COLORS, &owner.color, rng).to_string();
    }
    if !rng.random_bool(KEEP_BRAND_MODEL) {
        let (brand, models) = CATALOG[rng.random_range(0..CATALOG.len())];
        let model = if brand == owner.brand {
            pick_other(models, &owner.model, rng)
        } else {
            pick(models, rng)
        };
        clone.brand = brand.to_string();
        clone.model = model.to_string();
    }
    clone
}
