//! # mopred-sim - ALPR Detection Stream Simulator
//!
//! Synthesizes chronological plate-read streams over a network of cameras,
//! with ground truth for cloned plates and controlled concept drift.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           mopred-sim                                │
//! │                                                                     │
//! │   SimulationConfig                                                  │
//! │        │                                                            │
//! │        ▼                                                            │
//! │   ┌──────────┐   ┌─────────┐   ┌──────────────────────────┐         │
//! │   │ Topology │──►│  Fleet  │──►│  RouteTimelineGenerator   │ (rayon) │
//! │   └──────────┘   └─────────┘   └──────────────────────────┘         │
//! │                                            │                        │
//! │                              merge + sort (ts, entity, sensor)      │
//! │                                            ▼                        │
//! │                                  ┌───────────────────┐              │
//! │                                  │  DriftScenario    │              │
//! │                                  └───────────────────┘              │
//! │                                            ▼                        │
//! │                                  ┌───────────────────┐              │
//! │                                  │ TemporalWindower  │──► Window     │
//! │                                  └───────────────────┘              │
//! │                                                                     │
//! │   Scenarios: baseline, clone_surge, hot_zones, phased               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Design Principles
//!
//! 1. **No Detection Logic** - the simulator only emits events with ground
//!    truth. Feature extraction and model comparison live elsewhere.
//!
//! 2. **Reproducible** - one seed drives topology and fleet; each entity's
//!    route uses a seed derived from its plate, so parallel generation is
//!    deterministic.
//!
//! 3. **Bounded in time** - every event lies inside the configured horizon.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mopred_sim::{SimulationConfig, SimulationEngine};
//!
//! let engine = SimulationEngine::new(SimulationConfig::default())?;
//! let output = engine.run()?;
//! for window in output.into_windows(2 * 3_600_000) {
//!     println!("window {} has {} events", window.index, window.len());
//! }
//! # Ok::<(), mopred_sim::SimError>(())
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod export;
pub mod fleet;
pub mod generator;
pub mod scenarios;
pub mod stream;
pub mod topology;

pub use config::{DelayProfile, DriftConfig, FleetConfig, RegionSpec, SimulationConfig};
pub use core::{Behavior, EntityDescriptor, Sensor};
pub use engine::{SimulationEngine, SimulationOutput, SimulationStats};
pub use error::SimError;
pub use export::{EventLogFormat, write_events, write_events_to_path};
pub use fleet::Fleet;
pub use generator::RouteTimelineGenerator;
pub use scenarios::{DriftScenario, create_scenario, list_scenarios};
pub use stream::{TemporalWindower, Window};
pub use topology::Topology;
