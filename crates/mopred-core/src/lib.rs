//! # mopred-core - Cloned-Plate Detection Primitives
//!
//! Everything between a raw detection event and a per-window metric:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                           mopred-core                              │
//! │                                                                    │
//! │  DetectionEvent ──► PairwiseFeatureExtractor ──► FeaturePair       │
//! │                                                      │             │
//! │                          FeatureSet::{Basic, Multimodal}           │
//! │                                                      ▼             │
//! │                                               FeatureBatch         │
//! │                                   ┌──────────────┴───────────┐     │
//! │                                   ▼                          ▼     │
//! │                            RandomForest             ClassBalancer  │
//! │                            (fit once)                     │        │
//! │                                   │                        ▼        │
//! │                                   │            AdaptiveRandomForest │
//! │                                   │            (Hoeffding + ADWIN)  │
//! │                                   └──────────┬─────────────┘        │
//! │                                              ▼                      │
//! │                                        WindowMetrics                │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Simulation lives in `mopred-sim`; the prequential evaluation loop lives
//! in `mopred-bench`.

pub mod algo;
pub mod balance;
pub mod csv;
pub mod error;
pub mod event;
pub mod features;
pub mod geo;
pub mod metrics;
pub mod model;

pub use balance::{BalanceStrategy, BalancerConfig, ClassBalancer};
pub use error::{ConfigError, ModelError};
pub use event::{DetectionEvent, VehicleAttributes, sort_stream};
pub use features::{
    ExtractorConfig, FeatureBatch, FeaturePair, FeatureSet, FeatureVector, PairMetadata,
    PairwiseFeatureExtractor,
};
pub use geo::haversine_km;
pub use metrics::WindowMetrics;
pub use model::{
    AdaptiveRandomForest, ArfConfig, Classifier, ForestConfig, IncrementalClassifier,
    MaxFeatures, RandomForest,
};
