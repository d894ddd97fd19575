use crate::ledger::Variant;
use mopred_core::{ConfigError, ModelError};
use mopred_sim::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("row for window {window} / {variant} already recorded")]
    DuplicateRow { window: usize, variant: Variant },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("pipeline worker `{0}` stopped unexpectedly")]
    WorkerGone(String),

    #[error("failed to spawn pipeline worker: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
