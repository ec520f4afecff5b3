//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid record in {}: {reason}", path.display())]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("store task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of a trigger (event, block tick or startup step).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A ledger or cursor save failed; the mutation is not committed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// A chain read failed as a whole (not a single batch item).
    #[error("chain read failed: {0:#}")]
    Chain(#[from] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
