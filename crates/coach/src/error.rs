//! Error types for the training pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable (primary) checkpoint store.
///
/// Backup-store failures never produce these; they are logged and skipped.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported format version {found} in {path} (expected {expected})")]
    Version {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("{path} is tagged with iteration {found}, expected {expected}")]
    KeyMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("inconsistent partial record {path}: claims {claimed} episodes, holds {actual}")]
    Inconsistent {
        path: PathBuf,
        claimed: usize,
        actual: usize,
    },

    #[error("{path} not found in checkpoint or backup location")]
    NotFound { path: PathBuf },
}

/// Invalid training configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement}")]
    Invalid {
        field: &'static str,
        requirement: &'static str,
    },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Model training failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("example policy has {found} entries, model expects {expected}")]
    PolicySize { expected: usize, found: usize },
}

/// Top-level error of the training loop
#[derive(Debug, Error)]
pub enum CoachError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("model training failed: {0}")]
    Model(#[from] ModelError),

    #[error("training history {path} is missing and recovery was declined")]
    MissingHistory { path: PathBuf },

    #[error("failed to build self-play worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
