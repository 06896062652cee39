use std::path::{Path, PathBuf};
use thiserror::Error;

/// Engine error taxonomy.
///
/// Only source-level failures propagate. Per-row decode problems are
/// absorbed by the batch APIs and surfaced as skip counts; the
/// `MalformedRecord` variant appears when a caller decodes a single
/// record directly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub(crate) fn io(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn json(path: &Path, source: serde_json::Error) -> EngineError {
    EngineError::Json {
        path: path.to_path_buf(),
        source,
    }
}
