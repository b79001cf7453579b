//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by storage engines and their updaters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown storage engine: {0}")]
    UnknownEngine(String),

    #[error("invalid domain name {0:?}: must be a single directory name")]
    InvalidDomainName(String),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt partition state at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("update failed: {0}")]
    Failed(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
