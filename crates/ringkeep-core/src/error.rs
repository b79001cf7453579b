//! Error types for configuration loading and host resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading or validating configuration and topology files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The local hostname could not be turned into a network address.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve host {hostname}: {source}")]
    HostResolution {
        hostname: String,
        #[source]
        source: std::io::Error,
    },
}
