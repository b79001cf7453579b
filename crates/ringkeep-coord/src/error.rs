//! Error types for the ringkeep coordinator.

use ringkeep_core::DaemonState;
use thiserror::Error;

/// Result type alias for coordinator operations.
pub type CoordResult<T> = Result<T, CoordError>;

/// Errors that can occur while talking to the coordinator.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("refusing {key} transition {from:?} -> {to}")]
    InvalidTransition {
        key: String,
        from: Option<DaemonState>,
        to: DaemonState,
    },

    #[error("state change subscription closed")]
    SubscriptionClosed,
}
