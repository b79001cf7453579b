//! Update daemon error types.

use ringkeep_coord::CoordError;
use ringkeep_core::{HostAddress, ResolveError};
use thiserror::Error;

/// Errors that abort a whole orchestration run.
///
/// Per-partition failures are not errors here: they are collected in the
/// run's [`crate::UpdateOutcome`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("ring group not found: {0}")]
    ConfigNotFound(String),

    #[error("host {host} is not a member of any ring in ring group {ring_group}")]
    HostNotInRing {
        host: HostAddress,
        ring_group: String,
    },

    #[error("coordinator error: {0}")]
    Coordinator(#[source] CoordError),
}

/// Errors surfaced by the daemon state controller.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordError),
}

impl DaemonError {
    /// Coordinator failures are transient, whether they hit a state write or
    /// the ring group read inside a run: the client reconnects on its own
    /// and the daemon carries on. Missing topology and a closed subscription
    /// are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DaemonError::Coordinator(e)
            | DaemonError::Orchestrator(OrchestratorError::Coordinator(e)) => {
                !matches!(e, CoordError::SubscriptionClosed)
            }
            DaemonError::Orchestrator(_) | DaemonError::Resolve(_) => false,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_failures_are_transient_wherever_they_surface() {
        let direct = DaemonError::Coordinator(CoordError::Write("io".to_string()));
        let during_plan =
            DaemonError::Orchestrator(OrchestratorError::Coordinator(CoordError::Read("io".to_string())));
        let txn =
            DaemonError::Orchestrator(OrchestratorError::Coordinator(CoordError::Transaction("busy".to_string())));
        assert!(direct.is_transient());
        assert!(during_plan.is_transient());
        assert!(txn.is_transient());
    }

    #[test]
    fn topology_errors_and_closed_subscriptions_are_fatal() {
        let missing = DaemonError::Orchestrator(OrchestratorError::ConfigNotFound("rg1".to_string()));
        let stranger = DaemonError::Orchestrator(OrchestratorError::HostNotInRing {
            host: HostAddress::new("elsewhere", 1),
            ring_group: "rg1".to_string(),
        });
        let closed = DaemonError::Coordinator(CoordError::SubscriptionClosed);
        assert!(!missing.is_transient());
        assert!(!stranger.is_transient());
        assert!(!closed.is_transient());
    }
}
