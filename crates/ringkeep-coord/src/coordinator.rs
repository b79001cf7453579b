//! The coordination capability consumed by the update daemon.
//!
//! A coordinator owns every host's [`DaemonState`], pushes changes to
//! subscribers and serves ring group topology by name. Delivery of
//! changes is at-least-once: subscribers must tolerate duplicates.

use ringkeep_core::{DaemonKey, DaemonState, RingGroupConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CoordResult;

/// A state change observed on a watched key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStateChange {
    pub key: DaemonKey,
    pub state: DaemonState,
    /// Revision of the write that produced this change. Revisions only
    /// grow, so a change whose revision was already seen is a duplicate.
    pub revision: u64,
}

/// Stream of [`DaemonStateChange`]s for one key.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<DaemonStateChange>,
}

impl Subscription {
    /// Create a subscription and the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<DaemonStateChange>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next change. `None` once the coordinator dropped the feed.
    pub async fn recv(&mut self) -> Option<DaemonStateChange> {
        self.rx.recv().await
    }

    /// Take a change that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<DaemonStateChange> {
        self.rx.try_recv().ok()
    }
}

/// Access to the coordination service.
pub trait Coordinator: Send + Sync + 'static {
    /// Current persisted state; `None` if the key was never written.
    fn get_daemon_state(&self, key: &DaemonKey) -> CoordResult<Option<DaemonState>>;

    /// Persist `state` for `key`. Durable once it returns; yields the
    /// revision of the write.
    fn set_daemon_state(&self, key: &DaemonKey, state: DaemonState) -> CoordResult<u64>;

    /// Watch `key` for changes from now on.
    fn subscribe(&self, key: &DaemonKey) -> CoordResult<Subscription>;

    /// Look up a ring group; `CoordError::NotFound` when the name is unknown.
    fn get_ring_group_config(&self, name: &str) -> CoordResult<RingGroupConfig>;
}
