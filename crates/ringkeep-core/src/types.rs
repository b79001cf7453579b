//! Shared types used across ringkeep crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Domain identifiers are small integers assigned by the domain group.
pub type DomainId = u32;

/// Partition number within a domain.
pub type PartitionNumber = u32;

// ── Host identity ─────────────────────────────────────────────────

/// A storage host as seen by the coordinator and the topology.
///
/// Produced once at startup (see [`crate::resolve`]) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddress {
    pub hostname: String,
    pub port: u16,
}

impl HostAddress {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

// ── Daemon state ──────────────────────────────────────────────────

/// Lifecycle phase of a host's update daemon.
///
/// The only valid cycle is `Idle → Updateable → Updating → Idle`. The
/// cluster deployer writes `Updateable`; the daemon writes the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Idle,
    Updateable,
    Updating,
}

impl DaemonState {
    /// Whether `self → next` is an edge of the lifecycle cycle.
    pub fn can_transition_to(self, next: DaemonState) -> bool {
        matches!(
            (self, next),
            (DaemonState::Idle, DaemonState::Updateable)
                | (DaemonState::Updateable, DaemonState::Updating)
                | (DaemonState::Updating, DaemonState::Idle)
        )
    }

    /// Whether the update daemon itself may write `to` over `from`.
    ///
    /// `from == None` is a key that was never written; a notification of
    /// `Updateable` may still arrive for it on a fresh cluster.
    pub fn writable_by_daemon(from: Option<DaemonState>, to: DaemonState) -> bool {
        match to {
            DaemonState::Updating => matches!(
                from,
                None | Some(DaemonState::Updateable) | Some(DaemonState::Updating)
            ),
            DaemonState::Idle => from == Some(DaemonState::Updating),
            DaemonState::Updateable => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DaemonState::Idle => "idle",
            DaemonState::Updateable => "updateable",
            DaemonState::Updating => "updating",
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which daemon on a host a state entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonKind {
    /// The serving daemon.
    PartDaemon,
    /// The update daemon (this process).
    UpdateDaemon,
}

impl DaemonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DaemonKind::PartDaemon => "part_daemon",
            DaemonKind::UpdateDaemon => "update_daemon",
        }
    }
}

/// Identifies one persisted [`DaemonState`] in the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DaemonKey {
    pub ring_group: String,
    pub ring_number: u32,
    pub host: HostAddress,
    pub kind: DaemonKind,
}

impl DaemonKey {
    pub fn new(
        ring_group: impl Into<String>,
        ring_number: u32,
        host: HostAddress,
        kind: DaemonKind,
    ) -> Self {
        Self {
            ring_group: ring_group.into(),
            ring_number,
            host,
            kind,
        }
    }

    /// Build the composite key for the daemon states table.
    pub fn table_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.ring_group,
            self.ring_number,
            self.host,
            self.kind.as_str()
        )
    }
}

impl fmt::Display for DaemonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_key())
    }
}

// ── Update work ───────────────────────────────────────────────────

/// One unit of update work: bring one partition of one domain to a version.
///
/// Derived fresh on every orchestration run and never persisted. Ordering
/// and equality only consider `(domain_id, partition)`, so a task set holds
/// at most one entry per partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTask {
    pub domain_id: DomainId,
    pub domain_name: String,
    pub partition: PartitionNumber,
    pub target_version: u64,
}

impl UpdateTask {
    fn identity(&self) -> (DomainId, PartitionNumber) {
        (self.domain_id, self.partition)
    }
}

impl PartialEq for UpdateTask {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for UpdateTask {}

impl PartialOrd for UpdateTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UpdateTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for UpdateTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]#{}@v{}",
            self.domain_name, self.domain_id, self.partition, self.target_version
        )
    }
}
