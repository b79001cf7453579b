//! redb table definitions for the local coordinator.
//!
//! String keys, JSON-serialized values. Daemon state keys follow
//! `{ring_group}/{ring_number}/{host}:{port}/{kind}`.

use redb::TableDefinition;

/// Daemon state records keyed by [`ringkeep_core::DaemonKey::table_key`].
pub const DAEMON_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("daemon_states");

/// Ring group configs keyed by ring group name.
pub const RING_GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("ring_groups");

/// Coordinator bookkeeping (the revision counter).
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key of the monotonically increasing write revision in [`META`].
pub const REVISION_KEY: &str = "revision";
