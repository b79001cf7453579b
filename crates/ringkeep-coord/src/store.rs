//! LocalCoordinator — redb-backed coordinator for a single site.
//!
//! Persists daemon states and ring group configs as JSON in redb tables
//! and fans every state write out to in-process subscribers. Supports
//! on-disk and in-memory backends (the latter for testing).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use ringkeep_core::{DaemonKey, DaemonState, RingGroupConfig, Topology};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::coordinator::{Coordinator, DaemonStateChange, Subscription};
use crate::error::{CoordError, CoordResult};
use crate::tables::*;

/// Convert any `Display` error into a `CoordError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| CoordError::$variant(e.to_string())
    };
}

/// A persisted daemon state with the revision that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStateRecord {
    pub state: DaemonState,
    pub revision: u64,
    /// Unix timestamp (seconds) of the write.
    pub updated_at: u64,
}

type Watchers = HashMap<String, Vec<mpsc::UnboundedSender<DaemonStateChange>>>;

/// Thread-safe coordinator backed by redb.
#[derive(Clone)]
pub struct LocalCoordinator {
    db: Arc<Database>,
    watchers: Arc<Mutex<Watchers>>,
}

impl LocalCoordinator {
    /// Open (or create) a persistent coordinator at the given path.
    pub fn open(path: &Path) -> CoordResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let coord = Self::from_database(db)?;
        debug!(?path, "coordinator opened");
        Ok(coord)
    }

    /// Create an ephemeral in-memory coordinator (for testing).
    pub fn open_in_memory() -> CoordResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let coord = Self::from_database(db)?;
        debug!("in-memory coordinator opened");
        Ok(coord)
    }

    fn from_database(db: Database) -> CoordResult<Self> {
        let coord = Self {
            db: Arc::new(db),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        };
        coord.ensure_tables()?;
        Ok(coord)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> CoordResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DAEMON_STATES).map_err(map_err!(Table))?;
        txn.open_table(RING_GROUPS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Daemon states ──────────────────────────────────────────────

    /// Get the full record (state + revision) for a key.
    pub fn get_daemon_record(&self, key: &DaemonKey) -> CoordResult<Option<DaemonStateRecord>> {
        let table_key = key.table_key();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DAEMON_STATES).map_err(map_err!(Table))?;
        match table.get(table_key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: DaemonStateRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// The deployer's write: mark an idle (or never-written) host updateable.
    ///
    /// Any other current state is refused so the lifecycle cycle is kept.
    /// The check and the write share one write transaction, so concurrent
    /// triggers cannot overwrite a state the daemon moved on from.
    pub fn mark_updateable(&self, key: &DaemonKey) -> CoordResult<u64> {
        self.write_state(key, DaemonState::Updateable, |current| {
            if matches!(current, None | Some(DaemonState::Idle)) {
                Ok(())
            } else {
                Err(CoordError::InvalidTransition {
                    key: key.table_key(),
                    from: current,
                    to: DaemonState::Updateable,
                })
            }
        })
    }

    /// Store `state` under a fresh revision once `check` accepts the current
    /// state, all in a single write transaction, then notify subscribers.
    fn write_state(
        &self,
        key: &DaemonKey,
        state: DaemonState,
        check: impl FnOnce(Option<DaemonState>) -> CoordResult<()>,
    ) -> CoordResult<u64> {
        let table_key = key.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let revision;
        {
            let mut table = txn.open_table(DAEMON_STATES).map_err(map_err!(Table))?;
            let current = match table.get(table_key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    let record: DaemonStateRecord =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    Some(record.state)
                }
                None => None,
            };
            check(current)?;

            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let last = meta
                .get(REVISION_KEY)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            revision = last + 1;
            meta.insert(REVISION_KEY, revision).map_err(map_err!(Write))?;

            let record = DaemonStateRecord {
                state,
                revision,
                updated_at: epoch_secs(),
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(table_key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %table_key, %state, revision, "daemon state stored");

        self.notify(DaemonStateChange {
            key: key.clone(),
            state,
            revision,
        });
        Ok(revision)
    }

    /// Current revision counter (0 before the first write).
    pub fn revision(&self) -> CoordResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(META).map_err(map_err!(Table))?;
        let revision = table
            .get(REVISION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(revision)
    }

    /// Push a change to every live subscriber of its key, dropping closed ones.
    fn notify(&self, change: DaemonStateChange) {
        let table_key = change.key.table_key();
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = watchers.get_mut(&table_key) {
            senders.retain(|tx| tx.send(change.clone()).is_ok());
            debug!(key = %table_key, subscribers = senders.len(), "state change delivered");
            if senders.is_empty() {
                watchers.remove(&table_key);
            }
        }
    }

    // ── Ring groups ────────────────────────────────────────────────

    /// Insert or replace a ring group config.
    pub fn put_ring_group_config(&self, config: &RingGroupConfig) -> CoordResult<()> {
        let value = serde_json::to_vec(config).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RING_GROUPS).map_err(map_err!(Table))?;
            table
                .insert(config.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(ring_group = %config.name, "ring group stored");
        Ok(())
    }

    /// List all ring groups.
    pub fn list_ring_groups(&self) -> CoordResult<Vec<RingGroupConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RING_GROUPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let config: RingGroupConfig =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(config);
        }
        Ok(results)
    }

    /// Store every ring group of a topology, replacing existing entries.
    pub fn load_topology(&self, topology: &Topology) -> CoordResult<usize> {
        for ring_group in &topology.ring_groups {
            self.put_ring_group_config(ring_group)?;
        }
        info!(ring_groups = topology.ring_groups.len(), "topology loaded");
        Ok(topology.ring_groups.len())
    }
}

impl Coordinator for LocalCoordinator {
    fn get_daemon_state(&self, key: &DaemonKey) -> CoordResult<Option<DaemonState>> {
        Ok(self.get_daemon_record(key)?.map(|record| record.state))
    }

    fn set_daemon_state(&self, key: &DaemonKey, state: DaemonState) -> CoordResult<u64> {
        self.write_state(key, state, |_| Ok(()))
    }

    fn subscribe(&self, key: &DaemonKey) -> CoordResult<Subscription> {
        let (tx, subscription) = Subscription::channel();
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.entry(key.table_key()).or_default().push(tx);
        debug!(%key, "subscribed to daemon state changes");
        Ok(subscription)
    }

    fn get_ring_group_config(&self, name: &str) -> CoordResult<RingGroupConfig> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RING_GROUPS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Err(CoordError::NotFound(format!("ring group {name}"))),
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
