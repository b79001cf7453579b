//! Fakes shared by the orchestrator and controller tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringkeep_coord::{CoordError, CoordResult, Coordinator, DaemonStateChange, Subscription};
use ringkeep_core::{
    DaemonConfig, DaemonKey, DaemonKind, DaemonState, DomainConfig, DomainConfigVersion,
    DomainGroupConfig, DomainGroupVersion, DomainPartitions, HostAddress, HostAssignment,
    PartitionNumber, RingConfig, RingGroupConfig,
};
use ringkeep_storage::{EngineRegistry, StorageEngine, StorageError, StorageResult, Updater};
use tokio::sync::mpsc;

pub const RING_GROUP: &str = "rg1";
pub const ENGINE: &str = "scripted";

pub fn local_host() -> HostAddress {
    HostAddress::new("localhost", 12345)
}

pub fn daemon_key() -> DaemonKey {
    DaemonKey::new(RING_GROUP, 1, local_host(), DaemonKind::UpdateDaemon)
}

pub fn daemon_config(concurrency: usize) -> DaemonConfig {
    let mut config = DaemonConfig::scaffold(RING_GROUP, 1);
    config.update_concurrency = concurrency;
    config
}

/// One domain in a test ring group: `(id, name, engine, target version, partitions)`.
pub struct DomainFixture<'a> {
    pub id: u32,
    pub name: &'a str,
    pub engine: &'a str,
    pub version: u64,
    pub partitions: &'a [PartitionNumber],
}

impl<'a> DomainFixture<'a> {
    pub fn new(id: u32, name: &'a str, partitions: &'a [PartitionNumber]) -> Self {
        Self {
            id,
            name,
            engine: ENGINE,
            version: 1,
            partitions,
        }
    }
}

/// Ring group `rg1` whose ring 1 holds `host` with the given domains.
pub fn ring_group_for(host: &HostAddress, domains: &[DomainFixture<'_>]) -> RingGroupConfig {
    let versions = domains
        .iter()
        .map(|d| DomainConfigVersion {
            domain: DomainConfig {
                name: d.name.to_string(),
                id: d.id,
                partitioner: "modulo".to_string(),
                num_partitions: 16,
                storage_engine: d.engine.to_string(),
                version: d.version,
            },
            version: d.version,
        })
        .collect();
    let assignments = domains
        .iter()
        .map(|d| DomainPartitions {
            domain_id: d.id,
            partitions: d.partitions.iter().copied().collect(),
        })
        .collect();

    RingGroupConfig {
        name: RING_GROUP.to_string(),
        domain_group: DomainGroupConfig {
            name: "dg1".to_string(),
            versions: vec![DomainGroupVersion {
                version_number: 1,
                domains: versions,
            }],
        },
        rings: vec![RingConfig {
            ring_number: 1,
            hosts: vec![
                HostAssignment {
                    address: host.clone(),
                    domains: assignments,
                },
                HostAssignment {
                    address: HostAddress::new("other-host", 12345),
                    domains: Vec::new(),
                },
            ],
        }],
    }
}

/// In-memory coordinator holding a single daemon key.
#[derive(Default)]
pub struct FakeCoordinator {
    state: Mutex<Option<DaemonState>>,
    revision: AtomicU64,
    ring_group: Mutex<Option<RingGroupConfig>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<DaemonStateChange>>>,
    /// Every write made through the trait: `(state before, state written)`.
    writes: Mutex<Vec<(Option<DaemonState>, DaemonState)>>,
    fail_writes: AtomicBool,
    fail_ring_group_reads: AtomicBool,
}

impl FakeCoordinator {
    pub fn new(state: Option<DaemonState>, ring_group: Option<RingGroupConfig>) -> Arc<Self> {
        let fake = Self::default();
        *fake.state.lock().unwrap() = state;
        *fake.ring_group.lock().unwrap() = ring_group;
        Arc::new(fake)
    }

    pub fn state(&self) -> Option<DaemonState> {
        *self.state.lock().unwrap()
    }

    pub fn writes(&self) -> Vec<(Option<DaemonState>, DaemonState)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn set_ring_group(&self, ring_group: RingGroupConfig) {
        *self.ring_group.lock().unwrap() = Some(ring_group);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ring_group_reads(&self, fail: bool) {
        self.fail_ring_group_reads.store(fail, Ordering::SeqCst);
    }

    /// A write by someone other than the daemon, e.g. the controller
    /// marking the host updateable. Not recorded in [`Self::writes`].
    pub fn external_set(&self, state: DaemonState) -> DaemonStateChange {
        *self.state.lock().unwrap() = Some(state);
        self.publish(state)
    }

    /// The change a coordinator would emit for `state` at a fresh revision,
    /// without persisting it.
    pub fn next_change(&self, state: DaemonState) -> DaemonStateChange {
        DaemonStateChange {
            key: daemon_key(),
            state,
            revision: self.revision.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    fn publish(&self, state: DaemonState) -> DaemonStateChange {
        let change = self.next_change(state);
        self.watchers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(change.clone()).is_ok());
        change
    }
}

impl Coordinator for FakeCoordinator {
    fn get_daemon_state(&self, _key: &DaemonKey) -> CoordResult<Option<DaemonState>> {
        Ok(self.state())
    }

    fn set_daemon_state(&self, _key: &DaemonKey, state: DaemonState) -> CoordResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoordError::Write("coordinator unavailable".to_string()));
        }
        let before = self.state.lock().unwrap().replace(state);
        self.writes.lock().unwrap().push((before, state));
        Ok(self.publish(state).revision)
    }

    fn subscribe(&self, _key: &DaemonKey) -> CoordResult<Subscription> {
        let (tx, subscription) = Subscription::channel();
        self.watchers.lock().unwrap().push(tx);
        Ok(subscription)
    }

    fn get_ring_group_config(&self, name: &str) -> CoordResult<RingGroupConfig> {
        if self.fail_ring_group_reads.load(Ordering::SeqCst) {
            return Err(CoordError::Read("coordinator unavailable".to_string()));
        }
        self.ring_group
            .lock()
            .unwrap()
            .clone()
            .filter(|rg| rg.name == name)
            .ok_or_else(|| CoordError::NotFound(format!("ring group {name}")))
    }
}

/// Shared record of what scripted updaters did.
#[derive(Default)]
pub struct ScriptLog {
    calls: Mutex<Vec<(String, PartitionNumber, u64)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptLog {
    pub fn calls(&self) -> Vec<(String, PartitionNumber, u64)> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Partitions updated, per domain name.
    pub fn partitions(&self, domain: &str) -> BTreeSet<PartitionNumber> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _, _)| d == domain)
            .map(|(_, p, _)| *p)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Engine whose updaters follow a per-partition script.
pub struct ScriptedEngine {
    domain: String,
    log: Arc<ScriptLog>,
    script: HashMap<PartitionNumber, Behavior>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new(domain: &str, log: Arc<ScriptLog>) -> Self {
        Self {
            domain: domain.to_string(),
            log,
            script: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn with(mut self, partition: PartitionNumber, behavior: Behavior) -> Self {
        self.script.insert(partition, behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl StorageEngine for ScriptedEngine {
    fn name(&self) -> &str {
        ENGINE
    }

    fn updater(
        &self,
        _config: &DaemonConfig,
        partition: PartitionNumber,
    ) -> StorageResult<Box<dyn Updater>> {
        Ok(Box::new(ScriptedUpdater {
            domain: self.domain.clone(),
            partition,
            behavior: self
                .script
                .get(&partition)
                .copied()
                .unwrap_or(Behavior::Succeed),
            delay: self.delay,
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedUpdater {
    domain: String,
    partition: PartitionNumber,
    behavior: Behavior,
    delay: Duration,
    log: Arc<ScriptLog>,
}

impl Updater for ScriptedUpdater {
    fn update(&self, target_version: u64) -> StorageResult<()> {
        let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log
            .calls
            .lock()
            .unwrap()
            .push((self.domain.clone(), self.partition, target_version));
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(StorageError::Failed(format!(
                "partition {} refused the update",
                self.partition
            ))),
            Behavior::Panic => panic!("updater for partition {} crashed", self.partition),
        }
    }
}

/// Registry resolving every domain to a plain scripted engine per domain name.
pub fn scripted_registry(log: &Arc<ScriptLog>) -> EngineRegistry {
    let log = Arc::clone(log);
    let mut registry = EngineRegistry::new();
    registry.register(ENGINE, move |domain| {
        Ok(Arc::new(ScriptedEngine::new(&domain.name, Arc::clone(&log))) as Arc<dyn StorageEngine>)
    });
    registry
}

/// Registry serving every domain from one prepared engine.
pub fn registry_with(engine: ScriptedEngine) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    registry.register_engine(ENGINE, Arc::new(engine));
    registry
}

