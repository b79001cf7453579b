//! Storage engine capabilities and the engine registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ringkeep_core::{DaemonConfig, DomainConfig, PartitionNumber};

use crate::error::{StorageError, StorageResult};
use crate::marker::{VERSION_MARKER_ENGINE, VersionMarkerEngine};

/// Brings one partition to a target version.
///
/// Implementations must be idempotent: after a crash the daemon replays
/// the whole run, so `update` may be called on a partition that is
/// already partly or fully at `target_version`.
pub trait Updater: Send {
    fn update(&self, target_version: u64) -> StorageResult<()>;
}

/// A storage backend for one domain.
pub trait StorageEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Create the updater for `partition`, parameterized by the daemon's
    /// configuration.
    fn updater(
        &self,
        config: &DaemonConfig,
        partition: PartitionNumber,
    ) -> StorageResult<Box<dyn Updater>>;
}

/// Builds the engine instance serving a given domain.
pub type EngineBuilder =
    Arc<dyn Fn(&DomainConfig) -> StorageResult<Arc<dyn StorageEngine>> + Send + Sync>;

/// Maps storage engine names (as written in domain configs) to builders.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    builders: HashMap<String, EngineBuilder>,
}

impl EngineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the engines that ship with ringkeep.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(VERSION_MARKER_ENGINE, |domain| {
            Ok(Arc::new(VersionMarkerEngine::new(&domain.name)?) as Arc<dyn StorageEngine>)
        });
        registry
    }

    /// Register a builder under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&DomainConfig) -> StorageResult<Arc<dyn StorageEngine>> + Send + Sync + 'static,
    {
        self.builders.insert(name.to_string(), Arc::new(builder));
    }

    /// Register one shared engine instance for every domain naming `name`.
    pub fn register_engine(&mut self, name: &str, engine: Arc<dyn StorageEngine>) {
        self.register(name, move |_| Ok(Arc::clone(&engine)));
    }

    /// The engine for `domain`, selected by its `storage_engine` name.
    pub fn resolve(&self, domain: &DomainConfig) -> StorageResult<Arc<dyn StorageEngine>> {
        let builder = self
            .builders
            .get(&domain.storage_engine)
            .ok_or_else(|| StorageError::UnknownEngine(domain.storage_engine.clone()))?;
        builder(domain)
    }

    /// Registered engine names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}
