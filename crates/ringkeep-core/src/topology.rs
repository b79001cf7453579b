//! Ring and domain topology.
//!
//! A ring group serves one domain group across several rings; each ring
//! assigns every domain's partitions to its hosts. The domain group's
//! latest version is the target every owned partition converges to.
//!
//! These are plain data loaded from TOML and stored by the coordinator,
//! so they can change between orchestration runs.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DomainId, HostAddress, PartitionNumber};

// ── Domains ───────────────────────────────────────────────────────

/// A named dataset with its own partitioner and storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    pub id: DomainId,
    /// Partitioner name, e.g. `"modulo"`.
    pub partitioner: String,
    pub num_partitions: u32,
    /// Registry name of the storage engine that updates this domain.
    pub storage_engine: String,
    /// Version currently published for the domain.
    #[serde(default)]
    pub version: u64,
}

/// A domain and the version it must be brought to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfigVersion {
    pub domain: DomainConfig,
    pub version: u64,
}

/// One published snapshot of a domain group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainGroupVersion {
    pub version_number: u64,
    pub domains: Vec<DomainConfigVersion>,
}

/// A versioned bundle of domains deployed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainGroupConfig {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<DomainGroupVersion>,
}

impl DomainGroupConfig {
    /// The highest-numbered version, or `None` if nothing was published yet.
    pub fn latest_version(&self) -> Option<&DomainGroupVersion> {
        self.versions.iter().max_by_key(|v| v.version_number)
    }
}

// ── Rings ─────────────────────────────────────────────────────────

/// Partitions of one domain owned by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPartitions {
    pub domain_id: DomainId,
    pub partitions: BTreeSet<PartitionNumber>,
}

/// The partitions one host owns, per domain id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAssignment {
    pub address: HostAddress,
    #[serde(default)]
    pub domains: Vec<DomainPartitions>,
}

impl HostAssignment {
    pub fn partitions(&self, domain_id: DomainId) -> BTreeSet<PartitionNumber> {
        self.domains
            .iter()
            .filter(|d| d.domain_id == domain_id)
            .flat_map(|d| d.partitions.iter().copied())
            .collect()
    }
}

/// The hosts of one ring and their partition assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingConfig {
    pub ring_number: u32,
    #[serde(default)]
    pub hosts: Vec<HostAssignment>,
}

impl RingConfig {
    pub fn hosts(&self) -> impl Iterator<Item = &HostAddress> {
        self.hosts.iter().map(|h| &h.address)
    }

    pub fn contains_host(&self, host: &HostAddress) -> bool {
        self.hosts().any(|h| h == host)
    }

    /// Partitions of `domain_id` assigned to `host`; empty when it owns none.
    pub fn domain_partitions_for_host(
        &self,
        host: &HostAddress,
        domain_id: DomainId,
    ) -> BTreeSet<PartitionNumber> {
        self.hosts
            .iter()
            .find(|h| &h.address == host)
            .map(|h| h.partitions(domain_id))
            .unwrap_or_default()
    }
}

/// A collection of rings serving the same domain group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingGroupConfig {
    pub name: String,
    pub domain_group: DomainGroupConfig,
    #[serde(default)]
    pub rings: Vec<RingConfig>,
}

impl RingGroupConfig {
    /// The ring that contains `host`, if any.
    pub fn ring_config_for_host(&self, host: &HostAddress) -> Option<&RingConfig> {
        self.rings.iter().find(|r| r.contains_host(host))
    }

    pub fn ring(&self, ring_number: u32) -> Option<&RingConfig> {
        self.rings.iter().find(|r| r.ring_number == ring_number)
    }
}

// ── Topology file ─────────────────────────────────────────────────

/// Every ring group known to a coordinator, as loaded from a topology file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default, rename = "ring_group")]
    pub ring_groups: Vec<RingGroupConfig>,
}

impl Topology {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let topology: Topology = toml::from_str(content)?;
        Ok(topology)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn ring_group(&self, name: &str) -> Option<&RingGroupConfig> {
        self.ring_groups.iter().find(|rg| rg.name == name)
    }
}
