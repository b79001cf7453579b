//! ringkeep.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fallback parallelism when the CPU count cannot be detected.
pub const FALLBACK_CONCURRENCY: usize = 4;

/// Everything the update daemon needs to run on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Hostname this host is known by in the ring topology.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Port the host serves partitions on; part of its [`crate::HostAddress`].
    #[serde(default = "default_port")]
    pub port: u16,
    pub ring_group: String,
    pub ring_number: u32,
    /// Maximum number of partition updates in flight during one run.
    #[serde(default = "default_update_concurrency")]
    pub update_concurrency: usize,
    /// Root directory for partition data and local coordinator state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Port of the status HTTP API.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Connection settings for the coordination service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// redb file backing the local coordinator. Defaults to
    /// `{data_dir}/coordinator.redb`.
    pub db_path: Option<PathBuf>,
    /// Topology file loaded into the coordinator at startup.
    pub topology: Option<PathBuf>,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_api_port() -> u16 {
    8480
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/ringkeep")
}

/// One update slot per CPU.
pub fn default_update_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal configuration for a host in the given ring.
    pub fn scaffold(ring_group: &str, ring_number: u32) -> Self {
        DaemonConfig {
            hostname: default_hostname(),
            port: default_port(),
            ring_group: ring_group.to_string(),
            ring_number,
            update_concurrency: default_update_concurrency(),
            data_dir: default_data_dir(),
            api_port: default_api_port(),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_group.trim().is_empty() {
            return Err(ConfigError::Invalid("ring_group must not be empty".to_string()));
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("hostname must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.update_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "update_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn coordinator_db_path(&self) -> PathBuf {
        self.coordinator
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("coordinator.redb"))
    }
}
