//! Config loading for every subcommand: the TOML file first, then flags.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Args;
use ringkeep_core::DaemonConfig;

/// Flags shared by the subcommands. Each one overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Daemon config file (TOML).
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Local hostname, as the topology knows it.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Port this host serves partitions on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Ring group name. Required without --config.
    #[arg(long)]
    pub ring_group: Option<String>,

    /// Ring number. Required without --config.
    #[arg(long)]
    pub ring_number: Option<u32>,

    /// Maximum partitions updated in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Root directory for partition data.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Local coordinator database file.
    #[arg(long)]
    pub coordinator_db: Option<PathBuf>,

    /// Topology file to seed the coordinator with.
    #[arg(long)]
    pub topology: Option<PathBuf>,

    /// Status API port.
    #[arg(long)]
    pub api_port: Option<u16>,
}

impl ConfigArgs {
    /// Build the effective config and validate it.
    pub fn load(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => {
                let ring_group = self
                    .ring_group
                    .as_deref()
                    .ok_or_else(|| anyhow!("--ring-group is required without --config"))?;
                let ring_number = self
                    .ring_number
                    .ok_or_else(|| anyhow!("--ring-number is required without --config"))?;
                DaemonConfig::scaffold(ring_group, ring_number)
            }
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(hostname) = &self.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ring_group) = &self.ring_group {
            config.ring_group = ring_group.clone();
        }
        if let Some(ring_number) = self.ring_number {
            config.ring_number = ring_number;
        }
        if let Some(concurrency) = self.concurrency {
            config.update_concurrency = concurrency;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(db) = &self.coordinator_db {
            config.coordinator.db_path = Some(db.clone());
        }
        if let Some(topology) = &self.topology {
            config.coordinator.topology = Some(topology.clone());
        }
        if let Some(api_port) = self.api_port {
            config.api_port = api_port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_alone_build_a_config() {
        let args = ConfigArgs {
            ring_group: Some("rg1".to_string()),
            ring_number: Some(2),
            concurrency: Some(3),
            ..ConfigArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.ring_group, "rg1");
        assert_eq!(config.ring_number, 2);
        assert_eq!(config.update_concurrency, 3);
        assert_eq!(config.hostname, "localhost");
    }

    #[test]
    fn ring_group_is_required_without_file() {
        let args = ConfigArgs {
            ring_number: Some(1),
            ..ConfigArgs::default()
        };
        let err = args.load().unwrap_err();
        assert!(err.to_string().contains("--ring-group"));
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ringkeep.toml");
        let mut file_config = DaemonConfig::scaffold("rg-file", 1);
        file_config.port = 2000;
        std::fs::write(&path, file_config.to_toml_string().unwrap()).unwrap();

        let args = ConfigArgs {
            config: Some(path),
            port: Some(3000),
            coordinator_db: Some(PathBuf::from("/tmp/coord.redb")),
            ..ConfigArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.ring_group, "rg-file");
        assert_eq!(config.port, 3000);
        assert_eq!(config.coordinator_db_path(), PathBuf::from("/tmp/coord.redb"));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ConfigArgs {
            ring_group: Some("rg1".to_string()),
            ring_number: Some(1),
            concurrency: Some(0),
            ..ConfigArgs::default()
        };
        assert!(args.load().is_err());
    }
}
