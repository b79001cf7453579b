//! Offline trigger — the deployer's `Idle → Updateable` write.
//!
//! Writes straight into the coordinator database, so the daemon must not
//! hold it open. Against a running daemon use `POST /api/v1/trigger`.

use ringkeep_coord::{CoordError, Coordinator};
use ringkeep_core::{DaemonConfig, DaemonKey, DaemonKind, HostAddress};
use tracing::info;

use crate::daemon_mode::open_coordinator;

/// Mark the configured host updateable and return the write's revision.
pub fn run_trigger(config: &DaemonConfig) -> anyhow::Result<u64> {
    let coordinator = open_coordinator(config)?;
    let host = HostAddress::resolve(&config.hostname, config.port)?;
    let key = DaemonKey::new(
        config.ring_group.clone(),
        config.ring_number,
        host,
        DaemonKind::UpdateDaemon,
    );

    match coordinator.mark_updateable(&key) {
        Ok(revision) => {
            info!(%key, revision, "host marked updateable");
            Ok(revision)
        }
        Err(CoordError::InvalidTransition { from, .. }) => {
            anyhow::bail!(
                "{key} is {}, only an idle host can be marked updateable",
                from.map_or("unset", |s| s.as_str())
            )
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use ringkeep_core::DaemonState;

    use super::*;

    fn config_in(dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::scaffold("rg1", 1);
        config.data_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn trigger_marks_host_updateable_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let revision = run_trigger(&config).unwrap();
        assert_eq!(revision, 1);

        let err = run_trigger(&config).unwrap_err();
        assert!(err.to_string().contains("updateable"));

        let coordinator = open_coordinator(&config).unwrap();
        let key = DaemonKey::new(
            "rg1",
            1,
            HostAddress::new("localhost", 12345),
            DaemonKind::UpdateDaemon,
        );
        assert_eq!(
            coordinator.get_daemon_state(&key).unwrap(),
            Some(DaemonState::Updateable)
        );
    }
}
