//! Version-marker engine.
//!
//! Each partition lives in `{data_dir}/{domain}/{partition:05}` and records
//! its installed version in a `VERSION` file. Updating writes the new
//! version through a temp file + rename, so a crash leaves either the old
//! or the new marker. Re-running against a partition already at the
//! target is a no-op.

use std::fs;
use std::path::{Component, Path, PathBuf};

use ringkeep_core::{DaemonConfig, PartitionNumber};
use tracing::{debug, info};

use crate::engine::{StorageEngine, Updater};
use crate::error::{StorageError, StorageResult};

/// Registry name of [`VersionMarkerEngine`].
pub const VERSION_MARKER_ENGINE: &str = "version-marker";

const MARKER_FILE: &str = "VERSION";
const MARKER_TMP: &str = "VERSION.tmp";

/// Engine that tracks partition versions with marker files.
#[derive(Debug, Clone)]
pub struct VersionMarkerEngine {
    domain: String,
}

impl VersionMarkerEngine {
    /// The domain name becomes a directory under the data dir, so it must
    /// be one plain path component.
    pub fn new(domain: &str) -> StorageResult<Self> {
        if !is_plain_dir_name(domain) {
            return Err(StorageError::InvalidDomainName(domain.to_string()));
        }
        Ok(Self {
            domain: domain.to_string(),
        })
    }

    /// Directory holding one partition of this engine's domain.
    pub fn partition_dir(&self, data_dir: &Path, partition: PartitionNumber) -> PathBuf {
        data_dir.join(&self.domain).join(format!("{partition:05}"))
    }
}

impl StorageEngine for VersionMarkerEngine {
    fn name(&self) -> &str {
        VERSION_MARKER_ENGINE
    }

    fn updater(
        &self,
        config: &DaemonConfig,
        partition: PartitionNumber,
    ) -> StorageResult<Box<dyn Updater>> {
        Ok(Box::new(VersionMarkerUpdater {
            dir: self.partition_dir(&config.data_dir, partition),
        }))
    }
}

fn is_plain_dir_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    );
    single && !name.contains(['/', '\\'])
}

/// Updater for one marker-tracked partition.
#[derive(Debug)]
pub struct VersionMarkerUpdater {
    dir: PathBuf,
}

impl VersionMarkerUpdater {
    /// Installed version, or `None` for a partition never updated.
    pub fn installed_version(&self) -> StorageResult<Option<u64>> {
        read_marker(&self.dir.join(MARKER_FILE))
    }
}

impl Updater for VersionMarkerUpdater {
    fn update(&self, target_version: u64) -> StorageResult<()> {
        if self.installed_version()? == Some(target_version) {
            debug!(dir = ?self.dir, target_version, "partition already at target version");
            return Ok(());
        }

        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let tmp = self.dir.join(MARKER_TMP);
        let marker = self.dir.join(MARKER_FILE);
        fs::write(&tmp, format!("{target_version}\n")).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &marker).map_err(io_err(&marker))?;

        info!(dir = ?self.dir, target_version, "partition updated");
        Ok(())
    }
}

fn read_marker(path: &Path) -> StorageResult<Option<u64>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    content
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}
