//! Runtime settings shared by the managers and background loops.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default lease length granted by `LeaseTask`.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(3 * 60);

/// Tasks older than this are removed by the reaper.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_LEASE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub const TASKS_DIR: &str = "tasks";
pub const LEASES_DIR: &str = "leases";
pub const METADATA_DIR: &str = "metadata";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BobbinConfig {
    /// Root holding `tasks/`, `leases/` and `metadata/`.
    pub data_dir: PathBuf,
    pub lease_duration: Duration,
    pub retention: Duration,
    pub reap_interval: Duration,
    pub lease_sweep_interval: Duration,
}

impl BobbinConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.data_dir.join(TASKS_DIR)
    }

    pub fn leases_dir(&self) -> PathBuf {
        self.data_dir.join(LEASES_DIR)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join(METADATA_DIR)
    }

    /// Every directory the store expects to exist, in creation order.
    pub fn required_dirs(&self) -> [PathBuf; 4] {
        [
            self.data_dir.clone(),
            self.metadata_dir(),
            self.leases_dir(),
            self.tasks_dir(),
        ]
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for BobbinConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("database"),
            lease_duration: DEFAULT_LEASE_DURATION,
            retention: DEFAULT_RETENTION,
            reap_interval: DEFAULT_REAP_INTERVAL,
            lease_sweep_interval: DEFAULT_LEASE_SWEEP_INTERVAL,
        }
    }
}
