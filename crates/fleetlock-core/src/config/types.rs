//! Configuration type definitions

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Fully resolved lock subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Where the host root filesystem is mounted inside the agent container.
    pub root_mount_point: PathBuf,
    /// Base directory of the per-application lock tree. Relative values are
    /// resolved against `root_mount_point`.
    pub lock_dir: PathBuf,
    /// Where the host state partition is mounted (breadcrumbs live here).
    pub state_mount_point: PathBuf,
    /// The external exclusive-create tool.
    pub lockfile_binary: PathBuf,
    /// Unprivileged uid the lock tool runs under.
    pub lockfile_uid: u32,
    /// Clear stale locks before acquiring, even without per-call `force`.
    pub lock_override: bool,
}

impl LockConfig {
    /// Absolute base directory holding `<app_id>/<service>/` lock directories.
    #[must_use]
    pub fn lock_base_dir(&self) -> PathBuf {
        self.root_mount_point.join(&self.lock_dir)
    }

    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_mount_point
    }
}

/// A config file layer. Every field is optional; present fields override the
/// layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfigFile {
    pub root_mount_point: Option<PathBuf>,
    pub lock_dir: Option<PathBuf>,
    pub state_mount_point: Option<PathBuf>,
    pub lockfile_binary: Option<PathBuf>,
    pub lockfile_uid: Option<u32>,
    pub lock_override: Option<bool>,
}
