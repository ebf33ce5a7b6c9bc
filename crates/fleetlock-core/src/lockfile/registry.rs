//! Process-wide registry of lock files held by this process.
//!
//! # Lifecycle
//!
//! - Starts empty when the process starts.
//! - [`AdvisoryLockfile`](super::AdvisoryLockfile) inserts a path after a
//!   successful create and removes it on release. Nothing else mutates it.
//! - At exit notification, [`release_all_sync`] drains it and deletes every
//!   remaining file.
//!
//! This registry does not provide mutual exclusion. Two processes never see
//! each other's registry; the exclusive-create primitive is what keeps them
//! apart. The registry only stops a dying process from leaking lock files.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex, MutexGuard, PoisonError},
};

static HELD_LOCKS: LazyLock<Mutex<BTreeMap<PathBuf, bool>>> =
    LazyLock::new(|| Mutex::new(BTreeMap::new()));

fn held_locks() -> MutexGuard<'static, BTreeMap<PathBuf, bool>> {
    // A panic while holding the guard cannot leave the map half-updated.
    HELD_LOCKS.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(super) fn record(path: &Path) {
    held_locks().insert(path.to_path_buf(), true);
}

pub(super) fn forget(path: &Path) {
    held_locks().remove(path);
}

/// Paths currently recorded as held by this process.
#[must_use]
pub fn snapshot() -> Vec<PathBuf> {
    held_locks()
        .iter()
        .filter(|(_, held)| **held)
        .map(|(path, _)| path.clone())
        .collect()
}

#[must_use]
pub fn is_held(path: &Path) -> bool {
    held_locks().get(path).copied().unwrap_or(false)
}

/// Result of an exit-time cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub released: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drain the registry, deleting every recorded lock file.
///
/// Never fails: shutdown must not raise. Files that are already gone count as
/// released.
pub fn release_all_sync() -> CleanupReport {
    let paths = std::mem::take(&mut *held_locks());

    paths
        .into_keys()
        .fold(CleanupReport::default(), |mut report, path| {
            match std::fs::remove_file(&path) {
                Ok(()) => report.released.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.released.push(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to release lock file at exit");
                    report.failed.push(path);
                }
            }
            report
        })
}
