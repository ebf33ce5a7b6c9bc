//! Scoped lock ownership with guaranteed release.
//!
//! Release on the normal path is async and explicit. If the owning future is
//! dropped first (cancellation, panic unwinding), `Drop` releases
//! synchronously instead. Either way lock files go before the write lock.

use std::path::PathBuf;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use crate::{lockfile::AdvisoryLockfile, AppId};

/// Lock files taken by one coordinator call.
#[derive(Debug)]
pub(crate) struct HeldLockfiles {
    lockfile: AdvisoryLockfile,
    paths: Vec<PathBuf>,
}

impl HeldLockfiles {
    pub(crate) const fn new(lockfile: AdvisoryLockfile) -> Self {
        Self {
            lockfile,
            paths: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Release in reverse acquisition order. Failures are logged, never raised:
    /// this runs while another error or result is already on its way out.
    ///
    /// A path stays tracked until its release has finished, so a cancelled
    /// release is completed by `Drop`.
    pub(crate) async fn release_all(&mut self) {
        while let Some(path) = self.paths.last().cloned() {
            if let Err(e) = self.lockfile.release(&path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to release lock file, leaving it for exit cleanup"
                );
            }
            self.paths.pop();
        }
    }
}

impl Drop for HeldLockfiles {
    fn drop(&mut self) {
        while let Some(path) = self.paths.pop() {
            self.lockfile.release_sync(&path);
        }
    }
}

/// An acquired application update lock.
///
/// Field order is drop order: lock files are released before the write lock,
/// so no in-process waiter sees the write lock free while a lock file remains.
#[derive(Debug)]
pub(crate) struct LockHandle {
    lockfiles: HeldLockfiles,
    _write: OwnedRwLockWriteGuard<()>,
    app_id: AppId,
}

impl LockHandle {
    pub(crate) const fn new(
        lockfiles: HeldLockfiles,
        write: OwnedRwLockWriteGuard<()>,
        app_id: AppId,
    ) -> Self {
        Self {
            lockfiles,
            _write: write,
            app_id,
        }
    }

    pub(crate) async fn release(mut self) {
        self.lockfiles.release_all().await;
        tracing::debug!(app_id = %self.app_id, "Released update lock");
    }
}

/// Shared, read-only hold on an application's update lock.
///
/// Excludes writers for the same application until dropped or released.
#[derive(Debug)]
pub struct ReadLockGuard {
    _read: OwnedRwLockReadGuard<()>,
    app_id: AppId,
}

impl ReadLockGuard {
    pub(crate) const fn new(read: OwnedRwLockReadGuard<()>, app_id: AppId) -> Self {
        Self { _read: read, app_id }
    }

    #[must_use]
    pub const fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn release(self) {
        drop(self);
    }
}
