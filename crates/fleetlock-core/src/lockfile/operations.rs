//! Lock file acquisition and release.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    primitive::{CreateFailure, ExclusiveCreate},
    registry,
    types::{Identity, LockfileError},
};

/// World-writable with the sticky bit, so the unprivileged identity can create
/// files in a directory a privileged actor made.
#[cfg(unix)]
const SHARED_DIR_MODE: u32 = 0o1777;

/// Cross-process exclusive lock backed by atomic file creation.
#[derive(Debug, Clone)]
pub struct AdvisoryLockfile {
    primitive: Arc<dyn ExclusiveCreate>,
}

impl AdvisoryLockfile {
    #[must_use]
    pub fn new(primitive: Arc<dyn ExclusiveCreate>) -> Self {
        Self { primitive }
    }

    /// Take the lock file at `path` as `identity`.
    ///
    /// Never retries. The parent directory must already exist.
    ///
    /// Cancel safe: if this future is dropped while the create is running, a
    /// file it goes on to create is released as soon as it appears.
    ///
    /// # Errors
    ///
    /// - `AlreadyHeld` if the file exists
    /// - `Io` if the parent directory permissions cannot be set
    /// - `Primitive` for any other failure of the exclusive-create primitive
    ///   or if the create task panicked
    pub async fn acquire(&self, path: &Path, identity: Identity) -> Result<(), LockfileError> {
        if let Some(parent) = path.parent() {
            share_directory(parent).await.map_err(|e| LockfileError::Io {
                path: parent.to_path_buf(),
                source: e.into(),
            })?;
        }

        // The create runs detached so that it finishes even if this future is
        // dropped. Its output is released on drop unless claimed below.
        let primitive = Arc::clone(&self.primitive);
        let target = path.to_path_buf();
        let task = tokio::spawn(async move {
            primitive.create(&target, identity).await?;
            registry::record(&target);
            Ok::<_, CreateFailure>(UnclaimedLockfile::new(target))
        });

        match task.await {
            Ok(Ok(created)) => {
                created.claim();
                tracing::debug!(path = %path.display(), "Acquired lock file");
                Ok(())
            }
            Ok(Err(CreateFailure::AlreadyExists)) => Err(LockfileError::AlreadyHeld {
                path: path.to_path_buf(),
            }),
            Ok(Err(CreateFailure::Failed { code, detail })) => Err(LockfileError::Primitive {
                path: path.to_path_buf(),
                code,
                detail,
            }),
            Err(e) => Err(LockfileError::Primitive {
                path: path.to_path_buf(),
                code: None,
                detail: format!("create task failed: {e}"),
            }),
        }
    }

    /// Delete the lock file at `path`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be removed. The registry
    /// entry is kept in that case so exit cleanup tries again.
    pub async fn release(&self, path: &Path) -> Result<(), LockfileError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LockfileError::Io {
                    path: path.to_path_buf(),
                    source: e.into(),
                })
            }
        }
        registry::forget(path);
        tracing::debug!(path = %path.display(), "Released lock file");
        Ok(())
    }

    /// Synchronous best-effort release, for drop paths and shutdown.
    ///
    /// Swallows errors.
    pub fn release_sync(&self, path: &Path) {
        remove_and_forget(path);
    }

    /// Lock files this process currently holds.
    #[must_use]
    pub fn held() -> Vec<PathBuf> {
        registry::snapshot()
    }
}

/// A lock file whose creator may have stopped waiting for it.
///
/// Dropping it releases the file. The caller that asked for the lock calls
/// [`claim`](Self::claim) to take ownership instead.
#[derive(Debug)]
struct UnclaimedLockfile {
    path: Option<PathBuf>,
}

impl UnclaimedLockfile {
    const fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn claim(mut self) {
        self.path = None;
    }
}

impl Drop for UnclaimedLockfile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            tracing::info!(path = %path.display(), "Releasing lock file created after its caller gave up");
            remove_and_forget(&path);
        }
    }
}

fn remove_and_forget(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => registry::forget(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => registry::forget(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to release lock file");
        }
    }
}

#[cfg(unix)]
async fn share_directory(dir: &Path) -> io::Result<()> {
    use std::{fs::Permissions, os::unix::fs::PermissionsExt};

    tokio::fs::set_permissions(dir, Permissions::from_mode(SHARED_DIR_MODE)).await
}

#[cfg(not(unix))]
async fn share_directory(dir: &Path) -> io::Result<()> {
    tokio::fs::metadata(dir).await.map(|_| ())
}
