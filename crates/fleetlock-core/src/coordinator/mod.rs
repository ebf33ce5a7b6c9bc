//! Per-application update lock.
//!
//! Serializes update operations on an application across this process's tasks
//! (a keyed read/write lock) and across cooperating processes (one lock file
//! pair per service directory).
//!
//! # Protocol
//!
//! 1. Read `lockOverride` from the config store.
//! 2. Take the in-process write lock for the application.
//! 3. List `<base>/<app_id>/`; each subdirectory is a service. A missing
//!    directory means no services.
//! 4. For each service, for `updates.lock` then `resin-updates.lock`: clear a
//!    pre-existing file when forced, then take it.
//! 5. Contention unwinds everything and fails with `UpdatesLocked`. Any other
//!    failure unwinds everything and surfaces unchanged.
//! 6. Run the critical section, then release lock files, then the write lock.

mod handle;
mod keyed;

use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use handle::ReadLockGuard;
use handle::{HeldLockfiles, LockHandle};
use keyed::KeyedRwLock;

use crate::{
    config::{ConfigKey, ConfigStore, LockConfig},
    lockfile::{
        app_lock_dir, lock_paths, AdvisoryLockfile, Identity, LockfileCommand, LockfileError,
    },
    AppId, Error, LockedReason, Result,
};

/// Per-call locking options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Clear pre-existing lock files before acquiring.
    pub force: bool,
    /// Run the critical section without any locking.
    pub skip_lock: bool,
}

impl LockOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            force: false,
            skip_lock: false,
        }
    }

    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub const fn with_skip_lock(mut self, skip_lock: bool) -> Self {
        self.skip_lock = skip_lock;
        self
    }
}

/// Coordinates application update locks.
///
/// Cheap to clone; clones share the same in-process locks.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    base_dir: PathBuf,
    identity: Identity,
    lockfile: AdvisoryLockfile,
    config: Arc<dyn ConfigStore>,
    locks: KeyedRwLock<AppId>,
}

impl LockCoordinator {
    #[must_use]
    pub fn new(
        base_dir: impl Into<PathBuf>,
        lockfile: AdvisoryLockfile,
        identity: Identity,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            identity,
            lockfile,
            config,
            locks: KeyedRwLock::default(),
        }
    }

    /// Coordinator using the `lockfile` tool under the configured uid.
    #[must_use]
    pub fn from_config(config: &LockConfig, store: Arc<dyn ConfigStore>) -> Self {
        let primitive = Arc::new(LockfileCommand::new(&config.lockfile_binary));
        Self::new(
            config.lock_base_dir(),
            AdvisoryLockfile::new(primitive),
            Identity::user(config.lockfile_uid),
            store,
        )
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Run `critical_section` while holding the update lock for `app_id`.
    ///
    /// With `skip_lock`, or without an application, the critical section runs
    /// immediately and nothing is locked.
    ///
    /// The critical section's own result and error pass through untouched.
    /// Lock failures are converted into `E` via `From<Error>`.
    ///
    /// # Errors
    ///
    /// - `UpdatesLocked` if a service lock file is held by someone else
    /// - `LockPrimitive` / `Io` if the environment broke while locking
    /// - `InternalInconsistency` if the config store could not answer
    /// - whatever `critical_section` returns
    pub async fn with_lock<F, Fut, T, E>(
        &self,
        app_id: Option<AppId>,
        options: LockOptions,
        critical_section: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let app_id = match app_id {
            Some(app_id) if !options.skip_lock => app_id,
            _ => return critical_section().await,
        };

        let handle = self.acquire(app_id, options.force).await?;
        let result = critical_section().await;
        handle.release().await;
        result
    }

    /// Take a shared hold on `app_id` for read-only inspection.
    ///
    /// Never touches lock files and ignores `lockOverride`.
    pub async fn read_lock(&self, app_id: AppId) -> ReadLockGuard {
        ReadLockGuard::new(self.locks.read(app_id).await, app_id)
    }

    async fn acquire(&self, app_id: AppId, force: bool) -> Result<LockHandle> {
        let lock_override = self.lock_override().await?;
        let clear_existing = force || lock_override;

        let write = self.locks.write(app_id).await;
        if clear_existing {
            tracing::info!(
                app_id = %app_id,
                force,
                lock_override,
                "Clearing existing lock files before acquiring"
            );
        }
        let mut held = HeldLockfiles::new(self.lockfile.clone());

        let services = list_services(&app_lock_dir(&self.base_dir, app_id)).await?;

        for service in &services {
            for path in lock_paths(&self.base_dir, app_id, service) {
                if let Err(e) = self.take(&path, clear_existing).await {
                    held.release_all().await;
                    return Err(classify(e, app_id, service));
                }
                held.push(path);
            }
        }

        tracing::debug!(app_id = %app_id, services = services.len(), "Acquired update lock");
        Ok(LockHandle::new(held, write, app_id))
    }

    async fn take(&self, path: &Path, clear_existing: bool) -> Result<(), LockfileError> {
        if clear_existing {
            self.lockfile.release(path).await?;
        }
        self.lockfile.acquire(path, self.identity).await
    }

    async fn lock_override(&self) -> Result<bool> {
        let value = self.config.get(ConfigKey::LockOverride).await.map_err(|e| {
            Error::InternalInconsistency(format!("reading {}: {e}", ConfigKey::LockOverride))
        })?;

        value.as_bool().ok_or_else(|| {
            Error::InternalInconsistency(format!(
                "{} must be a boolean, got {value:?}",
                ConfigKey::LockOverride
            ))
        })
    }
}

/// Contention becomes `UpdatesLocked`; everything else keeps its meaning.
fn classify(err: LockfileError, app_id: AppId, service: &str) -> Error {
    match err {
        LockfileError::AlreadyHeld { .. } => Error::UpdatesLocked(LockedReason::Service {
            app_id,
            service_name: service.to_string(),
        }),
        LockfileError::Primitive { path, code, detail } => {
            Error::LockPrimitive { path, code, detail }
        }
        LockfileError::Io { path, source } => Error::Io { path, source },
    }
}

/// Service directories under an application's lock directory, sorted by name.
async fn list_services(app_dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(app_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(app_dir, e)),
    };

    let mut services = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io(app_dir, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| Error::io(entry.path(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => services.push(name),
            Err(name) => {
                tracing::warn!(dir = ?name, "Skipping non UTF-8 service lock directory");
            }
        }
    }

    services.sort();
    Ok(services)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::{ConfigValue, MemoryConfigStore},
        lockfile::NativeCreate,
    };

    fn coordinator(base: &Path, store: Arc<MemoryConfigStore>) -> LockCoordinator {
        LockCoordinator::new(
            base,
            AdvisoryLockfile::new(Arc::new(NativeCreate)),
            Identity::inherit(),
            store,
        )
    }

    fn default_store() -> Arc<MemoryConfigStore> {
        Arc::new(MemoryConfigStore::from_config(&LockConfig::default()))
    }

    #[test]
    fn test_lock_options_builder() {
        let options = LockOptions::new().with_force(true).with_skip_lock(true);
        assert!(options.force);
        assert!(options.skip_lock);
        assert_eq!(LockOptions::new(), LockOptions::default());
    }

    #[tokio::test]
    async fn test_list_services_missing_dir_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        assert!(list_services(&dir.path().join("7")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_services_sorted_dirs_only() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("worker"))?;
        std::fs::create_dir(dir.path().join("api"))?;
        std::fs::write(dir.path().join("stray-file"), "")?;

        assert_eq!(list_services(dir.path()).await?, vec!["api", "worker"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_override_is_internal_inconsistency(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let coordinator = coordinator(dir.path(), Arc::new(MemoryConfigStore::new()));

        let result = coordinator
            .with_lock(Some(AppId::new(1)), LockOptions::new(), || async {
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(result, Err(Error::InternalInconsistency(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_boolean_override_is_internal_inconsistency(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let store = default_store();
        store
            .set(ConfigKey::LockOverride, ConfigValue::Text("yes".into()))
            .await;
        let coordinator = coordinator(dir.path(), store);

        let result = coordinator
            .with_lock(Some(AppId::new(1)), LockOptions::new(), || async {
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(result, Err(Error::InternalInconsistency(msg)) if msg.contains("lockOverride")));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_app_id_runs_unlocked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        // Even a broken config store is never consulted.
        let coordinator = coordinator(dir.path(), Arc::new(MemoryConfigStore::new()));

        let value = coordinator
            .with_lock(None, LockOptions::new(), || async { Ok::<_, Error>(5) })
            .await?;
        assert_eq!(value, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_lock_blocks_writer_until_released() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = TempDir::new()?;
        let coordinator = coordinator(dir.path(), default_store());
        let app = AppId::new(3);

        let guard = coordinator.read_lock(app).await;
        assert_eq!(guard.app_id(), app);

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            coordinator.with_lock(Some(app), LockOptions::new(), || async { Ok::<_, Error>(()) }),
        )
        .await;
        assert!(blocked.is_err(), "writer must wait for the reader");

        guard.release();
        coordinator
            .with_lock(Some(app), LockOptions::new(), || async { Ok::<_, Error>(()) })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_readers_share() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let coordinator = coordinator(dir.path(), default_store());

        let _first = coordinator.read_lock(AppId::new(9)).await;
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            coordinator.read_lock(AppId::new(9)),
        )
        .await;
        assert!(second.is_ok());
        Ok(())
    }
}
