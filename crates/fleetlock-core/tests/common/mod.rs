//! Common test utilities for fleetlock-core integration tests

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc
)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use fleetlock_core::{
    config::{ConfigKey, ConfigValue, LockConfig, MemoryConfigStore},
    lockfile::{lock_paths, CreateFailure, ExclusiveCreate, NativeCreate, LOCK_FILE},
    AdvisoryLockfile, AppId, Identity, LockCoordinator,
};
use tempfile::TempDir;

/// A lock tree in a temp dir plus a coordinator pointed at it.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryConfigStore>,
    pub coordinator: LockCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_primitive(Arc::new(NativeCreate))
    }

    pub fn with_primitive(primitive: Arc<dyn ExclusiveCreate>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = Arc::new(MemoryConfigStore::from_config(&LockConfig::default()));
        let coordinator = LockCoordinator::new(
            dir.path(),
            AdvisoryLockfile::new(primitive),
            Identity::inherit(),
            store.clone(),
        );
        Self {
            dir,
            store,
            coordinator,
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    /// Register a service as needing isolation.
    pub fn add_service(&self, app_id: AppId, service: &str) -> [PathBuf; 2] {
        let paths = lock_paths(self.base(), app_id, service);
        if let Some(parent) = paths[0].parent() {
            std::fs::create_dir_all(parent).expect("service lock dir");
        }
        paths
    }

    pub async fn set_override(&self, value: bool) {
        self.store
            .set(ConfigKey::LockOverride, ConfigValue::Bool(value))
            .await;
    }
}

/// Native create that fails fatally for one file name.
#[derive(Debug)]
pub struct FailOn {
    pub file_name: &'static str,
    pub code: i32,
}

#[async_trait]
impl ExclusiveCreate for FailOn {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure> {
        if path.file_name().and_then(|n| n.to_str()) == Some(self.file_name) {
            return Err(CreateFailure::Failed {
                code: Some(self.code),
                detail: format!("{}: Permission denied", path.display()),
            });
        }
        NativeCreate.create(path, identity).await
    }
}

/// Fails on `file_name` after making the sibling `updates.lock` impossible to
/// remove: it is swapped for a directory, which `remove_file` refuses even
/// for root.
#[derive(Debug)]
pub struct JamThenFail {
    pub file_name: &'static str,
    pub failure: CreateFailure,
}

#[async_trait]
impl ExclusiveCreate for JamThenFail {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure> {
        if path.file_name().and_then(|n| n.to_str()) != Some(self.file_name) {
            return NativeCreate.create(path, identity).await;
        }
        let sibling = path.with_file_name(LOCK_FILE);
        std::fs::remove_file(&sibling).expect("sibling lock file");
        std::fs::create_dir(&sibling).expect("jam sibling");
        Err(self.failure.clone())
    }
}

/// Slows every create down, so callers can give up while one is in flight.
#[derive(Debug)]
pub struct Slow {
    pub delay: std::time::Duration,
}

#[async_trait]
impl ExclusiveCreate for Slow {
    async fn create(&self, path: &Path, identity: Identity) -> Result<(), CreateFailure> {
        tokio::time::sleep(self.delay).await;
        NativeCreate.create(path, identity).await
    }
}

pub fn exists_all(paths: &[PathBuf]) -> bool {
    paths.iter().all(|p| p.exists())
}

pub fn exists_none(paths: &[PathBuf]) -> bool {
    paths.iter().all(|p| !p.exists())
}
