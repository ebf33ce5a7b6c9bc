//! Host OS update (HUP) detection.
//!
//! The host's rollback services leave breadcrumb files on the state partition
//! while an update is being verified. Either breadcrumb means rebooting or
//! swapping containers now could break the update.
//!
//! Breadcrumbs are only observed here, never created or removed.

use std::path::{Path, PathBuf};

use futures::future::join_all;

use crate::{config::LockConfig, Error, LockedReason, Result};

pub const HEALTH_BREADCRUMB: &str = "rollback-health-breadcrumb";
pub const ALTBOOT_BREADCRUMB: &str = "rollback-altboot-breadcrumb";

/// Vetoes unsafe operations while a host update is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HupGuard {
    state_dir: PathBuf,
}

impl HupGuard {
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(config.state_dir())
    }

    #[must_use]
    pub fn breadcrumb_paths(&self) -> [PathBuf; 2] {
        [
            self.state_dir.join(HEALTH_BREADCRUMB),
            self.state_dir.join(ALTBOOT_BREADCRUMB),
        ]
    }

    /// Breadcrumbs currently present. Unreadable paths count as absent.
    pub async fn breadcrumbs_present(&self) -> Vec<PathBuf> {
        let paths = self.breadcrumb_paths();
        let checks = join_all(paths.iter().map(|path| exists(path))).await;

        paths
            .into_iter()
            .zip(checks)
            .filter_map(|(path, present)| present.then_some(path))
            .collect()
    }

    /// Check whether a host update is in progress.
    ///
    /// Returns `false` when it is safe to proceed. Returns `true` when an
    /// update is in progress but `force` overrides the veto: the caller
    /// proceeds because it was told to, not because it is safe.
    ///
    /// # Errors
    ///
    /// `UpdatesLocked` when a breadcrumb exists and `force` is false.
    pub async fn check_hup_in_progress(&self, force: bool) -> Result<bool> {
        let present = self.breadcrumbs_present().await;
        if present.is_empty() {
            return Ok(false);
        }

        tracing::warn!(
            breadcrumbs = ?present,
            force,
            "Host OS update in progress"
        );

        if force {
            Ok(true)
        } else {
            Err(Error::UpdatesLocked(LockedReason::HostUpdateInProgress))
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Could not check breadcrumb");
        false
    })
}
