//! Deterministic lock file locations.

use std::path::{Path, PathBuf};

use crate::AppId;

/// Current lock file name.
pub const LOCK_FILE: &str = "updates.lock";
/// Historical lock file name, still honored by older tooling.
pub const LEGACY_LOCK_FILE: &str = "resin-updates.lock";

/// `<base>/<app_id>`
#[must_use]
pub fn app_lock_dir(base: &Path, app_id: AppId) -> PathBuf {
    base.join(app_id.to_string())
}

/// `<base>/<app_id>/<service>`
#[must_use]
pub fn service_lock_dir(base: &Path, app_id: AppId, service: &str) -> PathBuf {
    app_lock_dir(base, app_id).join(service)
}

/// Both lock files for a service, in acquisition order.
#[must_use]
pub fn lock_paths(base: &Path, app_id: AppId, service: &str) -> [PathBuf; 2] {
    let dir = service_lock_dir(base, app_id, service);
    [dir.join(LOCK_FILE), dir.join(LEGACY_LOCK_FILE)]
}
