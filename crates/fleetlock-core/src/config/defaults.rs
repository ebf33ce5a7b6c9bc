//! Default configuration values

use std::path::PathBuf;

use super::types::LockConfig;

pub const DEFAULT_ROOT_MOUNT_POINT: &str = "/mnt/root";
pub const DEFAULT_LOCK_DIR: &str = "tmp/fleet-agent/services";
pub const DEFAULT_STATE_MOUNT_POINT: &str = "/mnt/state";
pub const DEFAULT_LOCKFILE_BINARY: &str = "lockfile";
/// `nobody`
pub const DEFAULT_LOCKFILE_UID: u32 = 65534;

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            root_mount_point: PathBuf::from(DEFAULT_ROOT_MOUNT_POINT),
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            state_mount_point: PathBuf::from(DEFAULT_STATE_MOUNT_POINT),
            lockfile_binary: PathBuf::from(DEFAULT_LOCKFILE_BINARY),
            lockfile_uid: DEFAULT_LOCKFILE_UID,
            lock_override: false,
        }
    }
}
