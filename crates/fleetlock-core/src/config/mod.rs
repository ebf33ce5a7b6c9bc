//! Configuration loading and the configuration store seam.
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/fleetlock/config.toml
//! 3. Explicit config file passed by the embedding agent
//! 4. Environment variables: FLEETLOCK_*
//!
//! # Example Config
//!
//! ```toml
//! root_mount_point = "/mnt/root"
//! lock_dir = "tmp/fleet-agent/services"
//! state_mount_point = "/mnt/state"
//! lockfile_binary = "lockfile"
//! lockfile_uid = 65534
//! lock_override = false
//! ```
//!
//! # Module Structure
//!
//! - `types`: Configuration structure definitions
//! - `defaults`: Default value implementations
//! - `load`: Loading from files and environment, merging, validation
//! - `store`: The key-value [`ConfigStore`] consulted at lock time

mod defaults;
mod load;
mod store;
mod types;

#[cfg(test)]
mod tests_loading;

pub use defaults::{
    DEFAULT_LOCKFILE_BINARY, DEFAULT_LOCKFILE_UID, DEFAULT_LOCK_DIR, DEFAULT_ROOT_MOUNT_POINT,
    DEFAULT_STATE_MOUNT_POINT,
};
pub use load::{global_config_path, load_config, load_layers, load_toml_file};
pub use store::{ConfigError, ConfigKey, ConfigStore, ConfigValue, MemoryConfigStore};
pub use types::{LockConfig, LockConfigFile};
