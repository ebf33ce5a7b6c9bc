//! Configuration loading from files and environment (Immutable functional pattern)
//!
//! All operations return new instances rather than mutating in place.

use std::path::{Path, PathBuf};

use super::types::{LockConfig, LockConfigFile};
use crate::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources with hierarchy.
///
/// `explicit` is the config file chosen by the embedding agent. Unlike the
/// global file, it must exist when given.
///
/// # Errors
///
/// Returns error if:
/// - A config file is malformed TOML or has unknown keys
/// - The explicit config file cannot be read
/// - An environment override has an invalid value
/// - The merged configuration fails validation
pub fn load_config(explicit: Option<&Path>) -> Result<LockConfig> {
    load_layers(global_config_path().as_deref(), explicit)
}

/// [`load_config`] with the global config file location supplied by the
/// caller. `None` skips the global layer.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_layers(global: Option<&Path>, explicit: Option<&Path>) -> Result<LockConfig> {
    let config = LockConfig::default();

    let config = match global {
        Some(global_path) if global_path.is_file() => {
            config.merge(load_toml_file(global_path)?)
        }
        _ => config,
    };

    let config = match explicit {
        Some(path) => config.merge(load_toml_file(path)?),
        None => config,
    };

    let config = config.apply_env_vars()?;
    config.validate()?;
    Ok(config)
}

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "fleetlock")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Load a TOML file into a config layer
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML for
/// [`LockConfigFile`].
pub fn load_toml_file(path: &Path) -> Result<LockConfigFile> {
    if path.is_dir() {
        return Err(Error::Config(format!(
            "config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGE / ENVIRONMENT / VALIDATION
// ═══════════════════════════════════════════════════════════════════════════

impl LockConfig {
    /// Overlay a file layer; present fields win.
    #[must_use]
    pub fn merge(self, layer: LockConfigFile) -> Self {
        Self {
            root_mount_point: layer.root_mount_point.unwrap_or(self.root_mount_point),
            lock_dir: layer.lock_dir.unwrap_or(self.lock_dir),
            state_mount_point: layer.state_mount_point.unwrap_or(self.state_mount_point),
            lockfile_binary: layer.lockfile_binary.unwrap_or(self.lockfile_binary),
            lockfile_uid: layer.lockfile_uid.unwrap_or(self.lockfile_uid),
            lock_override: layer.lock_override.unwrap_or(self.lock_override),
        }
    }

    /// Apply `FLEETLOCK_*` environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    pub fn apply_env_vars(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FLEETLOCK_ROOT_MOUNT_POINT") {
            self.root_mount_point = PathBuf::from(value);
        }

        if let Some(value) = lookup("FLEETLOCK_LOCK_DIR") {
            self.lock_dir = PathBuf::from(value);
        }

        if let Some(value) = lookup("FLEETLOCK_STATE_MOUNT_POINT") {
            self.state_mount_point = PathBuf::from(value);
        }

        if let Some(value) = lookup("FLEETLOCK_LOCKFILE_BIN") {
            self.lockfile_binary = PathBuf::from(value);
        }

        if let Some(value) = lookup("FLEETLOCK_LOCKFILE_UID") {
            self.lockfile_uid = value.trim().parse().map_err(|e| {
                Error::Config(format!("Invalid FLEETLOCK_LOCKFILE_UID value '{value}': {e}"))
            })?;
        }

        if let Some(value) = lookup("FLEETLOCK_LOCK_OVERRIDE") {
            self.lock_override = parse_flag(&value).ok_or_else(|| {
                Error::Config(format!(
                    "Invalid FLEETLOCK_LOCK_OVERRIDE value '{value}': expected true/false/1/0"
                ))
            })?;
        }

        Ok(self)
    }

    /// Validate the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a mount point is relative or the lock tool is unset.
    pub fn validate(&self) -> Result<()> {
        if !self.root_mount_point.is_absolute() {
            return Err(Error::Config(format!(
                "root_mount_point must be absolute, got {}",
                self.root_mount_point.display()
            )));
        }

        if !self.state_mount_point.is_absolute() {
            return Err(Error::Config(format!(
                "state_mount_point must be absolute, got {}",
                self.state_mount_point.display()
            )));
        }

        if self.lockfile_binary.as_os_str().is_empty() {
            return Err(Error::Config("lockfile_binary cannot be empty".into()));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
