//! Loading-focused tests for configuration
//!
//! Tests for file parsing, layer merging, environment overrides, and validation.

use std::{collections::HashMap, fs, path::PathBuf};

use tempfile::TempDir;

use crate::config::{load_layers, load_toml_file, LockConfig, LockConfigFile};
use crate::Error;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_load_toml_file_partial_layer() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "lock_override = true\nlockfile_uid = 1000\n")?;

    let layer = load_toml_file(&path)?;
    assert_eq!(layer.lock_override, Some(true));
    assert_eq!(layer.lockfile_uid, Some(1000));
    assert_eq!(layer.root_mount_point, None);
    Ok(())
}

#[test]
fn test_load_toml_file_rejects_unknown_keys() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "lock_overide = true\n")?;

    let result = load_toml_file(&path);
    assert!(matches!(result, Err(Error::Config(_))));
    Ok(())
}

#[test]
fn test_load_toml_file_rejects_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let result = load_toml_file(dir.path());
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("directory")));
    Ok(())
}

#[test]
fn test_explicit_file_must_exist() {
    let result = load_layers(None, Some(&PathBuf::from("/nonexistent/fleetlock.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_missing_global_file_is_skipped() {
    let result = load_layers(Some(&PathBuf::from("/nonexistent/config.toml")), None);
    assert!(result.is_ok());
}

#[test]
fn test_explicit_layer_overrides_global_layer() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let global = dir.path().join("global.toml");
    let explicit = dir.path().join("agent.toml");
    fs::write(&global, "lockfile_uid = 1000\nlock_dir = \"/var/lock/apps\"\n")?;
    fs::write(&explicit, "lockfile_uid = 2000\n")?;

    let config = load_layers(Some(&global), Some(&explicit))?;
    assert_eq!(config.lockfile_uid, 2000);
    assert_eq!(config.lock_base_dir(), PathBuf::from("/var/lock/apps"));
    Ok(())
}

#[test]
fn test_merge_overrides_only_present_fields() {
    let layer = LockConfigFile {
        lock_dir: Some(PathBuf::from("/var/lock/apps")),
        ..LockConfigFile::default()
    };
    let merged = LockConfig::default().merge(layer);

    // An absolute lock_dir replaces the root mount entirely.
    assert_eq!(merged.lock_base_dir(), PathBuf::from("/var/lock/apps"));
    assert_eq!(merged.state_mount_point, PathBuf::from("/mnt/state"));
}

#[test]
fn test_env_overrides() -> crate::Result<()> {
    let config = LockConfig::default().apply_env(env_from(&[
        ("FLEETLOCK_LOCK_OVERRIDE", "1"),
        ("FLEETLOCK_LOCKFILE_UID", " 1234 "),
        ("FLEETLOCK_STATE_MOUNT_POINT", "/run/state"),
    ]))?;

    assert!(config.lock_override);
    assert_eq!(config.lockfile_uid, 1234);
    assert_eq!(config.state_mount_point, PathBuf::from("/run/state"));
    Ok(())
}

#[test]
fn test_env_invalid_flag_is_config_error() {
    let result =
        LockConfig::default().apply_env(env_from(&[("FLEETLOCK_LOCK_OVERRIDE", "maybe")]));
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("FLEETLOCK_LOCK_OVERRIDE")));
}

#[test]
fn test_env_invalid_uid_is_config_error() {
    let result = LockConfig::default().apply_env(env_from(&[("FLEETLOCK_LOCKFILE_UID", "-1")]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_relative_mounts() {
    let config = LockConfig {
        root_mount_point: PathBuf::from("mnt/root"),
        ..LockConfig::default()
    };
    assert!(config.validate().is_err());

    let config = LockConfig {
        state_mount_point: PathBuf::from("state"),
        ..LockConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_empty_binary() {
    let config = LockConfig {
        lockfile_binary: PathBuf::new(),
        ..LockConfig::default()
    };
    assert!(config.validate().is_err());
    assert!(LockConfig::default().validate().is_ok());
}
