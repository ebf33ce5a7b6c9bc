//! The configuration store consulted at lock time.
//!
//! The lock coordinator only reads from the store. Values may change between
//! reads; no snapshot isolation is provided.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::LockConfig;

/// Keys the lock subsystem reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Clear stale locks before acquiring them.
    LockOverride,
}

impl ConfigKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LockOverride => "lockOverride",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Text(String),
}

impl ConfigValue {
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no value stored for '{0}'")]
    Missing(ConfigKey),

    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to agent configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: ConfigKey) -> Result<ConfigValue, ConfigError>;
}

/// In-memory store, seeded from [`LockConfig`] and writable at runtime.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<ConfigKey, ConfigValue>>,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        let values = HashMap::from([(
            ConfigKey::LockOverride,
            ConfigValue::Bool(config.lock_override),
        )]);
        Self {
            values: RwLock::new(values),
        }
    }

    pub async fn set(&self, key: ConfigKey, value: ConfigValue) {
        self.values.write().await.insert(key, value);
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: ConfigKey) -> Result<ConfigValue, ConfigError> {
        self.values
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(ConfigError::Missing(key))
    }
}
