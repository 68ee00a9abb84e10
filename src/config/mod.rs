//! # Configuration
//!
//! TOML configuration for the tracker binary. The library itself only needs
//! a [`StateStore`] and a [`ProgressionPolicy`]; this module turns a config
//! file into both.
//!
//! ## Sections
//!
//! - [`StorageConfig`] - where the snapshot lives and which backend holds it
//! - [`LoggingConfig`] - default log level and optional log file
//! - [`ProgressionConfig`] - tunable progression rules
//!
//! ## Usage
//!
//! ```rust,no_run
//! use usaco_treasure::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     let store = config.storage.open_store()?;
//!     println!("snapshot key: {}", config.storage.state_key);
//!     # drop(store);
//!     Ok(())
//! }
//! ```
//!
//! ## File Format
//!
//! ```toml
//! [storage]
//! data_dir = "data"
//! state_key = "usaco-treasure-state"
//! backend = "json"
//!
//! [logging]
//! level = "info"
//!
//! [progression]
//! allow_repeat_rewards = true
//! ```
//!
//! Every section is optional; missing values fall back to the defaults above.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::progress::engine::ProgressionPolicy;
use crate::progress::storage::{JsonFileStore, SledStore, StateStore, DEFAULT_STATE_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document per key under `data_dir`
    #[default]
    Json,
    /// sled database at `<data_dir>/snapshots.db`
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_state_key")]
    pub state_key: String,
    #[serde(default)]
    pub backend: StorageBackend,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_state_key() -> String {
    DEFAULT_STATE_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_key: default_state_key(),
            backend: StorageBackend::default(),
        }
    }
}

impl StorageConfig {
    /// Open the configured backend, creating directories as needed.
    pub fn open_store(&self) -> Result<Box<dyn StateStore>> {
        let store: Box<dyn StateStore> = match self.backend {
            StorageBackend::Json => Box::new(
                JsonFileStore::open(&self.data_dir)
                    .map_err(|e| anyhow!("Failed to open data dir {}: {}", self.data_dir, e))?,
            ),
            StorageBackend::Sled => {
                let path = Path::new(&self.data_dir).join("snapshots.db");
                Box::new(
                    SledStore::open(&path)
                        .map_err(|e| anyhow!("Failed to open sled db {}: {}", path.display(), e))?,
                )
            }
        };
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Award coins again when a completed problem is completed once more.
    #[serde(default = "default_allow_repeat_rewards")]
    pub allow_repeat_rewards: bool,
}

fn default_allow_repeat_rewards() -> bool {
    true
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            allow_repeat_rewards: default_allow_repeat_rewards(),
        }
    }
}

impl ProgressionConfig {
    pub fn policy(&self) -> ProgressionPolicy {
        ProgressionPolicy {
            allow_repeat_rewards: self.allow_repeat_rewards,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Load `path` when it exists, otherwise use built-in defaults.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            log::debug!("config {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
