//! Configuration file support for Limber.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/limber/config.toml`.

use crate::regimen::Selection;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Catalog source configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Catalog YAML file. Defaults to `<data_dir>/stretches.yaml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Session view defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// `auto`, `short`, `full` or `all`
    #[serde(default = "default_regimen")]
    pub default_regimen: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_regimen: default_regimen(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("limber")
}

fn default_regimen() -> String {
    "auto".into()
}

pub const CATALOG_FILE_NAME: &str = "stretches.yaml";
pub const HISTORY_FILE_NAME: &str = "history.jsonl";

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("limber")
            .join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values that parse as TOML but make no sense
    pub fn validate(&self) -> Result<()> {
        self.default_selection().map(|_| ())
    }

    pub fn default_selection(&self) -> Result<Selection> {
        self.session.default_regimen.parse()
    }

    /// Catalog file, relative to `data_dir` unless configured explicitly
    pub fn catalog_path(&self, data_dir: &Path) -> PathBuf {
        self.catalog
            .path
            .clone()
            .unwrap_or_else(|| data_dir.join(CATALOG_FILE_NAME))
    }

    pub fn history_path(data_dir: &Path) -> PathBuf {
        data_dir.join(HISTORY_FILE_NAME)
    }
}
