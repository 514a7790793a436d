// Host configuration
// Loaded from ~/.config/deepsky/deepsky.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Debug flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Turn every area on.
    pub global: bool,
    /// Per-area flags.
    pub areas: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub debug: DebugSettings,

    /// Directory for per-feature settings files. `None` = platform config dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_dir: Option<PathBuf>,
}

impl HostConfig {
    /// Base directory for everything deepsky writes.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deepsky")
    }

    /// Get the host config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("deepsky.toml")
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::HostConfig(e.to_string()))
    }

    /// Load host config from disk, falling back to defaults
    ///
    /// A missing file is normal. A malformed one is logged and ignored:
    /// a broken config file must not stop a feature from running.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Error parsing {}: {}", path.display(), e);
                    log::warn!("Using default host config");
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Effective settings directory.
    pub fn settings_dir(&self) -> PathBuf {
        self.settings_dir.clone().unwrap_or_else(Self::config_dir)
    }
}
