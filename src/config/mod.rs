//! Configuration module for FilterFlow-RS
//!
//! This module handles application configuration including:
//! - Engine module location and its export/import names
//! - The host directory backing the engine's virtual filesystem
//! - Logging preferences
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.filterflow-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.filterflow-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.filterflow-rs\`
//!
//! # Files
//!
//! - `config.toml` - Application configuration
//! - `fs/` - Persistent root mounted into the engine
//! - `logs/` - Rolling log files (when file logging is enabled)
//!
//! # Example
//!
//! ```ignore
//! use filterflow_rs::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default();
//! config.engine.module_path = Some("gpac.wasm".into());
//! config.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{FilterFlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.filterflow-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default filter catalog filename
pub const CATALOG_FILE: &str = "filters.json";
pub const CODECS_FILE: &str = "codecs.json";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        FilterFlowError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            FilterFlowError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Persistent application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub filesystem: FilesystemSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Filter catalog JSON; defaults to `filters.json` in the app data dir
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the config from the default location
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            FilterFlowError::Config("Could not determine config path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load the config from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FilterFlowError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FilterFlowError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(CONFIG_FILE))
    }

    /// Save the config to an explicit path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FilterFlowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| FilterFlowError::Config(format!("Failed to write config: {}", e)))
    }

    /// Resolved catalog location
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog_path
            .clone()
            .or_else(|| app_data_dir().map(|p| p.join(CATALOG_FILE)))
    }

    /// Codec catalog location, next to the filter catalog
    pub fn codec_catalog_path(&self) -> Option<PathBuf> {
        match &self.catalog_path {
            Some(path) => Some(path.with_file_name(CODECS_FILE)),
            None => app_data_dir().map(|p| p.join(CODECS_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.engine.program_name, "gpac");
        assert_eq!(config.filesystem.guest_root, "/root");
        assert_eq!(config.filesystem.input_slot, "/root/video.mp4");
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.engine.module_path = Some(PathBuf::from("/opt/gpac/gpac.wasm"));
        config.filesystem.output_slot = "/root/out.mkv".into();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[engine]\nprogram_name = \"mp4box\"\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.engine.program_name, "mp4box");
        assert_eq!(loaded.engine.completion_import, "gpac_done");
        assert_eq!(loaded.filesystem, FilesystemSettings::default());
    }

    #[test]
    fn test_codec_catalog_sits_beside_filter_catalog() {
        let config = AppConfig {
            catalog_path: Some(PathBuf::from("/data/catalogs/filters.json")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.codec_catalog_path(),
            Some(PathBuf::from("/data/catalogs/codecs.json"))
        );
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "engine = 5").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, FilterFlowError::Config(_)));
    }
}
