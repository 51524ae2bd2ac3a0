//! Configuration file loading
//!
//! Handles loading configuration from TOML files.

use crate::config::Config;
use crate::error::ConfigError;

use std::path::{Path, PathBuf};

/// Configuration file handler
pub struct ConfigFile;

impl ConfigFile {
    /// Parse a TOML configuration file
    ///
    /// Sections and keys missing from the file keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            log::debug!("Cannot read {}: {}", path.display(), e);
            ConfigError::FileNotFound(path.display().to_string())
        })?;

        let config: Config = toml::from_str(&content)?;
        log::debug!("Parsed config file {}", path.display());
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Option<Config> {
        for path in Self::default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return Some(config);
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        None
    }

    /// Get default configuration file paths
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/vgpumon/config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vgpumon/config.toml"));
        }

        paths.push(PathBuf::from("vgpumon.toml"));
        paths
    }
}
