//! Configuration system
//!
//! Handles TOML config file parsing and environment overrides.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Shared library settings
    pub library: LibraryConfig,
    /// Output buffer sizing
    pub buffers: BufferConfig,
}

impl Config {
    /// Check values the session relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.search_paths.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "library.search_paths".to_string(),
                message: "at least one path is required".to_string(),
            });
        }
        if self.buffers.process_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "buffers.process_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.buffers.vgpu_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "buffers.vgpu_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// NVML shared library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library names or paths, tried in order
    pub search_paths: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![
                "libnvidia-ml.so.1".to_string(),
                "libnvidia-ml.so".to_string(),
            ],
        }
    }
}

/// Initial capacity of list-returning calls
///
/// Lists longer than this are still returned in full; the buffer grows once
/// to the size the library reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BufferConfig {
    /// Compute process entries
    pub process_capacity: usize,
    /// Active vGPU entries
    pub vgpu_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            process_capacity: 64,
            vgpu_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.library.search_paths[0], "libnvidia-ml.so.1");
        assert_eq!(config.buffers.process_capacity, 64);
        assert_eq!(config.buffers.vgpu_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.buffers.vgpu_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "buffers.vgpu_capacity"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_search_paths() {
        let mut config = Config::default();
        config.library.search_paths.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[buffers]\nprocess_capacity = 256\n").unwrap();
        assert_eq!(config.buffers.process_capacity, 256);
        assert_eq!(config.buffers.vgpu_capacity, 64);
        assert_eq!(config.library, LibraryConfig::default());
    }
}
