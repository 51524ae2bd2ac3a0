//! Configuration builder
//!
//! Merges configuration from files, the environment and explicit overrides.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;

/// Prepended to the library search paths
pub const ENV_LIBRARY: &str = "VGPUMON_NVML_LIBRARY";
/// Overrides `buffers.process_capacity`
pub const ENV_PROCESS_CAPACITY: &str = "VGPUMON_PROCESS_CAPACITY";
/// Overrides `buffers.vgpu_capacity`
pub const ENV_VGPU_CAPACITY: &str = "VGPUMON_VGPU_CAPACITY";

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
    error: Option<ConfigError>,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            error: None,
        }
    }

    /// Load configuration from a file, or the default locations when `None`
    ///
    /// An explicitly named file that fails to load is reported by `build`.
    pub fn with_file(mut self, path: Option<&str>) -> Self {
        match path {
            Some(path) => match ConfigFile::load(path) {
                Ok(cfg) => self.config = cfg,
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            },
            None => {
                if let Some(cfg) = ConfigFile::load_default() {
                    self.config = cfg;
                }
            }
        }
        self
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LIBRARY) {
            self = self.with_library_path(path);
        }
        if let Some(value) = lookup(ENV_PROCESS_CAPACITY) {
            match parse_capacity(ENV_PROCESS_CAPACITY, &value) {
                Ok(n) => self.config.buffers.process_capacity = n,
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        if let Some(value) = lookup(ENV_VGPU_CAPACITY) {
            match parse_capacity(ENV_VGPU_CAPACITY, &value) {
                Ok(n) => self.config.buffers.vgpu_capacity = n,
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        self
    }

    /// Try this library path before the configured ones
    pub fn with_library_path(mut self, path: impl Into<String>) -> Self {
        self.config.library.search_paths.insert(0, path.into());
        self
    }

    /// Override initial process buffer capacity
    pub fn with_process_capacity(mut self, capacity: usize) -> Self {
        self.config.buffers.process_capacity = capacity;
        self
    }

    /// Override initial vGPU buffer capacity
    pub fn with_vgpu_capacity(mut self, capacity: usize) -> Self {
        self.config.buffers.vgpu_capacity = capacity;
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_capacity(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a non-negative integer", value),
        })
}
