//! Unified error types for vgpumon
//!
//! This module defines all error types used throughout the library.
//! Uses thiserror for ergonomic error definitions.

use crate::nvml::ffi::{self, Status};
use thiserror::Error;

/// Errors from NVML sessions, devices and vGPU instances
#[derive(Error, Debug)]
pub enum NvmlError {
    /// Non-success status returned by the native library
    #[error("NVML error: \"{message}\" (code {code})")]
    Native {
        /// Raw `nvmlReturn_t` value
        code: Status,
        /// Escaped text of `nvmlErrorString` for the code
        message: String,
    },

    /// The session was closed before the call
    #[error("NVML session already closed")]
    SessionClosed,

    /// NVML library could not be loaded from any configured path
    #[error("NVML library not found (tried: {0}). Is the NVIDIA driver installed?")]
    LibraryNotFound(String),

    /// No device lists the vGPU instance among its active vGPUs
    #[error("No device hosts vGPU instance {0}")]
    VgpuNotFound(u32),

    /// Session configuration could not be built
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Username lookup for a GPU process failed
    #[error("Failed to resolve owner of process {pid}: {source}")]
    Process {
        pid: u32,
        #[source]
        source: ProcessError,
    },
}

impl NvmlError {
    /// Native status code, if this error came from the library
    pub fn code(&self) -> Option<Status> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the native call needed a larger output buffer
    pub fn is_insufficient_size(&self) -> bool {
        self.code() == Some(ffi::NVML_ERROR_INSUFFICIENT_SIZE)
    }

    /// Whether the device or driver does not support the call
    pub fn is_not_supported(&self) -> bool {
        self.code() == Some(ffi::NVML_ERROR_NOT_SUPPORTED)
    }
}

/// Errors from the OS process table
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Process entry could not be read (exited, permission denied)
    #[error("cannot read process {pid}: {source}")]
    Unreadable {
        pid: u32,
        #[source]
        source: procfs::ProcError,
    },

    /// Uid has no entry in the user database
    #[error("unknown uid {0}")]
    UnknownUid(u32),

    /// User database lookup failed
    #[error("cannot query user database: {0}")]
    UserDatabase(#[source] nix::errno::Errno),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias using NvmlError
pub type Result<T> = std::result::Result<T, NvmlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = NvmlError::Native {
            code: ffi::NVML_ERROR_NOT_SUPPORTED,
            message: "Not Supported".to_string(),
        };
        assert_eq!(err.to_string(), "NVML error: \"Not Supported\" (code 3)");
        assert!(err.is_not_supported());
        assert!(!err.is_insufficient_size());
    }

    #[test]
    fn test_non_native_errors_have_no_code() {
        assert_eq!(NvmlError::SessionClosed.code(), None);
        assert_eq!(NvmlError::VgpuNotFound(7).code(), None);
    }

    #[test]
    fn test_library_not_found_display() {
        let err = NvmlError::LibraryNotFound("libnvidia-ml.so.1".to_string());
        assert!(err.to_string().contains("NVIDIA driver"));
        assert!(err.to_string().contains("libnvidia-ml.so.1"));
    }

    #[test]
    fn test_process_error_source() {
        use std::error::Error as _;

        let err = NvmlError::Process {
            pid: 42,
            source: ProcessError::UnknownUid(1234),
        };
        assert!(err.to_string().contains("42"));
        assert_eq!(err.source().unwrap().to_string(), "unknown uid 1234");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: NvmlError = ConfigError::FileNotFound("vgpumon.toml".to_string()).into();
        assert!(matches!(err, NvmlError::Config(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "buffers.process_capacity".to_string(),
            message: "must be greater than zero".to_string(),
        };
        assert!(err.to_string().contains("buffers.process_capacity"));
    }
}
