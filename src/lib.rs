//! vgpumon - NVML GPU and vGPU telemetry library
//!
//! Safe bindings over NVIDIA's management library for reading device
//! memory, utilization and process usage, and for inspecting the vGPU
//! instances a host is running.
//!
//! # Modules
//!
//! - [`config`]: Configuration system
//! - [`domain`]: Value types returned by queries
//! - [`error`]: Error types
//! - [`nvml`]: Session, device and vGPU handles over NVML
//! - [`process`]: Process owner lookup

pub mod config;
pub mod domain;
pub mod error;
pub mod nvml;
pub mod process;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{NvmlError, Result};
pub use nvml::{Device, Session, Vgpu, VgpuType};
