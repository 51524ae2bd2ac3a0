//! NVML abstraction layer
//!
//! Raw entry points sit behind the [`NvmlApi`] trait so everything above
//! the shared library can be exercised against a mock.

pub mod api;
pub mod calls;
pub mod device;
pub mod ffi;
pub mod library;
pub mod session;
pub mod status;
pub mod vgpu;

pub use api::NvmlApi;
pub use device::Device;
pub use library::NvmlLibrary;
pub use session::Session;
pub use vgpu::{Vgpu, VgpuType};
