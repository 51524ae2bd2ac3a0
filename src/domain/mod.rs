//! Domain models
//!
//! Immutable snapshots returned by device and vGPU queries.

pub mod memory;
pub mod process;
pub mod utilization;
pub mod vgpu;

pub use memory::MemoryInfo;
pub use process::{ProcessInfo, VgpuProcessInfo};
pub use utilization::{EngineUtilization, UtilizationInfo};
pub use vgpu::{VmId, VmIdType};
