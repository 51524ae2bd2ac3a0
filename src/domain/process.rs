//! GPU process records
//!
//! Snapshots of processes running on a device or inside a vGPU.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A compute process running on a device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// Process ID
    pub pid: u32,
    /// GPU memory used by this process (bytes)
    pub used_memory: u64,
    /// Owner of the process; empty until resolved
    pub username: String,
}

impl ProcessInfo {
    /// Create a record with no owner resolved yet
    pub fn new(pid: u32, used_memory: u64) -> Self {
        Self {
            pid,
            used_memory,
            username: String::new(),
        }
    }

    /// Attach the owning username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Memory usage in MiB
    pub fn memory_mb(&self) -> f64 {
        self.used_memory as f64 / 1024.0 / 1024.0
    }
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PID {} ({}): {:.1} MB",
            self.pid,
            self.username,
            self.memory_mb()
        )
    }
}

/// Per-process utilization sample inside a vGPU
///
/// The sampling call that fills this record targets hardware this crate
/// does not query yet, so nothing here produces it; the record exists so
/// downstream consumers share one definition of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VgpuProcessInfo {
    pub name: String,
    pub pid: u32,
    /// SM (3D/compute) utilization
    pub gpu_util: u32,
    /// Frame buffer utilization
    pub mem_util: u32,
    pub enc_util: u32,
    pub dec_util: u32,
    /// CPU timestamp of the sample, in microseconds
    pub time_stamp: u64,
    /// vGPU instance the process runs in
    #[serde(rename = "VGPU")]
    pub vgpu: u32,
}
