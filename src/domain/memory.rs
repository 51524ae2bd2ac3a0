//! Device memory snapshot

use serde::{Deserialize, Serialize};
use std::fmt;

/// Framebuffer memory of a device, in bytes
///
/// Field names serialize as `Free`, `Used` and `Total`, the names existing
/// consumers of this record already read.
///
/// # Examples
///
/// ```
/// use vgpumon::domain::MemoryInfo;
///
/// let mem = MemoryInfo::new(100, 50, 150);
/// assert_eq!(mem.used_percent(), 33);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemoryInfo {
    /// Unallocated memory
    pub free: u64,
    /// Allocated memory
    pub used: u64,
    /// Installed memory
    pub total: u64,
}

impl MemoryInfo {
    /// Create a new memory snapshot
    pub fn new(free: u64, used: u64, total: u64) -> Self {
        Self { free, used, total }
    }

    /// Used memory in MiB
    pub fn used_mb(&self) -> u64 {
        self.used / (1024 * 1024)
    }

    /// Total memory in MiB
    pub fn total_mb(&self) -> u64 {
        self.total / (1024 * 1024)
    }

    /// Used share of total memory (0 - 100)
    pub fn used_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.used as u128 * 100) / self.total as u128).min(100) as u8
    }
}

impl fmt::Display for MemoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} MiB ({}%)",
            self.used_mb(),
            self.total_mb(),
            self.used_percent()
        )
    }
}
