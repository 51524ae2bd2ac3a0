//! vGPU instance metadata

use crate::nvml::ffi::{self, nvmlVgpuVmIdType_t};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the hypervisor identifies the VM a vGPU is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmIdType {
    /// Hypervisor domain ID
    DomainId,
    /// VM UUID
    Uuid,
    /// Value this crate does not know about
    Unknown(u32),
}

impl VmIdType {
    /// Convert from the raw `nvmlVgpuVmIdType_t`
    pub fn from_raw(value: nvmlVgpuVmIdType_t) -> Self {
        match value {
            ffi::NVML_VGPU_VM_ID_DOMAIN_ID => Self::DomainId,
            ffi::NVML_VGPU_VM_ID_UUID => Self::Uuid,
            other => Self::Unknown(other),
        }
    }
}

/// Identifier of the VM a vGPU instance is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmId {
    pub value: String,
    pub id_type: VmIdType,
}

impl VmId {
    pub fn new(value: impl Into<String>, id_type: VmIdType) -> Self {
        Self {
            value: value.into(),
            id_type,
        }
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
