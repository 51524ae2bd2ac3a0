//! Raw NVML types and constants
//!
//! Short names over the generated `nvml-wrapper-sys` bindings for the
//! handful of types, status codes and buffer sizes the wrapped calls use.

#![allow(non_camel_case_types, non_upper_case_globals)]

use nvml_wrapper_sys::bindings;

pub use bindings::{
    nvmlDevice_t, nvmlMemory_t, nvmlProcessInfo_v1_t as nvmlProcessInfo_t, nvmlUtilization_t,
    nvmlVgpuInstance_t, nvmlVgpuTypeId_t, nvmlVgpuVmIdType_t,
};

/// Raw `nvmlReturn_t`
pub type Status = bindings::nvmlReturn_enum;

pub const NVML_SUCCESS: Status = bindings::nvmlReturn_enum_NVML_SUCCESS;
pub const NVML_ERROR_UNINITIALIZED: Status = bindings::nvmlReturn_enum_NVML_ERROR_UNINITIALIZED;
pub const NVML_ERROR_INVALID_ARGUMENT: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_INVALID_ARGUMENT;
pub const NVML_ERROR_NOT_SUPPORTED: Status = bindings::nvmlReturn_enum_NVML_ERROR_NOT_SUPPORTED;
pub const NVML_ERROR_NO_PERMISSION: Status = bindings::nvmlReturn_enum_NVML_ERROR_NO_PERMISSION;
pub const NVML_ERROR_ALREADY_INITIALIZED: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_ALREADY_INITIALIZED;
pub const NVML_ERROR_NOT_FOUND: Status = bindings::nvmlReturn_enum_NVML_ERROR_NOT_FOUND;
pub const NVML_ERROR_INSUFFICIENT_SIZE: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_INSUFFICIENT_SIZE;
pub const NVML_ERROR_DRIVER_NOT_LOADED: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_DRIVER_NOT_LOADED;
pub const NVML_ERROR_TIMEOUT: Status = bindings::nvmlReturn_enum_NVML_ERROR_TIMEOUT;
pub const NVML_ERROR_LIBRARY_NOT_FOUND: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_LIBRARY_NOT_FOUND;
pub const NVML_ERROR_FUNCTION_NOT_FOUND: Status =
    bindings::nvmlReturn_enum_NVML_ERROR_FUNCTION_NOT_FOUND;
pub const NVML_ERROR_GPU_IS_LOST: Status = bindings::nvmlReturn_enum_NVML_ERROR_GPU_IS_LOST;
pub const NVML_ERROR_UNKNOWN: Status = bindings::nvmlReturn_enum_NVML_ERROR_UNKNOWN;

pub const NVML_VGPU_VM_ID_DOMAIN_ID: nvmlVgpuVmIdType_t =
    bindings::nvmlVgpuVmIdType_NVML_VGPU_VM_ID_DOMAIN_ID;
pub const NVML_VGPU_VM_ID_UUID: nvmlVgpuVmIdType_t = bindings::nvmlVgpuVmIdType_NVML_VGPU_VM_ID_UUID;

// Buffer lengths for the string calls
pub const NVML_DEVICE_UUID_BUFFER_SIZE: usize = bindings::NVML_DEVICE_UUID_BUFFER_SIZE as usize;
pub const NVML_VGPU_NAME_BUFFER_SIZE: usize = bindings::NVML_VGPU_NAME_BUFFER_SIZE as usize;
pub const NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE: usize =
    bindings::NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE as usize;
pub const NVML_DEVICE_VBIOS_VERSION_BUFFER_SIZE: usize =
    bindings::NVML_DEVICE_VBIOS_VERSION_BUFFER_SIZE as usize;

/// Zeroed `nvmlMemory_t` to pass as an out-parameter
pub fn empty_memory() -> nvmlMemory_t {
    nvmlMemory_t {
        total: 0,
        free: 0,
        used: 0,
    }
}

/// Zeroed `nvmlUtilization_t` to pass as an out-parameter
pub fn empty_utilization() -> nvmlUtilization_t {
    nvmlUtilization_t { gpu: 0, memory: 0 }
}

/// Zeroed process record for list buffers
pub fn empty_process_info() -> nvmlProcessInfo_t {
    nvmlProcessInfo_t {
        pid: 0,
        usedGpuMemory: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_nvml_h() {
        assert_eq!(NVML_SUCCESS, 0);
        assert_eq!(NVML_ERROR_INSUFFICIENT_SIZE, 7);
        assert_eq!(NVML_ERROR_FUNCTION_NOT_FOUND, 13);
        assert_eq!(NVML_ERROR_UNKNOWN, 999);
    }

    #[test]
    fn test_buffer_sizes() {
        assert_eq!(NVML_DEVICE_UUID_BUFFER_SIZE, 80);
        assert_eq!(NVML_VGPU_NAME_BUFFER_SIZE, 64);
        assert_eq!(NVML_DEVICE_VBIOS_VERSION_BUFFER_SIZE, 32);
    }
}
