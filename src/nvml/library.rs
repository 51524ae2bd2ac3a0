//! NVML shared library binding
//!
//! Real implementation of [`NvmlApi`] on top of `libnvidia-ml`, loaded at
//! runtime through the `nvml-wrapper-sys` symbol table so the crate builds
//! and links on machines without the NVIDIA driver.

use crate::config::LibraryConfig;
use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::ffi::{
    nvmlDevice_t, nvmlMemory_t, nvmlProcessInfo_t, nvmlUtilization_t, nvmlVgpuInstance_t,
    nvmlVgpuTypeId_t, nvmlVgpuVmIdType_t, Status, NVML_ERROR_FUNCTION_NOT_FOUND,
};
use crate::nvml::status;

use nvml_wrapper_sys::bindings::NvmlLib;
use std::ffi::CStr;
use std::os::raw::{c_char, c_uint};

/// Loaded `libnvidia-ml`
///
/// Every entry point is resolved once at load time. One the installed driver
/// does not export reports `NVML_ERROR_FUNCTION_NOT_FOUND` when called.
pub struct NvmlLibrary {
    lib: NvmlLib,
    path: String,
}

impl NvmlLibrary {
    /// Load NVML from the first configured path that opens
    pub fn load(config: &LibraryConfig) -> Result<Self, NvmlError> {
        for path in &config.search_paths {
            // SAFETY: Loading NVML runs no initializers with preconditions on our side
            match unsafe { NvmlLib::new(path) } {
                Ok(lib) => {
                    log::debug!("Loaded NVML from {}", path);
                    return Ok(Self {
                        lib,
                        path: path.clone(),
                    });
                }
                Err(e) => log::debug!("Could not load {}: {}", path, e),
            }
        }

        Err(NvmlError::LibraryNotFound(config.search_paths.join(", ")))
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Entry point from the symbol table, or `None` if the driver lacks it
fn entry<F: Copy>(name: &str, symbol: &Result<F, libloading::Error>) -> Option<F> {
    match symbol {
        Ok(func) => Some(*func),
        Err(e) => {
            log::debug!("NVML symbol {} unavailable: {}", name, e);
            None
        }
    }
}

/// Usable length to advertise for a buffer, never more than it holds
fn clamp_len(requested: c_uint, len: usize) -> c_uint {
    requested.min(c_uint::try_from(len).unwrap_or(c_uint::MAX))
}

fn buffer_ptr<T>(buffer: &mut [T]) -> *mut T {
    if buffer.is_empty() {
        std::ptr::null_mut()
    } else {
        buffer.as_mut_ptr()
    }
}

impl NvmlApi for NvmlLibrary {
    fn init(&self) -> Status {
        let Some(func) = entry("nvmlInit_v2", &self.lib.nvmlInit_v2) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: no arguments
        unsafe { func() }
    }

    fn shutdown(&self) -> Status {
        let Some(func) = entry("nvmlShutdown", &self.lib.nvmlShutdown) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: no arguments
        unsafe { func() }
    }

    fn error_string(&self, code: Status) -> String {
        let Some(func) = entry("nvmlErrorString", &self.lib.nvmlErrorString) else {
            return status::fallback_error_string(code).to_string();
        };
        // SAFETY: nvmlErrorString returns a static NUL-terminated string or null
        let ptr = unsafe { func(code) };
        if ptr.is_null() {
            return status::fallback_error_string(code).to_string();
        }
        // SAFETY: checked non-null above; the string is static in the library
        unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned()
    }

    fn device_get_count(&self, count: &mut c_uint) -> Status {
        let Some(func) = entry("nvmlDeviceGetCount_v2", &self.lib.nvmlDeviceGetCount_v2) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: count is a valid out-pointer
        unsafe { func(count) }
    }

    fn device_get_handle_by_index(&self, index: c_uint, device: &mut nvmlDevice_t) -> Status {
        let Some(func) = entry(
            "nvmlDeviceGetHandleByIndex_v2",
            &self.lib.nvmlDeviceGetHandleByIndex_v2,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: device is a valid out-pointer
        unsafe { func(index, device) }
    }

    fn device_get_memory_info(&self, device: nvmlDevice_t, memory: &mut nvmlMemory_t) -> Status {
        let Some(func) = entry("nvmlDeviceGetMemoryInfo", &self.lib.nvmlDeviceGetMemoryInfo)
        else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: handle came from nvmlDeviceGetHandleByIndex, memory is a valid out-pointer
        unsafe { func(device, memory) }
    }

    fn device_get_compute_running_processes(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        infos: &mut [nvmlProcessInfo_t],
    ) -> Status {
        let Some(func) = entry(
            "nvmlDeviceGetComputeRunningProcesses",
            &self.lib.nvmlDeviceGetComputeRunningProcesses,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let mut len = clamp_len(*count, infos.len());
        // SAFETY: len never exceeds the buffer, null is allowed when len is 0
        let ret = unsafe { func(device, &mut len, buffer_ptr(infos)) };
        *count = len;
        ret
    }

    fn device_get_utilization_rates(
        &self,
        device: nvmlDevice_t,
        utilization: &mut nvmlUtilization_t,
    ) -> Status {
        let Some(func) = entry(
            "nvmlDeviceGetUtilizationRates",
            &self.lib.nvmlDeviceGetUtilizationRates,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: utilization is a valid out-pointer
        unsafe { func(device, utilization) }
    }

    fn device_get_encoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        let Some(func) = entry(
            "nvmlDeviceGetEncoderUtilization",
            &self.lib.nvmlDeviceGetEncoderUtilization,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: both out-pointers are valid
        unsafe { func(device, utilization, sampling_period_us) }
    }

    fn device_get_decoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        let Some(func) = entry(
            "nvmlDeviceGetDecoderUtilization",
            &self.lib.nvmlDeviceGetDecoderUtilization,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: both out-pointers are valid
        unsafe { func(device, utilization, sampling_period_us) }
    }

    fn device_get_vbios_version(&self, device: nvmlDevice_t, version: &mut [c_char]) -> Status {
        let Some(func) = entry("nvmlDeviceGetVbiosVersion", &self.lib.nvmlDeviceGetVbiosVersion)
        else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let len = clamp_len(c_uint::MAX, version.len());
        // SAFETY: len is the buffer length
        unsafe { func(device, buffer_ptr(version), len) }
    }

    fn device_get_active_vgpus(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        instances: &mut [nvmlVgpuInstance_t],
    ) -> Status {
        let Some(func) = entry("nvmlDeviceGetActiveVgpus", &self.lib.nvmlDeviceGetActiveVgpus)
        else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let mut len = clamp_len(*count, instances.len());
        // SAFETY: len never exceeds the buffer, null is allowed when len is 0
        let ret = unsafe { func(device, &mut len, buffer_ptr(instances)) };
        *count = len;
        ret
    }

    fn vgpu_instance_get_type(
        &self,
        instance: nvmlVgpuInstance_t,
        type_id: &mut nvmlVgpuTypeId_t,
    ) -> Status {
        let Some(func) = entry("nvmlVgpuInstanceGetType", &self.lib.nvmlVgpuInstanceGetType)
        else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: type_id is a valid out-pointer
        unsafe { func(instance, type_id) }
    }

    fn vgpu_type_get_name(
        &self,
        type_id: nvmlVgpuTypeId_t,
        name: &mut [c_char],
        size: &mut c_uint,
    ) -> Status {
        let Some(func) = entry("nvmlVgpuTypeGetName", &self.lib.nvmlVgpuTypeGetName) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let mut len = clamp_len(*size, name.len());
        // SAFETY: len never exceeds the buffer
        let ret = unsafe { func(type_id, buffer_ptr(name), &mut len) };
        *size = len;
        ret
    }

    fn vgpu_type_get_max_instances(
        &self,
        device: nvmlDevice_t,
        type_id: nvmlVgpuTypeId_t,
        count: &mut c_uint,
    ) -> Status {
        let Some(func) = entry(
            "nvmlVgpuTypeGetMaxInstances",
            &self.lib.nvmlVgpuTypeGetMaxInstances,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: count is a valid out-pointer
        unsafe { func(device, type_id, count) }
    }

    fn vgpu_instance_get_frame_rate_limit(
        &self,
        instance: nvmlVgpuInstance_t,
        limit: &mut c_uint,
    ) -> Status {
        let Some(func) = entry(
            "nvmlVgpuInstanceGetFrameRateLimit",
            &self.lib.nvmlVgpuInstanceGetFrameRateLimit,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        // SAFETY: limit is a valid out-pointer
        unsafe { func(instance, limit) }
    }

    fn vgpu_instance_get_vm_driver_version(
        &self,
        instance: nvmlVgpuInstance_t,
        version: &mut [c_char],
    ) -> Status {
        let Some(func) = entry(
            "nvmlVgpuInstanceGetVmDriverVersion",
            &self.lib.nvmlVgpuInstanceGetVmDriverVersion,
        ) else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let len = clamp_len(c_uint::MAX, version.len());
        // SAFETY: len is the buffer length
        unsafe { func(instance, buffer_ptr(version), len) }
    }

    fn vgpu_instance_get_vm_id(
        &self,
        instance: nvmlVgpuInstance_t,
        vm_id: &mut [c_char],
        id_type: &mut nvmlVgpuVmIdType_t,
    ) -> Status {
        let Some(func) = entry("nvmlVgpuInstanceGetVmID", &self.lib.nvmlVgpuInstanceGetVmID)
        else {
            return NVML_ERROR_FUNCTION_NOT_FOUND;
        };
        let len = clamp_len(c_uint::MAX, vm_id.len());
        // SAFETY: len is the buffer length, id_type is a valid out-pointer
        unsafe { func(instance, buffer_ptr(vm_id), len, id_type) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_len_never_exceeds_buffer() {
        assert_eq!(clamp_len(64, 10), 10);
        assert_eq!(clamp_len(4, 10), 4);
        assert_eq!(clamp_len(c_uint::MAX, 32), 32);
    }

    #[test]
    fn test_buffer_ptr_null_for_empty() {
        let mut empty: [c_uint; 0] = [];
        assert!(buffer_ptr(&mut empty).is_null());

        let mut one = [0 as c_uint; 1];
        assert!(!buffer_ptr(&mut one).is_null());
    }

    #[test]
    fn test_missing_entry_point_is_reported() {
        let missing: Result<fn(), libloading::Error> = Err(libloading::Error::DlSymUnknown);
        assert!(entry("nvmlVgpuInstanceGetVmID", &missing).is_none());

        let present: Result<fn() -> u32, libloading::Error> = Ok(|| 7);
        assert_eq!(entry("nvmlInit_v2", &present).map(|f| f()), Some(7));
    }

    #[test]
    fn test_load_missing_library() {
        let config = LibraryConfig {
            search_paths: vec!["/nonexistent/libnvidia-ml.so.1".to_string()],
        };
        let result = NvmlLibrary::load(&config);
        assert!(matches!(result, Err(NvmlError::LibraryNotFound(_))));
    }

    // Note: These tests require actual NVIDIA hardware and drivers

    #[test]
    #[ignore = "Requires NVIDIA GPU"]
    fn test_load_and_init() {
        let lib = NvmlLibrary::load(&LibraryConfig::default()).unwrap();
        assert_eq!(lib.init(), crate::nvml::ffi::NVML_SUCCESS);
        assert_eq!(lib.shutdown(), crate::nvml::ffi::NVML_SUCCESS);
    }
}
