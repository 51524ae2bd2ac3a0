//! Trait definition for the native NVML entry points
//!
//! One method per wrapped C function. Out-parameters are `&mut` and output
//! buffers are slices, so implementations never see raw pointers from the
//! caller. Every method returns the raw status; translation into
//! [`NvmlError`](crate::error::NvmlError) happens in [`status`](super::status).

use crate::nvml::ffi::{
    nvmlDevice_t, nvmlMemory_t, nvmlProcessInfo_t, nvmlUtilization_t, nvmlVgpuInstance_t,
    nvmlVgpuTypeId_t, nvmlVgpuVmIdType_t, Status,
};

use std::os::raw::{c_char, c_uint};

/// Native NVML interface
///
/// Implemented by [`NvmlLibrary`](super::NvmlLibrary) over the real shared
/// library and by the mock layer in tests.
pub trait NvmlApi {
    /// `nvmlInit_v2`
    fn init(&self) -> Status;

    /// `nvmlShutdown`
    fn shutdown(&self) -> Status;

    /// `nvmlErrorString`
    fn error_string(&self, status: Status) -> String;

    /// `nvmlDeviceGetCount_v2`
    fn device_get_count(&self, count: &mut c_uint) -> Status;

    /// `nvmlDeviceGetHandleByIndex_v2`
    fn device_get_handle_by_index(&self, index: c_uint, device: &mut nvmlDevice_t) -> Status;

    /// `nvmlDeviceGetMemoryInfo`
    fn device_get_memory_info(&self, device: nvmlDevice_t, memory: &mut nvmlMemory_t) -> Status;

    /// `nvmlDeviceGetComputeRunningProcesses`
    ///
    /// On entry `count` holds the usable length of `infos`; on return it holds
    /// the number of valid entries, or the required length when the status is
    /// `NVML_ERROR_INSUFFICIENT_SIZE`.
    fn device_get_compute_running_processes(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        infos: &mut [nvmlProcessInfo_t],
    ) -> Status;

    /// `nvmlDeviceGetUtilizationRates`
    fn device_get_utilization_rates(
        &self,
        device: nvmlDevice_t,
        utilization: &mut nvmlUtilization_t,
    ) -> Status;

    /// `nvmlDeviceGetEncoderUtilization`
    fn device_get_encoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status;

    /// `nvmlDeviceGetDecoderUtilization`
    fn device_get_decoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status;

    /// `nvmlDeviceGetVbiosVersion`
    fn device_get_vbios_version(&self, device: nvmlDevice_t, version: &mut [c_char]) -> Status;

    /// `nvmlDeviceGetActiveVgpus`
    ///
    /// Same `count` convention as
    /// [`device_get_compute_running_processes`](Self::device_get_compute_running_processes).
    fn device_get_active_vgpus(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        instances: &mut [nvmlVgpuInstance_t],
    ) -> Status;

    /// `nvmlVgpuInstanceGetType`
    fn vgpu_instance_get_type(
        &self,
        instance: nvmlVgpuInstance_t,
        type_id: &mut nvmlVgpuTypeId_t,
    ) -> Status;

    /// `nvmlVgpuTypeGetName`
    fn vgpu_type_get_name(
        &self,
        type_id: nvmlVgpuTypeId_t,
        name: &mut [c_char],
        size: &mut c_uint,
    ) -> Status;

    /// `nvmlVgpuTypeGetMaxInstances`
    fn vgpu_type_get_max_instances(
        &self,
        device: nvmlDevice_t,
        type_id: nvmlVgpuTypeId_t,
        count: &mut c_uint,
    ) -> Status;

    /// `nvmlVgpuInstanceGetFrameRateLimit`
    fn vgpu_instance_get_frame_rate_limit(
        &self,
        instance: nvmlVgpuInstance_t,
        limit: &mut c_uint,
    ) -> Status;

    /// `nvmlVgpuInstanceGetVmDriverVersion`
    fn vgpu_instance_get_vm_driver_version(
        &self,
        instance: nvmlVgpuInstance_t,
        version: &mut [c_char],
    ) -> Status;

    /// `nvmlVgpuInstanceGetVmID`
    fn vgpu_instance_get_vm_id(
        &self,
        instance: nvmlVgpuInstance_t,
        vm_id: &mut [c_char],
        id_type: &mut nvmlVgpuVmIdType_t,
    ) -> Status;
}

impl<T: NvmlApi + ?Sized> NvmlApi for &T {
    fn init(&self) -> Status {
        (**self).init()
    }

    fn shutdown(&self) -> Status {
        (**self).shutdown()
    }

    fn error_string(&self, status: Status) -> String {
        (**self).error_string(status)
    }

    fn device_get_count(&self, count: &mut c_uint) -> Status {
        (**self).device_get_count(count)
    }

    fn device_get_handle_by_index(&self, index: c_uint, device: &mut nvmlDevice_t) -> Status {
        (**self).device_get_handle_by_index(index, device)
    }

    fn device_get_memory_info(&self, device: nvmlDevice_t, memory: &mut nvmlMemory_t) -> Status {
        (**self).device_get_memory_info(device, memory)
    }

    fn device_get_compute_running_processes(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        infos: &mut [nvmlProcessInfo_t],
    ) -> Status {
        (**self).device_get_compute_running_processes(device, count, infos)
    }

    fn device_get_utilization_rates(
        &self,
        device: nvmlDevice_t,
        utilization: &mut nvmlUtilization_t,
    ) -> Status {
        (**self).device_get_utilization_rates(device, utilization)
    }

    fn device_get_encoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        (**self).device_get_encoder_utilization(device, utilization, sampling_period_us)
    }

    fn device_get_decoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        (**self).device_get_decoder_utilization(device, utilization, sampling_period_us)
    }

    fn device_get_vbios_version(&self, device: nvmlDevice_t, version: &mut [c_char]) -> Status {
        (**self).device_get_vbios_version(device, version)
    }

    fn device_get_active_vgpus(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        instances: &mut [nvmlVgpuInstance_t],
    ) -> Status {
        (**self).device_get_active_vgpus(device, count, instances)
    }

    fn vgpu_instance_get_type(
        &self,
        instance: nvmlVgpuInstance_t,
        type_id: &mut nvmlVgpuTypeId_t,
    ) -> Status {
        (**self).vgpu_instance_get_type(instance, type_id)
    }

    fn vgpu_type_get_name(
        &self,
        type_id: nvmlVgpuTypeId_t,
        name: &mut [c_char],
        size: &mut c_uint,
    ) -> Status {
        (**self).vgpu_type_get_name(type_id, name, size)
    }

    fn vgpu_type_get_max_instances(
        &self,
        device: nvmlDevice_t,
        type_id: nvmlVgpuTypeId_t,
        count: &mut c_uint,
    ) -> Status {
        (**self).vgpu_type_get_max_instances(device, type_id, count)
    }

    fn vgpu_instance_get_frame_rate_limit(
        &self,
        instance: nvmlVgpuInstance_t,
        limit: &mut c_uint,
    ) -> Status {
        (**self).vgpu_instance_get_frame_rate_limit(instance, limit)
    }

    fn vgpu_instance_get_vm_driver_version(
        &self,
        instance: nvmlVgpuInstance_t,
        version: &mut [c_char],
    ) -> Status {
        (**self).vgpu_instance_get_vm_driver_version(instance, version)
    }

    fn vgpu_instance_get_vm_id(
        &self,
        instance: nvmlVgpuInstance_t,
        vm_id: &mut [c_char],
        id_type: &mut nvmlVgpuVmIdType_t,
    ) -> Status {
        (**self).vgpu_instance_get_vm_id(instance, vm_id, id_type)
    }
}
