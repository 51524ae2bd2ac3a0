//! Low-level NVML call wrappers
//!
//! One function per native entry point: allocate the output, make the call,
//! translate the status, decode. A failed call never yields partial output.

use crate::domain::{EngineUtilization, MemoryInfo, ProcessInfo, UtilizationInfo, VmId, VmIdType};
use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::ffi::{
    self, nvmlDevice_t, nvmlProcessInfo_t, nvmlVgpuInstance_t, nvmlVgpuTypeId_t,
    nvmlVgpuVmIdType_t, Status,
};
use crate::nvml::status::check;

use std::os::raw::{c_char, c_uint};

/// `nvmlInit_v2`
pub fn init<A: NvmlApi + ?Sized>(api: &A) -> Result<(), NvmlError> {
    check(api, api.init())
}

/// `nvmlShutdown`
pub fn shutdown<A: NvmlApi + ?Sized>(api: &A) -> Result<(), NvmlError> {
    check(api, api.shutdown())
}

/// Number of devices visible to this process
pub fn device_count<A: NvmlApi + ?Sized>(api: &A) -> Result<u32, NvmlError> {
    let mut count: c_uint = 0;
    check(api, api.device_get_count(&mut count))?;
    Ok(count)
}

/// Handle of the device at a zero-based index
pub fn device_handle_by_index<A: NvmlApi + ?Sized>(
    api: &A,
    index: u32,
) -> Result<nvmlDevice_t, NvmlError> {
    let mut device: nvmlDevice_t = std::ptr::null_mut();
    check(api, api.device_get_handle_by_index(index, &mut device))?;
    Ok(device)
}

pub fn device_memory_info<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
) -> Result<MemoryInfo, NvmlError> {
    let mut mem = ffi::empty_memory();
    check(api, api.device_get_memory_info(device, &mut mem))?;
    Ok(MemoryInfo::new(mem.free, mem.used, mem.total))
}

/// Compute processes on a device, usernames left unresolved
///
/// `capacity` is the initial buffer size; see [`query_list`].
pub fn device_compute_running_processes<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
    capacity: usize,
) -> Result<Vec<ProcessInfo>, NvmlError> {
    let infos: Vec<nvmlProcessInfo_t> =
        query_list(api, capacity, ffi::empty_process_info(), |count, buffer| {
            api.device_get_compute_running_processes(device, count, buffer)
        })?;

    Ok(infos
        .into_iter()
        .map(|p| ProcessInfo::new(p.pid, p.usedGpuMemory))
        .collect())
}

pub fn device_utilization_rates<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
) -> Result<UtilizationInfo, NvmlError> {
    let mut util = ffi::empty_utilization();
    check(api, api.device_get_utilization_rates(device, &mut util))?;
    Ok(UtilizationInfo::new(util.gpu, util.memory))
}

pub fn device_encoder_utilization<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
) -> Result<EngineUtilization, NvmlError> {
    let mut utilization: c_uint = 0;
    let mut period: c_uint = 0;
    check(
        api,
        api.device_get_encoder_utilization(device, &mut utilization, &mut period),
    )?;
    Ok(EngineUtilization::new(utilization, period))
}

pub fn device_decoder_utilization<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
) -> Result<EngineUtilization, NvmlError> {
    let mut utilization: c_uint = 0;
    let mut period: c_uint = 0;
    check(
        api,
        api.device_get_decoder_utilization(device, &mut utilization, &mut period),
    )?;
    Ok(EngineUtilization::new(utilization, period))
}

pub fn device_vbios_version<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
) -> Result<String, NvmlError> {
    let mut version = [0 as c_char; ffi::NVML_DEVICE_VBIOS_VERSION_BUFFER_SIZE];
    check(api, api.device_get_vbios_version(device, &mut version))?;
    Ok(decode_c_string(&version))
}

/// Instance ids of the vGPUs currently running on a device
pub fn device_active_vgpus<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
    capacity: usize,
) -> Result<Vec<nvmlVgpuInstance_t>, NvmlError> {
    query_list(api, capacity, 0, |count, buffer| {
        api.device_get_active_vgpus(device, count, buffer)
    })
}

pub fn vgpu_instance_type<A: NvmlApi + ?Sized>(
    api: &A,
    instance: nvmlVgpuInstance_t,
) -> Result<nvmlVgpuTypeId_t, NvmlError> {
    let mut type_id: nvmlVgpuTypeId_t = 0;
    check(api, api.vgpu_instance_get_type(instance, &mut type_id))?;
    Ok(type_id)
}

pub fn vgpu_type_name<A: NvmlApi + ?Sized>(
    api: &A,
    type_id: nvmlVgpuTypeId_t,
) -> Result<String, NvmlError> {
    let mut name = [0 as c_char; ffi::NVML_VGPU_NAME_BUFFER_SIZE];
    let mut size = ffi::NVML_VGPU_NAME_BUFFER_SIZE as c_uint;
    check(api, api.vgpu_type_get_name(type_id, &mut name, &mut size))?;
    Ok(decode_c_string(&name))
}

/// How many instances of a vGPU type the device can host
pub fn vgpu_type_max_instances<A: NvmlApi + ?Sized>(
    api: &A,
    device: nvmlDevice_t,
    type_id: nvmlVgpuTypeId_t,
) -> Result<u32, NvmlError> {
    let mut count: c_uint = 0;
    check(
        api,
        api.vgpu_type_get_max_instances(device, type_id, &mut count),
    )?;
    Ok(count)
}

pub fn vgpu_instance_frame_rate_limit<A: NvmlApi + ?Sized>(
    api: &A,
    instance: nvmlVgpuInstance_t,
) -> Result<u32, NvmlError> {
    let mut limit: c_uint = 0;
    check(
        api,
        api.vgpu_instance_get_frame_rate_limit(instance, &mut limit),
    )?;
    Ok(limit)
}

/// Driver version reported by the guest
pub fn vgpu_instance_vm_driver_version<A: NvmlApi + ?Sized>(
    api: &A,
    instance: nvmlVgpuInstance_t,
) -> Result<String, NvmlError> {
    let mut version = [0 as c_char; ffi::NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE];
    check(
        api,
        api.vgpu_instance_get_vm_driver_version(instance, &mut version),
    )?;
    Ok(decode_c_string(&version))
}

pub fn vgpu_instance_vm_id<A: NvmlApi + ?Sized>(
    api: &A,
    instance: nvmlVgpuInstance_t,
) -> Result<VmId, NvmlError> {
    let mut id = [0 as c_char; ffi::NVML_DEVICE_UUID_BUFFER_SIZE];
    let mut id_type: nvmlVgpuVmIdType_t = 0;
    check(
        api,
        api.vgpu_instance_get_vm_id(instance, &mut id, &mut id_type),
    )?;
    Ok(VmId::new(decode_c_string(&id), VmIdType::from_raw(id_type)))
}

/// Run a list-returning call with a buffer of `capacity` entries
///
/// When the library answers "insufficient size" with a larger required
/// count, the buffer grows to that count and the call is retried once. Only
/// the entries the library reports as valid are returned.
fn query_list<A, T, F>(
    api: &A,
    capacity: usize,
    empty: T,
    mut call: F,
) -> Result<Vec<T>, NvmlError>
where
    A: NvmlApi + ?Sized,
    T: Copy,
    F: FnMut(&mut c_uint, &mut [T]) -> Status,
{
    let mut buffer = vec![empty; capacity];
    let mut count = to_c_uint(buffer.len());
    let mut ret = call(&mut count, &mut buffer);

    if ret == ffi::NVML_ERROR_INSUFFICIENT_SIZE && count as usize > buffer.len() {
        log::debug!(
            "Growing NVML list buffer from {} to {} entries",
            buffer.len(),
            count
        );
        buffer.resize(count as usize, empty);
        count = to_c_uint(buffer.len());
        ret = call(&mut count, &mut buffer);
    }

    check(api, ret)?;
    buffer.truncate((count as usize).min(buffer.len()));
    Ok(buffer)
}

fn to_c_uint(len: usize) -> c_uint {
    c_uint::try_from(len).unwrap_or(c_uint::MAX)
}

/// Decode a NUL-terminated C string; a buffer without NUL decodes in full
fn decode_c_string(buffer: &[c_char]) -> String {
    let bytes: Vec<u8> = buffer
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNvml, MockVgpu};

    fn ready(api: MockNvml) -> MockNvml {
        assert_eq!(api.init(), ffi::NVML_SUCCESS);
        api
    }

    fn c_chars(text: &str) -> Vec<c_char> {
        text.bytes().map(|b| b as c_char).collect()
    }

    #[test]
    fn test_decode_c_string_stops_at_nul() {
        let mut buf = c_chars("86.04.5A.00.01");
        buf.push(0);
        buf.extend(c_chars("garbage"));
        assert_eq!(decode_c_string(&buf), "86.04.5A.00.01");
    }

    #[test]
    fn test_decode_c_string_without_nul() {
        assert_eq!(decode_c_string(&c_chars("GRID")), "GRID");
        assert_eq!(decode_c_string(&[]), "");
    }

    #[test]
    fn test_device_count_and_handles() {
        let api = ready(MockNvml::new(2));
        assert_eq!(device_count(&api).unwrap(), 2);

        let first = device_handle_by_index(&api, 0).unwrap();
        let second = device_handle_by_index(&api, 1).unwrap();
        assert_ne!(first, second);

        let err = device_handle_by_index(&api, 2).unwrap_err();
        assert_eq!(err.code(), Some(ffi::NVML_ERROR_INVALID_ARGUMENT));
    }

    #[test]
    fn test_memory_info_failure_yields_no_value() {
        let api = ready(MockNvml::new(1));
        api.fail_call("device_get_memory_info", ffi::NVML_ERROR_GPU_IS_LOST);
        let device = device_handle_by_index(&api, 0).unwrap();

        let err = device_memory_info(&api, device).unwrap_err();
        assert_eq!(err.code(), Some(ffi::NVML_ERROR_GPU_IS_LOST));
    }

    #[test]
    fn test_processes_decodes_only_reported_entries() {
        let api = ready(MockNvml::new(1).with_processes(0, vec![(100, 1024), (200, 2048)]));
        let device = device_handle_by_index(&api, 0).unwrap();

        let processes = device_compute_running_processes(&api, device, 64).unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[0], ProcessInfo::new(100, 1024));
        assert_eq!(processes[1], ProcessInfo::new(200, 2048));
    }

    #[test]
    fn test_processes_buffer_grows_once() {
        let many: Vec<(u32, u64)> = (1..=100).map(|pid| (pid, 4096)).collect();
        let api = ready(MockNvml::new(1).with_processes(0, many));
        let device = device_handle_by_index(&api, 0).unwrap();

        let processes = device_compute_running_processes(&api, device, 64).unwrap();
        assert_eq!(processes.len(), 100);
        assert_eq!(processes[99].pid, 100);
        assert_eq!(api.calls("device_get_compute_running_processes"), 2);
    }

    #[test]
    fn test_processes_still_too_large_after_retry() {
        let many: Vec<(u32, u64)> = (1..=70).map(|pid| (pid, 4096)).collect();
        let api = ready(MockNvml::new(1).with_processes(0, many).with_process_churn(0, 10));
        let device = device_handle_by_index(&api, 0).unwrap();

        let err = device_compute_running_processes(&api, device, 64).unwrap_err();
        assert!(err.is_insufficient_size());
        assert_eq!(api.calls("device_get_compute_running_processes"), 2);
    }

    #[test]
    fn test_processes_insufficient_size_without_larger_count() {
        let api = ready(MockNvml::new(1).with_processes(0, vec![(1, 1)]));
        api.fail_call(
            "device_get_compute_running_processes",
            ffi::NVML_ERROR_INSUFFICIENT_SIZE,
        );
        let device = device_handle_by_index(&api, 0).unwrap();

        let err = device_compute_running_processes(&api, device, 64).unwrap_err();
        assert!(err.is_insufficient_size());
        assert_eq!(api.calls("device_get_compute_running_processes"), 1);
    }

    #[test]
    fn test_active_vgpus_and_metadata() {
        let api = ready(MockNvml::new(1)
            .with_vgpus(
                0,
                vec![MockVgpu::new(7, 11)
                    .with_vm_id("vm-7")
                    .with_frame_rate_limit(60)],
            )
            .with_vgpu_type(11, "GRID T4-2Q", 8));
        let device = device_handle_by_index(&api, 0).unwrap();

        let vgpus = device_active_vgpus(&api, device, 64).unwrap();
        assert_eq!(vgpus, vec![7]);

        let type_id = vgpu_instance_type(&api, 7).unwrap();
        assert_eq!(type_id, 11);
        assert_eq!(vgpu_type_name(&api, type_id).unwrap(), "GRID T4-2Q");
        assert_eq!(vgpu_type_max_instances(&api, device, type_id).unwrap(), 8);
        assert_eq!(vgpu_instance_frame_rate_limit(&api, 7).unwrap(), 60);

        let vm_id = vgpu_instance_vm_id(&api, 7).unwrap();
        assert_eq!(vm_id.value, "vm-7");
        assert_eq!(vm_id.id_type, VmIdType::Uuid);
    }

    #[test]
    fn test_string_calls_decode_text() {
        let api = ready(MockNvml::new(1).with_vgpus(0, vec![MockVgpu::new(3, 1)]));
        let device = device_handle_by_index(&api, 0).unwrap();

        assert_eq!(device_vbios_version(&api, device).unwrap(), "90.04.38.00.03");
        assert_eq!(vgpu_instance_vm_driver_version(&api, 3).unwrap(), "535.104.05");
    }

    #[test]
    fn test_engine_utilization() {
        let api = ready(MockNvml::new(1));
        let device = device_handle_by_index(&api, 0).unwrap();

        assert_eq!(
            device_encoder_utilization(&api, device).unwrap(),
            EngineUtilization::new(12, 167_000)
        );
        assert_eq!(
            device_decoder_utilization(&api, device).unwrap(),
            EngineUtilization::new(3, 167_000)
        );
    }
}
