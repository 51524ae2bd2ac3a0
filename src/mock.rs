//! Mock implementations for testing
//!
//! Provides a scriptable native NVML layer and process table for unit
//! testing without real hardware.

use crate::error::ProcessError;
use crate::nvml::ffi::{
    self, nvmlDevice_t, nvmlMemory_t, nvmlProcessInfo_t, nvmlUtilization_t, nvmlVgpuInstance_t,
    nvmlVgpuTypeId_t, nvmlVgpuVmIdType_t, Status,
};
use crate::nvml::status::fallback_error_string;
use crate::nvml::NvmlApi;
use crate::process::ProcessTable;

use std::collections::HashMap;
use std::os::raw::{c_char, c_uint};
use std::sync::Mutex;

/// Mock vGPU instance
#[derive(Debug, Clone)]
pub struct MockVgpu {
    instance: nvmlVgpuInstance_t,
    type_id: nvmlVgpuTypeId_t,
    vm_id: String,
    vm_driver_version: String,
    frame_rate_limit: u32,
}

impl MockVgpu {
    /// Create a vGPU instance of the given type with default metadata
    pub fn new(instance: nvmlVgpuInstance_t, type_id: nvmlVgpuTypeId_t) -> Self {
        Self {
            instance,
            type_id,
            vm_id: format!("vm-{}", instance),
            vm_driver_version: "535.104.05".to_string(),
            frame_rate_limit: 30,
        }
    }

    /// Builder: set VM identifier
    pub fn with_vm_id(mut self, vm_id: impl Into<String>) -> Self {
        self.vm_id = vm_id.into();
        self
    }

    /// Builder: set frame rate limit
    pub fn with_frame_rate_limit(mut self, limit: u32) -> Self {
        self.frame_rate_limit = limit;
        self
    }
}

#[derive(Debug, Clone)]
struct MockDevice {
    memory: nvmlMemory_t,
    processes: Vec<nvmlProcessInfo_t>,
    utilization: nvmlUtilization_t,
    encoder: (c_uint, c_uint),
    decoder: (c_uint, c_uint),
    vbios: String,
    vgpus: Vec<MockVgpu>,
    process_churn: usize,
}

impl Default for MockDevice {
    fn default() -> Self {
        const GIB: u64 = 1024 * 1024 * 1024;
        Self {
            memory: nvmlMemory_t {
                total: 16 * GIB,
                free: 12 * GIB,
                used: 4 * GIB,
            },
            processes: Vec::new(),
            utilization: nvmlUtilization_t { gpu: 35, memory: 20 },
            encoder: (12, 167_000),
            decoder: (3, 167_000),
            vbios: "90.04.38.00.03".to_string(),
            vgpus: Vec::new(),
            process_churn: 0,
        }
    }
}

/// Mock NVML library
///
/// Device handles are `index + 1` cast to a pointer so they are distinct and
/// never null. Every call except `init` and `error_string` reports
/// `NVML_ERROR_UNINITIALIZED` outside an init/shutdown pair.
#[derive(Debug)]
pub struct MockNvml {
    devices: Vec<MockDevice>,
    vgpu_types: HashMap<nvmlVgpuTypeId_t, (String, u32)>,
    initialized: Mutex<bool>,
    failures: Mutex<HashMap<&'static str, Status>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockNvml {
    /// Create a mock with `device_count` devices and default readings
    pub fn new(device_count: usize) -> Self {
        Self {
            devices: vec![MockDevice::default(); device_count],
            vgpu_types: HashMap::new(),
            initialized: Mutex::new(false),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: set memory readings of a device
    pub fn with_memory(mut self, index: usize, free: u64, used: u64, total: u64) -> Self {
        self.devices[index].memory = nvmlMemory_t { total, free, used };
        self
    }

    /// Builder: set `(pid, used_memory)` compute processes of a device
    pub fn with_processes(mut self, index: usize, processes: Vec<(u32, u64)>) -> Self {
        self.devices[index].processes = processes
            .into_iter()
            .map(|(pid, used)| nvmlProcessInfo_t {
                pid,
                usedGpuMemory: used,
            })
            .collect();
        self
    }

    /// Builder: start `per_call` new processes on a device after every
    /// process listing, so the list keeps outgrowing the previous answer
    pub fn with_process_churn(mut self, index: usize, per_call: usize) -> Self {
        self.devices[index].process_churn = per_call;
        self
    }

    /// Builder: set utilization rates of a device
    pub fn with_utilization(mut self, index: usize, gpu: u32, memory: u32) -> Self {
        self.devices[index].utilization = nvmlUtilization_t { gpu, memory };
        self
    }

    /// Builder: set active vGPUs of a device
    pub fn with_vgpus(mut self, index: usize, vgpus: Vec<MockVgpu>) -> Self {
        self.devices[index].vgpus = vgpus;
        self
    }

    /// Builder: register a vGPU type
    pub fn with_vgpu_type(
        mut self,
        type_id: nvmlVgpuTypeId_t,
        name: impl Into<String>,
        max_instances: u32,
    ) -> Self {
        self.vgpu_types
            .insert(type_id, (name.into(), max_instances));
        self
    }

    /// Make every later call of `name` return `status`
    pub fn fail_call(&self, name: &'static str, status: Status) {
        self.failures.lock().unwrap().insert(name, status);
    }

    /// Number of times `name` was invoked
    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Total number of native calls made
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Whether the mock is between init and shutdown
    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock().unwrap()
    }

    /// Handle the mock hands out for a device index
    pub fn handle_for(index: usize) -> nvmlDevice_t {
        (index + 1) as nvmlDevice_t
    }

    /// Record a call; returns the status to short-circuit with, if any
    fn enter(&self, name: &'static str) -> Option<Status> {
        *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;

        if let Some(status) = self.failures.lock().unwrap().get(name) {
            return Some(*status);
        }
        if name != "init" && !self.is_initialized() {
            return Some(ffi::NVML_ERROR_UNINITIALIZED);
        }
        None
    }

    fn device(&self, handle: nvmlDevice_t) -> Option<&MockDevice> {
        (handle as usize)
            .checked_sub(1)
            .and_then(|index| self.devices.get(index))
    }

    fn vgpu(&self, instance: nvmlVgpuInstance_t) -> Option<&MockVgpu> {
        self.devices
            .iter()
            .flat_map(|d| d.vgpus.iter())
            .find(|v| v.instance == instance)
    }
}

/// Copy a list into a caller buffer following NVML's count convention
fn fill_list<T: Copy>(items: &[T], count: &mut c_uint, buffer: &mut [T]) -> Status {
    let needed = items.len() as c_uint;
    if *count < needed || buffer.len() < items.len() {
        *count = needed;
        return ffi::NVML_ERROR_INSUFFICIENT_SIZE;
    }
    buffer[..items.len()].copy_from_slice(items);
    *count = needed;
    ffi::NVML_SUCCESS
}

/// Write NUL-terminated text, failing like NVML when it does not fit
fn write_c_string(text: &str, buffer: &mut [c_char]) -> Status {
    let bytes = text.as_bytes();
    if bytes.len() >= buffer.len() {
        return ffi::NVML_ERROR_INSUFFICIENT_SIZE;
    }
    for (slot, byte) in buffer.iter_mut().zip(bytes) {
        *slot = *byte as c_char;
    }
    buffer[bytes.len()] = 0;
    ffi::NVML_SUCCESS
}

impl NvmlApi for MockNvml {
    fn init(&self) -> Status {
        if let Some(status) = self.enter("init") {
            return status;
        }
        *self.initialized.lock().unwrap() = true;
        ffi::NVML_SUCCESS
    }

    fn shutdown(&self) -> Status {
        if let Some(status) = self.enter("shutdown") {
            return status;
        }
        *self.initialized.lock().unwrap() = false;
        ffi::NVML_SUCCESS
    }

    fn error_string(&self, status: Status) -> String {
        fallback_error_string(status).to_string()
    }

    fn device_get_count(&self, count: &mut c_uint) -> Status {
        if let Some(status) = self.enter("device_get_count") {
            return status;
        }
        *count = self.devices.len() as c_uint;
        ffi::NVML_SUCCESS
    }

    fn device_get_handle_by_index(&self, index: c_uint, device: &mut nvmlDevice_t) -> Status {
        if let Some(status) = self.enter("device_get_handle_by_index") {
            return status;
        }
        if index as usize >= self.devices.len() {
            return ffi::NVML_ERROR_INVALID_ARGUMENT;
        }
        *device = Self::handle_for(index as usize);
        ffi::NVML_SUCCESS
    }

    fn device_get_memory_info(&self, device: nvmlDevice_t, memory: &mut nvmlMemory_t) -> Status {
        if let Some(status) = self.enter("device_get_memory_info") {
            return status;
        }
        match self.device(device) {
            Some(d) => {
                *memory = d.memory;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn device_get_compute_running_processes(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        infos: &mut [nvmlProcessInfo_t],
    ) -> Status {
        if let Some(status) = self.enter("device_get_compute_running_processes") {
            return status;
        }
        let Some(d) = self.device(device) else {
            return ffi::NVML_ERROR_INVALID_ARGUMENT;
        };
        let earlier = self.calls("device_get_compute_running_processes") - 1;
        let spawned = (0..d.process_churn * earlier).map(|i| nvmlProcessInfo_t {
            pid: 100_000 + i as u32,
            usedGpuMemory: 1,
        });
        let processes: Vec<nvmlProcessInfo_t> =
            d.processes.iter().copied().chain(spawned).collect();
        fill_list(&processes, count, infos)
    }

    fn device_get_utilization_rates(
        &self,
        device: nvmlDevice_t,
        utilization: &mut nvmlUtilization_t,
    ) -> Status {
        if let Some(status) = self.enter("device_get_utilization_rates") {
            return status;
        }
        match self.device(device) {
            Some(d) => {
                *utilization = d.utilization;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn device_get_encoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        if let Some(status) = self.enter("device_get_encoder_utilization") {
            return status;
        }
        match self.device(device) {
            Some(d) => {
                (*utilization, *sampling_period_us) = d.encoder;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn device_get_decoder_utilization(
        &self,
        device: nvmlDevice_t,
        utilization: &mut c_uint,
        sampling_period_us: &mut c_uint,
    ) -> Status {
        if let Some(status) = self.enter("device_get_decoder_utilization") {
            return status;
        }
        match self.device(device) {
            Some(d) => {
                (*utilization, *sampling_period_us) = d.decoder;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn device_get_vbios_version(&self, device: nvmlDevice_t, version: &mut [c_char]) -> Status {
        if let Some(status) = self.enter("device_get_vbios_version") {
            return status;
        }
        match self.device(device) {
            Some(d) => write_c_string(&d.vbios, version),
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn device_get_active_vgpus(
        &self,
        device: nvmlDevice_t,
        count: &mut c_uint,
        instances: &mut [nvmlVgpuInstance_t],
    ) -> Status {
        if let Some(status) = self.enter("device_get_active_vgpus") {
            return status;
        }
        match self.device(device) {
            Some(d) => {
                let ids: Vec<nvmlVgpuInstance_t> = d.vgpus.iter().map(|v| v.instance).collect();
                fill_list(&ids, count, instances)
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn vgpu_instance_get_type(
        &self,
        instance: nvmlVgpuInstance_t,
        type_id: &mut nvmlVgpuTypeId_t,
    ) -> Status {
        if let Some(status) = self.enter("vgpu_instance_get_type") {
            return status;
        }
        match self.vgpu(instance) {
            Some(v) => {
                *type_id = v.type_id;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_NOT_FOUND,
        }
    }

    fn vgpu_type_get_name(
        &self,
        type_id: nvmlVgpuTypeId_t,
        name: &mut [c_char],
        size: &mut c_uint,
    ) -> Status {
        if let Some(status) = self.enter("vgpu_type_get_name") {
            return status;
        }
        let Some((type_name, _)) = self.vgpu_types.get(&type_id) else {
            return ffi::NVML_ERROR_INVALID_ARGUMENT;
        };
        let usable = (*size as usize).min(name.len());
        let ret = write_c_string(type_name, &mut name[..usable]);
        *size = (type_name.len() + 1) as c_uint;
        ret
    }

    fn vgpu_type_get_max_instances(
        &self,
        device: nvmlDevice_t,
        type_id: nvmlVgpuTypeId_t,
        count: &mut c_uint,
    ) -> Status {
        if let Some(status) = self.enter("vgpu_type_get_max_instances") {
            return status;
        }
        if self.device(device).is_none() {
            return ffi::NVML_ERROR_INVALID_ARGUMENT;
        }
        match self.vgpu_types.get(&type_id) {
            Some((_, max)) => {
                *count = *max;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_INVALID_ARGUMENT,
        }
    }

    fn vgpu_instance_get_frame_rate_limit(
        &self,
        instance: nvmlVgpuInstance_t,
        limit: &mut c_uint,
    ) -> Status {
        if let Some(status) = self.enter("vgpu_instance_get_frame_rate_limit") {
            return status;
        }
        match self.vgpu(instance) {
            Some(v) => {
                *limit = v.frame_rate_limit;
                ffi::NVML_SUCCESS
            }
            None => ffi::NVML_ERROR_NOT_FOUND,
        }
    }

    fn vgpu_instance_get_vm_driver_version(
        &self,
        instance: nvmlVgpuInstance_t,
        version: &mut [c_char],
    ) -> Status {
        if let Some(status) = self.enter("vgpu_instance_get_vm_driver_version") {
            return status;
        }
        match self.vgpu(instance) {
            Some(v) => write_c_string(&v.vm_driver_version, version),
            None => ffi::NVML_ERROR_NOT_FOUND,
        }
    }

    fn vgpu_instance_get_vm_id(
        &self,
        instance: nvmlVgpuInstance_t,
        vm_id: &mut [c_char],
        id_type: &mut nvmlVgpuVmIdType_t,
    ) -> Status {
        if let Some(status) = self.enter("vgpu_instance_get_vm_id") {
            return status;
        }
        match self.vgpu(instance) {
            Some(v) => {
                *id_type = ffi::NVML_VGPU_VM_ID_UUID;
                write_c_string(&v.vm_id, vm_id)
            }
            None => ffi::NVML_ERROR_NOT_FOUND,
        }
    }
}

/// Mock process table keyed by pid
#[derive(Debug, Default)]
pub struct MockProcessTable {
    users: HashMap<u32, String>,
}

impl MockProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register the owner of a pid
    pub fn with_user(mut self, pid: u32, username: impl Into<String>) -> Self {
        self.users.insert(pid, username.into());
        self
    }
}

impl ProcessTable for MockProcessTable {
    fn username(&self, pid: u32) -> Result<String, ProcessError> {
        self.users
            .get(&pid)
            .cloned()
            .ok_or_else(|| ProcessError::Unreadable {
                pid,
                source: procfs::ProcError::NotFound(None),
            })
    }
}
