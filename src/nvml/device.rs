//! NVML device handle
//!
//! Thin object API over the low-level calls for one physical device.

use crate::domain::{EngineUtilization, MemoryInfo, ProcessInfo, UtilizationInfo};
use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::calls;
use crate::nvml::ffi::nvmlDevice_t;
use crate::nvml::library::NvmlLibrary;
use crate::nvml::session::Session;
use crate::nvml::vgpu::Vgpu;

use std::fmt;

/// A physical device, borrowed from the session that resolved it
///
/// Two devices are equal when they wrap the same native handle.
pub struct Device<'s, A: NvmlApi = NvmlLibrary> {
    session: &'s Session<A>,
    handle: nvmlDevice_t,
    index: u32,
}

impl<'s, A: NvmlApi> Device<'s, A> {
    pub(crate) fn new(session: &'s Session<A>, handle: nvmlDevice_t, index: u32) -> Self {
        Self {
            session,
            handle,
            index,
        }
    }

    /// Index the device was looked up by
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Raw `nvmlDevice_t`
    pub fn handle(&self) -> nvmlDevice_t {
        self.handle
    }

    pub(crate) fn session(&self) -> &'s Session<A> {
        self.session
    }

    /// vGPU instances currently running on this device
    pub fn all_vgpus(&self) -> Result<Vec<Vgpu<'s, A>>, NvmlError> {
        let capacity = self.session.buffers().vgpu_capacity;
        let instances = calls::device_active_vgpus(self.session.api()?, self.handle, capacity)?;

        Ok(instances
            .into_iter()
            .map(|instance| Vgpu::new(*self, instance))
            .collect())
    }

    /// Framebuffer memory usage
    pub fn memory_info(&self) -> Result<MemoryInfo, NvmlError> {
        calls::device_memory_info(self.session.api()?, self.handle)
    }

    /// Compute processes on this device with their owning users
    ///
    /// Fails as a whole if any owner cannot be resolved.
    pub fn processes(&self) -> Result<Vec<ProcessInfo>, NvmlError> {
        let capacity = self.session.buffers().process_capacity;
        let processes =
            calls::device_compute_running_processes(self.session.api()?, self.handle, capacity)?;

        let table = self.session.process_table();
        processes
            .into_iter()
            .map(|process| {
                let username = table
                    .username(process.pid)
                    .map_err(|source| NvmlError::Process {
                        pid: process.pid,
                        source,
                    })?;
                Ok(process.with_username(username))
            })
            .collect()
    }

    /// GPU and memory utilization rates
    pub fn utilization(&self) -> Result<UtilizationInfo, NvmlError> {
        calls::device_utilization_rates(self.session.api()?, self.handle)
    }

    /// Encoder utilization percentage
    pub fn encoder_utilization(&self) -> Result<u32, NvmlError> {
        Ok(self.encoder_utilization_sample()?.utilization)
    }

    /// Encoder utilization with its sampling period
    pub fn encoder_utilization_sample(&self) -> Result<EngineUtilization, NvmlError> {
        calls::device_encoder_utilization(self.session.api()?, self.handle)
    }

    /// Decoder utilization percentage
    pub fn decoder_utilization(&self) -> Result<u32, NvmlError> {
        Ok(self.decoder_utilization_sample()?.utilization)
    }

    /// Decoder utilization with its sampling period
    pub fn decoder_utilization_sample(&self) -> Result<EngineUtilization, NvmlError> {
        calls::device_decoder_utilization(self.session.api()?, self.handle)
    }

    /// VBIOS version string
    pub fn vbios_version(&self) -> Result<String, NvmlError> {
        calls::device_vbios_version(self.session.api()?, self.handle)
    }

    /// How many instances of `vgpu`'s type this device can host
    pub fn vgpu_max_instances(&self, vgpu: &Vgpu<'_, A>) -> Result<u32, NvmlError> {
        vgpu.vgpu_type()?.max_instances(self)
    }

    /// Number of vGPU instances currently running
    pub fn vgpu_current_instances(&self) -> Result<usize, NvmlError> {
        Ok(self.all_vgpus()?.len())
    }
}

impl<A: NvmlApi> Clone for Device<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: NvmlApi> Copy for Device<'_, A> {}

impl<A: NvmlApi> PartialEq for Device<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<A: NvmlApi> Eq for Device<'_, A> {}

impl<A: NvmlApi> fmt::Debug for Device<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ProcessError;
    use crate::mock::{MockNvml, MockProcessTable, MockVgpu};
    use crate::nvml::ffi;

    fn open(api: &MockNvml) -> Session<&MockNvml> {
        Session::with_api(api, &Config::default()).unwrap()
    }

    #[test]
    fn test_memory_info() {
        let api = MockNvml::new(2).with_memory(1, 10, 20, 30);
        let session = open(&api);

        let device = session.device(1).unwrap();
        assert_eq!(device.memory_info().unwrap(), MemoryInfo::new(10, 20, 30));
    }

    #[test]
    fn test_processes_resolve_usernames() {
        let api = MockNvml::new(1).with_processes(0, vec![(100, 1024), (200, 4096)]);
        let session = open(&api).with_process_table(
            MockProcessTable::new()
                .with_user(100, "alice")
                .with_user(200, "bob"),
        );

        let processes = session.device(0).unwrap().processes().unwrap();
        assert_eq!(
            processes,
            vec![
                ProcessInfo::new(100, 1024).with_username("alice"),
                ProcessInfo::new(200, 4096).with_username("bob"),
            ]
        );
    }

    #[test]
    fn test_processes_fail_when_owner_unknown() {
        let api = MockNvml::new(1).with_processes(0, vec![(100, 1024), (200, 4096)]);
        let session =
            open(&api).with_process_table(MockProcessTable::new().with_user(100, "alice"));

        let err = session.device(0).unwrap().processes().unwrap_err();
        assert!(matches!(
            err,
            NvmlError::Process {
                pid: 200,
                source: ProcessError::Unreadable { .. }
            }
        ));
    }

    #[test]
    fn test_processes_insufficient_size_is_an_error() {
        let many: Vec<(u32, u64)> = (1..=70).map(|pid| (pid, 1)).collect();
        let api = MockNvml::new(1)
            .with_processes(0, many)
            .with_process_churn(0, 10);
        let session = open(&api).with_process_table(MockProcessTable::new());

        let err = session.device(0).unwrap().processes().unwrap_err();
        assert!(err.is_insufficient_size());
        assert_eq!(api.calls("device_get_compute_running_processes"), 2);
    }

    #[test]
    fn test_processes_beyond_initial_capacity() {
        let many: Vec<(u32, u64)> = (1..=80).map(|pid| (pid, 1)).collect();
        let mut table = MockProcessTable::new();
        for pid in 1..=80 {
            table = table.with_user(pid, "svc");
        }
        let api = MockNvml::new(1).with_processes(0, many);
        let session = open(&api).with_process_table(table);

        assert_eq!(session.device(0).unwrap().processes().unwrap().len(), 80);
    }

    #[test]
    fn test_no_processes() {
        let api = MockNvml::new(1);
        let session = open(&api).with_process_table(MockProcessTable::new());
        assert!(session.device(0).unwrap().processes().unwrap().is_empty());
    }

    #[test]
    fn test_utilization() {
        let api = MockNvml::new(1).with_utilization(0, 87, 42);
        let session = open(&api);

        let util = session.device(0).unwrap().utilization().unwrap();
        assert_eq!(util, UtilizationInfo::new(87, 42));
    }

    #[test]
    fn test_encoder_and_decoder_utilization() {
        let api = MockNvml::new(1);
        let session = open(&api);
        let device = session.device(0).unwrap();

        assert_eq!(device.encoder_utilization().unwrap(), 12);
        assert_eq!(device.decoder_utilization().unwrap(), 3);
        assert_eq!(
            device.decoder_utilization_sample().unwrap().sampling_period_us,
            167_000
        );
    }

    #[test]
    fn test_encoder_not_supported() {
        let api = MockNvml::new(1);
        let session = open(&api);
        api.fail_call("device_get_encoder_utilization", ffi::NVML_ERROR_NOT_SUPPORTED);

        let err = session.device(0).unwrap().encoder_utilization().unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_vbios_version() {
        let api = MockNvml::new(1);
        let session = open(&api);
        assert_eq!(
            session.device(0).unwrap().vbios_version().unwrap(),
            "90.04.38.00.03"
        );
    }

    #[test]
    fn test_all_vgpus_and_current_instances() {
        let api = MockNvml::new(2).with_vgpus(1, vec![MockVgpu::new(5, 1), MockVgpu::new(6, 2)]);
        let session = open(&api);

        let empty = session.device(0).unwrap();
        assert!(empty.all_vgpus().unwrap().is_empty());
        assert_eq!(empty.vgpu_current_instances().unwrap(), 0);

        let host = session.device(1).unwrap();
        let ids: Vec<u32> = host
            .all_vgpus()
            .unwrap()
            .iter()
            .map(|v| v.instance_id())
            .collect();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(host.vgpu_current_instances().unwrap(), 2);
    }

    #[test]
    fn test_all_vgpus_beyond_initial_capacity() {
        let vgpus: Vec<MockVgpu> = (1..=4).map(|id| MockVgpu::new(id, 1)).collect();
        let api = MockNvml::new(1).with_vgpus(0, vgpus);
        let config = crate::config::ConfigBuilder::new()
            .with_vgpu_capacity(2)
            .build()
            .unwrap();
        let session = Session::with_api(&api, &config).unwrap();

        assert_eq!(session.device(0).unwrap().all_vgpus().unwrap().len(), 4);
        assert_eq!(api.calls("device_get_active_vgpus"), 2);
    }

    #[test]
    fn test_vgpu_max_instances() {
        let api = MockNvml::new(1)
            .with_vgpus(0, vec![MockVgpu::new(5, 11)])
            .with_vgpu_type(11, "GRID A100-4C", 10);
        let session = open(&api);
        let device = session.device(0).unwrap();
        let vgpu = device.all_vgpus().unwrap().remove(0);

        assert_eq!(device.vgpu_max_instances(&vgpu).unwrap(), 10);
    }

    #[test]
    fn test_vgpu_max_instances_fails_when_type_lookup_fails() {
        let api = MockNvml::new(1)
            .with_vgpus(0, vec![MockVgpu::new(5, 11)])
            .with_vgpu_type(11, "GRID A100-4C", 10);
        let session = open(&api);
        let device = session.device(0).unwrap();
        let vgpu = device.all_vgpus().unwrap().remove(0);
        api.fail_call("vgpu_instance_get_type", ffi::NVML_ERROR_NOT_FOUND);

        assert!(device.vgpu_max_instances(&vgpu).is_err());
        assert_eq!(api.calls("vgpu_type_get_max_instances"), 0);
    }

    #[test]
    fn test_device_copies_compare_equal() {
        let api = MockNvml::new(2);
        let session = open(&api);
        let device = session.device(1).unwrap();
        let copy = device;

        assert_eq!(device, copy);
        assert_ne!(device, session.device(0).unwrap());
        assert_eq!(device.handle(), MockNvml::handle_for(1));
    }
}
