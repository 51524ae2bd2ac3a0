//! NVML session
//!
//! Owns the process-wide initialized state of the NVML library and hands
//! out device handles borrowed from it.

use crate::config::{BufferConfig, Config, ConfigBuilder};
use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::calls;
use crate::nvml::device::Device;
use crate::nvml::ffi::nvmlVgpuInstance_t;
use crate::nvml::library::NvmlLibrary;
use crate::process::{ProcFs, ProcessTable};

/// Initialized NVML library
///
/// Created by initializing the library and shut down by [`close`](Self::close)
/// or on drop. Devices and vGPUs borrow the session, so it cannot be closed
/// while any of them is alive.
pub struct Session<A: NvmlApi = NvmlLibrary> {
    api: A,
    active: bool,
    buffers: BufferConfig,
    processes: Box<dyn ProcessTable>,
}

impl Session<NvmlLibrary> {
    /// Open a session using configuration from the default file locations
    /// and the environment
    pub fn open() -> Result<Self, NvmlError> {
        let config = ConfigBuilder::new().with_file(None).with_env().build()?;
        Self::open_with_config(&config)
    }

    /// Load the shared library and open a session with explicit configuration
    pub fn open_with_config(config: &Config) -> Result<Self, NvmlError> {
        let library = NvmlLibrary::load(&config.library)?;
        Self::with_api(library, config)
    }
}

impl<A: NvmlApi> Session<A> {
    /// Initialize NVML through `api`
    pub fn with_api(api: A, config: &Config) -> Result<Self, NvmlError> {
        calls::init(&api)?;
        log::info!("NVML session opened");

        Ok(Self {
            api,
            active: true,
            buffers: config.buffers,
            processes: Box::new(ProcFs::new()),
        })
    }

    /// Resolve process owners through `table` instead of procfs
    pub fn with_process_table(mut self, table: impl ProcessTable + 'static) -> Self {
        self.processes = Box::new(table);
        self
    }

    /// Whether the session has not been closed
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Shut the library down
    ///
    /// # Panics
    ///
    /// Closing a session twice is a usage error and panics.
    pub fn close(&mut self) -> Result<(), NvmlError> {
        if !self.active {
            panic!("NVML session already closed");
        }
        self.active = false;
        calls::shutdown(&self.api)?;
        log::info!("NVML session closed");
        Ok(())
    }

    /// Native layer, or `SessionClosed` once the session is closed
    pub(crate) fn api(&self) -> Result<&A, NvmlError> {
        if self.active {
            Ok(&self.api)
        } else {
            Err(NvmlError::SessionClosed)
        }
    }

    pub(crate) fn buffers(&self) -> BufferConfig {
        self.buffers
    }

    pub(crate) fn process_table(&self) -> &dyn ProcessTable {
        self.processes.as_ref()
    }

    /// Number of devices visible to this process
    pub fn device_count(&self) -> Result<u32, NvmlError> {
        calls::device_count(self.api()?)
    }

    /// Device at a zero-based index
    pub fn device(&self, index: u32) -> Result<Device<'_, A>, NvmlError> {
        let handle = calls::device_handle_by_index(self.api()?, index)?;
        Ok(Device::new(self, handle, index))
    }

    /// Every device, in index order
    ///
    /// Fails as a whole if any single lookup fails.
    pub fn all_devices(&self) -> Result<Vec<Device<'_, A>>, NvmlError> {
        let count = self.device_count()?;
        let mut devices = Vec::with_capacity(count as usize);
        for i in 0..count {
            devices.push(self.device(i)?);
        }
        Ok(devices)
    }

    /// First device whose active vGPUs include `instance`
    pub fn find_vgpu_device(
        &self,
        instance: nvmlVgpuInstance_t,
    ) -> Result<Device<'_, A>, NvmlError> {
        for device in self.all_devices()? {
            if device
                .all_vgpus()?
                .iter()
                .any(|vgpu| vgpu.instance_id() == instance)
            {
                return Ok(device);
            }
        }
        Err(NvmlError::VgpuNotFound(instance))
    }
}

impl<A: NvmlApi> Drop for Session<A> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        match calls::shutdown(&self.api) {
            Ok(()) => log::info!("NVML session closed"),
            Err(e) => log::warn!("NVML shutdown failed: {}", e),
        }
    }
}
