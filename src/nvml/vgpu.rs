//! vGPU instances and types

use crate::domain::VmId;
use crate::error::NvmlError;
use crate::nvml::api::NvmlApi;
use crate::nvml::calls;
use crate::nvml::device::Device;
use crate::nvml::ffi::{nvmlVgpuInstance_t, nvmlVgpuTypeId_t};
use crate::nvml::library::NvmlLibrary;
use crate::nvml::session::Session;

use std::fmt;

/// A running vGPU instance together with the device hosting it
pub struct Vgpu<'s, A: NvmlApi = NvmlLibrary> {
    device: Device<'s, A>,
    instance: nvmlVgpuInstance_t,
}

impl<'s, A: NvmlApi> Vgpu<'s, A> {
    pub(crate) fn new(device: Device<'s, A>, instance: nvmlVgpuInstance_t) -> Self {
        Self { device, instance }
    }

    /// Raw `nvmlVgpuInstance_t`
    pub fn instance_id(&self) -> nvmlVgpuInstance_t {
        self.instance
    }

    /// Device this instance was enumerated from
    pub fn device(&self) -> Device<'s, A> {
        self.device
    }

    /// Search the session's devices for the one currently hosting this instance
    ///
    /// Unlike [`device`](Self::device) this asks the library again, so it
    /// notices an instance that has gone away.
    pub fn locate_device(&self) -> Result<Device<'s, A>, NvmlError> {
        self.device.session().find_vgpu_device(self.instance)
    }

    /// Type of this instance
    pub fn vgpu_type(&self) -> Result<VgpuType<'s, A>, NvmlError> {
        let session = self.device.session();
        let type_id = calls::vgpu_instance_type(session.api()?, self.instance)?;
        Ok(VgpuType::new(session, type_id))
    }

    /// Name of this instance's type, e.g. `GRID T4-2Q`
    pub fn type_name(&self) -> Result<String, NvmlError> {
        self.vgpu_type()?.name()
    }

    /// Frame rate limit in frames per second
    pub fn frame_rate_limit(&self) -> Result<u32, NvmlError> {
        calls::vgpu_instance_frame_rate_limit(self.device.session().api()?, self.instance)
    }

    /// Driver version installed in the guest
    pub fn vm_driver_version(&self) -> Result<String, NvmlError> {
        calls::vgpu_instance_vm_driver_version(self.device.session().api()?, self.instance)
    }

    /// Identifier of the VM this instance is attached to
    pub fn vm_id(&self) -> Result<VmId, NvmlError> {
        calls::vgpu_instance_vm_id(self.device.session().api()?, self.instance)
    }
}

impl<A: NvmlApi> Clone for Vgpu<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: NvmlApi> Copy for Vgpu<'_, A> {}

impl<A: NvmlApi> PartialEq for Vgpu<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        self.instance == other.instance
    }
}

impl<A: NvmlApi> Eq for Vgpu<'_, A> {}

impl<A: NvmlApi> fmt::Debug for Vgpu<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vgpu")
            .field("instance", &self.instance)
            .field("device", &self.device.index())
            .finish()
    }
}

/// A vGPU type (profile) such as `GRID A100-4C`
pub struct VgpuType<'s, A: NvmlApi = NvmlLibrary> {
    session: &'s Session<A>,
    type_id: nvmlVgpuTypeId_t,
}

impl<'s, A: NvmlApi> VgpuType<'s, A> {
    pub(crate) fn new(session: &'s Session<A>, type_id: nvmlVgpuTypeId_t) -> Self {
        Self { session, type_id }
    }

    /// Raw `nvmlVgpuTypeId_t`
    pub fn type_id(&self) -> nvmlVgpuTypeId_t {
        self.type_id
    }

    /// Type name
    pub fn name(&self) -> Result<String, NvmlError> {
        calls::vgpu_type_name(self.session.api()?, self.type_id)
    }

    /// How many instances of this type `device` can host
    pub fn max_instances(&self, device: &Device<'_, A>) -> Result<u32, NvmlError> {
        calls::vgpu_type_max_instances(self.session.api()?, device.handle(), self.type_id)
    }
}

impl<A: NvmlApi> Clone for VgpuType<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: NvmlApi> Copy for VgpuType<'_, A> {}

impl<A: NvmlApi> PartialEq for VgpuType<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl<A: NvmlApi> Eq for VgpuType<'_, A> {}

impl<A: NvmlApi> fmt::Debug for VgpuType<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VgpuType")
            .field("type_id", &self.type_id)
            .finish()
    }
}
