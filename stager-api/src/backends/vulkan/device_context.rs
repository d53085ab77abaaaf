use super::{
    StagerBufferVulkan, StagerFenceVulkan, StagerQueueVulkan, StagerTextureVulkan,
};
use crate::{
    StagerBufferDef, StagerDeviceInfo, StagerQueuePriority, StagerQueueType, StagerResult,
    StagerTextureDef,
};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Describes a device that was created elsewhere. The device context never destroys the instance
/// or the device; they must outlive every object created from it.
#[derive(Clone)]
pub struct StagerVulkanDeviceDef {
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue_family_index: u32,
    pub compute_queue_family_index: u32,
    /// Same as the graphics family if the device has no dedicated transfer family
    pub transfer_queue_family_index: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct VkQueueFamilyIndices {
    pub graphics_queue_family_index: u32,
    pub compute_queue_family_index: u32,
    pub transfer_queue_family_index: u32,
}

impl VkQueueFamilyIndices {
    pub fn family_index(
        &self,
        queue_type: StagerQueueType,
    ) -> u32 {
        match queue_type {
            StagerQueueType::Graphics => self.graphics_queue_family_index,
            StagerQueueType::Compute => self.compute_queue_family_index,
            StagerQueueType::Transfer => self.transfer_queue_family_index,
        }
    }
}

pub(super) struct StagerDeviceContextVulkanInner {
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: Mutex<Option<Allocator>>,
    queue_family_indices: VkQueueFamilyIndices,
    // Distinct families that resources are shared between
    sharing_queue_families: Vec<u32>,
    // One lock per distinct family. vkQueueSubmit requires external synchronization.
    family_queues: Vec<(u32, Arc<Mutex<vk::Queue>>)>,
    device_info: StagerDeviceInfo,
    submission_lock: Mutex<()>,
}

impl Drop for StagerDeviceContextVulkanInner {
    fn drop(&mut self) {
        // The allocator frees its memory blocks on drop, which must happen while the device lives
        self.allocator.lock().take();
    }
}

#[derive(Clone)]
pub struct StagerDeviceContextVulkan {
    pub(super) inner: Arc<StagerDeviceContextVulkanInner>,
}

impl std::fmt::Debug for StagerDeviceContextVulkan {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerDeviceContextVulkan")
            .field("handle", &self.inner.device.handle())
            .field("queue_family_indices", &self.inner.queue_family_indices)
            .finish()
    }
}

impl StagerDeviceContextVulkan {
    pub fn new(device_def: &StagerVulkanDeviceDef) -> StagerResult<Self> {
        let queue_family_indices = VkQueueFamilyIndices {
            graphics_queue_family_index: device_def.graphics_queue_family_index,
            compute_queue_family_index: device_def.compute_queue_family_index,
            transfer_queue_family_index: device_def.transfer_queue_family_index,
        };

        let mut sharing_queue_families = vec![
            queue_family_indices.graphics_queue_family_index,
            queue_family_indices.transfer_queue_family_index,
        ];
        sharing_queue_families.dedup();

        let mut family_queues: Vec<(u32, Arc<Mutex<vk::Queue>>)> = Vec::default();
        for queue_type in &[
            StagerQueueType::Graphics,
            StagerQueueType::Compute,
            StagerQueueType::Transfer,
        ] {
            let family_index = queue_family_indices.family_index(*queue_type);
            if family_queues.iter().any(|(index, _)| *index == family_index) {
                continue;
            }

            let queue = unsafe { device_def.device.get_device_queue(family_index, 0) };
            family_queues.push((family_index, Arc::new(Mutex::new(queue))));
        }

        let properties = unsafe {
            device_def
                .instance
                .get_physical_device_properties(device_def.physical_device)
        };

        let device_info = StagerDeviceInfo {
            has_dedicated_transfer_queue: queue_family_indices.transfer_queue_family_index
                != queue_family_indices.graphics_queue_family_index,
            upload_buffer_texture_alignment: (properties.limits.optimal_buffer_copy_offset_alignment
                as u32)
                .max(1),
            upload_buffer_texture_row_alignment: (properties
                .limits
                .optimal_buffer_copy_row_pitch_alignment
                as u32)
                .max(1),
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: device_def.instance.clone(),
            device: device_def.device.clone(),
            physical_device: device_def.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })?;

        log::debug!(
            "Created vulkan device context {:?} {:?}",
            queue_family_indices,
            device_info
        );

        let inner = StagerDeviceContextVulkanInner {
            instance: device_def.instance.clone(),
            device: device_def.device.clone(),
            physical_device: device_def.physical_device,
            allocator: Mutex::new(Some(allocator)),
            queue_family_indices,
            sharing_queue_families,
            family_queues,
            device_info,
            submission_lock: Mutex::new(()),
        };

        Ok(StagerDeviceContextVulkan {
            inner: Arc::new(inner),
        })
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.inner.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.inner.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.inner.physical_device
    }

    pub fn queue_family_indices(&self) -> &VkQueueFamilyIndices {
        &self.inner.queue_family_indices
    }

    pub fn device_info(&self) -> &StagerDeviceInfo {
        &self.inner.device_info
    }

    pub fn submission_lock(&self) -> &Mutex<()> {
        &self.inner.submission_lock
    }

    pub(super) fn allocator(&self) -> &Mutex<Option<Allocator>> {
        &self.inner.allocator
    }

    /// Resources shared by the transfer and graphics families use concurrent sharing so that no
    /// queue family ownership transfer is needed between the two
    pub(super) fn sharing_mode(&self) -> (vk::SharingMode, &[u32]) {
        if self.inner.sharing_queue_families.len() > 1 {
            (
                vk::SharingMode::CONCURRENT,
                &self.inner.sharing_queue_families[..],
            )
        } else {
            (vk::SharingMode::EXCLUSIVE, &[])
        }
    }

    pub(super) fn family_queue(
        &self,
        family_index: u32,
    ) -> Option<Arc<Mutex<vk::Queue>>> {
        self.inner
            .family_queues
            .iter()
            .find(|(index, _)| *index == family_index)
            .map(|(_, queue)| queue.clone())
    }

    /// Queue priorities are fixed when the device is created, so `priority` is only recorded
    pub fn create_queue(
        &self,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
    ) -> StagerResult<StagerQueueVulkan> {
        StagerQueueVulkan::new(self, queue_type, priority)
    }

    pub fn create_fence(&self) -> StagerResult<StagerFenceVulkan> {
        StagerFenceVulkan::new(self)
    }

    pub fn create_buffer(
        &self,
        buffer_def: &StagerBufferDef,
    ) -> StagerResult<StagerBufferVulkan> {
        StagerBufferVulkan::new(self, buffer_def)
    }

    pub fn create_texture(
        &self,
        texture_def: &StagerTextureDef,
    ) -> StagerResult<StagerTextureVulkan> {
        StagerTextureVulkan::new(self, texture_def)
    }

    pub fn wait_for_device_idle(&self) -> StagerResult<()> {
        unsafe {
            self.inner.device.device_wait_idle()?;
        }

        Ok(())
    }
}
