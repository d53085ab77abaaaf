use super::StagerDeviceContextVulkan;
use crate::{StagerResourceState, StagerResourceType, StagerResult, StagerTextureDef};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct StagerTextureVulkanInner {
    device_context: StagerDeviceContextVulkan,
    vk_image: vk::Image,
    allocation: Option<Allocation>,
    texture_def: StagerTextureDef,
    current_state: AtomicU32,
}

impl Drop for StagerTextureVulkanInner {
    fn drop(&mut self) {
        log::trace!("destroying StagerTextureVulkan {:?}", self.vk_image);
        unsafe {
            self.device_context
                .device()
                .destroy_image(self.vk_image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Some(allocator) = self.device_context.allocator().lock().as_mut() {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free image memory: {}", e);
                }
            }
        }
    }
}

/// Holds the vk::Image and its memory. Clones share the same image.
#[derive(Clone, Debug)]
pub struct StagerTextureVulkan {
    inner: Arc<StagerTextureVulkanInner>,
}

impl PartialEq for StagerTextureVulkan {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.inner.vk_image == other.inner.vk_image
    }
}

impl StagerTextureVulkan {
    pub fn vk_image(&self) -> vk::Image {
        self.inner.vk_image
    }

    pub fn texture_def(&self) -> &StagerTextureDef {
        &self.inner.texture_def
    }

    pub fn current_state(&self) -> StagerResourceState {
        StagerResourceState::from_bits_truncate(self.inner.current_state.load(Ordering::Acquire))
    }

    pub fn set_current_state(
        &self,
        state: StagerResourceState,
    ) {
        self.inner
            .current_state
            .store(state.bits(), Ordering::Release);
    }

    pub fn new(
        device_context: &StagerDeviceContextVulkan,
        texture_def: &StagerTextureDef,
    ) -> StagerResult<StagerTextureVulkan> {
        texture_def.verify();

        let image_type = if texture_def.extents.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };

        let mut create_flags = vk::ImageCreateFlags::empty();
        if texture_def
            .resource_type
            .contains(StagerResourceType::TEXTURE_CUBE)
        {
            create_flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let (sharing_mode, queue_family_indices) = device_context.sharing_mode();
        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .extent(vk::Extent3D {
                width: texture_def.extents.width,
                height: texture_def.extents.height,
                depth: texture_def.extents.depth,
            })
            .mip_levels(texture_def.mip_count)
            .array_layers(texture_def.array_length)
            .format(super::util::format_to_vk(texture_def.format))
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(super::util::resource_type_image_usage_flags(
                texture_def.resource_type,
            ))
            .sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices)
            .samples(vk::SampleCountFlags::TYPE_1)
            .flags(create_flags);

        let device = device_context.device();
        let vk_image = unsafe { device.create_image(&image_create_info, None)? };
        let requirements = unsafe { device.get_image_memory_requirements(vk_image) };

        let allocation = {
            let mut allocator = device_context.allocator().lock();
            let allocation = allocator
                .as_mut()
                .ok_or("The device allocator has been destroyed")
                .map_err(crate::StagerError::from)
                .and_then(|allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "stager texture",
                            requirements,
                            location: MemoryLocation::GpuOnly,
                            linear: false,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(Into::into)
                });

            match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.destroy_image(vk_image, None) };
                    return Err(e);
                }
            }
        };

        let bind_result = unsafe {
            device.bind_image_memory(vk_image, allocation.memory(), allocation.offset())
        };

        let inner = StagerTextureVulkanInner {
            device_context: device_context.clone(),
            vk_image,
            allocation: Some(allocation),
            texture_def: texture_def.clone(),
            current_state: AtomicU32::new(StagerResourceState::UNDEFINED.bits()),
        };

        // Dropping inner releases both the handle and the memory
        bind_result?;

        Ok(StagerTextureVulkan {
            inner: Arc::new(inner),
        })
    }
}
