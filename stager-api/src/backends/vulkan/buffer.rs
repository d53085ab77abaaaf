use super::StagerDeviceContextVulkan;
use crate::{StagerBufferDef, StagerResult};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};

#[derive(Debug)]
pub struct StagerBufferVulkan {
    device_context: StagerDeviceContextVulkan,
    vk_buffer: vk::Buffer,
    allocation: Option<Allocation>,
    buffer_def: StagerBufferDef,
}

impl Drop for StagerBufferVulkan {
    fn drop(&mut self) {
        log::trace!("destroying StagerBufferVulkan {:?}", self.vk_buffer);
        unsafe {
            self.device_context
                .device()
                .destroy_buffer(self.vk_buffer, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Some(allocator) = self.device_context.allocator().lock().as_mut() {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free buffer memory: {}", e);
                }
            }
        }
    }
}

impl StagerBufferVulkan {
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.vk_buffer
    }

    pub fn buffer_def(&self) -> &StagerBufferDef {
        &self.buffer_def
    }

    pub fn mapped_memory(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|x| x.mapped_ptr())
            .map(|x| x.as_ptr() as *mut u8)
    }

    pub fn copy_to_host_visible_buffer<T: Copy>(
        &self,
        data: &[T],
    ) -> StagerResult<()> {
        self.copy_to_host_visible_buffer_with_offset(data, 0)
    }

    pub fn copy_to_host_visible_buffer_with_offset<T: Copy>(
        &self,
        data: &[T],
        buffer_byte_offset: u64,
    ) -> StagerResult<()> {
        let data_size_in_bytes = crate::memory::slice_size_in_bytes(data) as u64;
        let end = buffer_byte_offset.checked_add(data_size_in_bytes);
        if end.map_or(true, |end| end > self.buffer_def.size) {
            return Err(format!(
                "Host write of {} bytes at offset {} overflows buffer of {} bytes",
                data_size_in_bytes, buffer_byte_offset, self.buffer_def.size
            )
            .into());
        }

        let dst = self
            .mapped_memory()
            .ok_or("Tried to write to a buffer that is not CPU-visible")?;

        unsafe {
            let dst = dst.add(buffer_byte_offset as usize);
            std::ptr::copy_nonoverlapping(
                data.as_ptr() as *const u8,
                dst,
                data_size_in_bytes as usize,
            );
        }

        Ok(())
    }

    pub fn new(
        device_context: &StagerDeviceContextVulkan,
        buffer_def: &StagerBufferDef,
    ) -> StagerResult<Self> {
        buffer_def.verify();

        let usage_flags = super::util::resource_type_buffer_usage_flags(
            buffer_def.resource_type,
            buffer_def.memory_usage,
        );
        let (sharing_mode, queue_family_indices) = device_context.sharing_mode();

        let buffer_info = vk::BufferCreateInfo::default()
            .size(buffer_def.size)
            .usage(usage_flags)
            .sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices);

        let device = device_context.device();
        let vk_buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(vk_buffer) };

        let allocation = {
            let mut allocator = device_context.allocator().lock();
            let allocation = allocator
                .as_mut()
                .ok_or("The device allocator has been destroyed")
                .map_err(crate::StagerError::from)
                .and_then(|allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "stager buffer",
                            requirements,
                            location: super::util::memory_usage_to_location(
                                buffer_def.memory_usage,
                            ),
                            linear: true,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(Into::into)
                });

            match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.destroy_buffer(vk_buffer, None) };
                    return Err(e);
                }
            }
        };

        let bind_result = unsafe {
            device.bind_buffer_memory(vk_buffer, allocation.memory(), allocation.offset())
        };

        let buffer = StagerBufferVulkan {
            device_context: device_context.clone(),
            vk_buffer,
            allocation: Some(allocation),
            buffer_def: buffer_def.clone(),
        };

        // Dropping the buffer releases both the handle and the memory
        bind_result?;

        log::trace!(
            "Created vulkan buffer {:?} ({} bytes, {:?})",
            vk_buffer,
            buffer_def.size,
            buffer_def.memory_usage
        );

        Ok(buffer)
    }
}
