use super::{StagerCommandBufferVulkan, StagerDeviceContextVulkan, StagerQueueVulkan};
use crate::{StagerCommandPoolDef, StagerResult};
use ash::vk;

pub struct StagerCommandPoolVulkan {
    device_context: StagerDeviceContextVulkan,
    vk_command_pool: vk::CommandPool,
    queue: StagerQueueVulkan,
}

impl std::fmt::Debug for StagerCommandPoolVulkan {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerCommandPoolVulkan")
            .field("vk_command_pool", &self.vk_command_pool)
            .field("queue", &self.queue)
            .finish()
    }
}

impl Drop for StagerCommandPoolVulkan {
    fn drop(&mut self) {
        unsafe {
            self.device_context
                .device()
                .destroy_command_pool(self.vk_command_pool, None);
        }
    }
}

impl StagerCommandPoolVulkan {
    pub fn new(
        queue: &StagerQueueVulkan,
        command_pool_def: &StagerCommandPoolDef,
    ) -> StagerResult<StagerCommandPoolVulkan> {
        let device_context = queue.device_context().clone();

        // Command buffers are re-recorded from scratch on every begin()
        let mut command_pool_create_flags = vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        if command_pool_def.transient {
            command_pool_create_flags |= vk::CommandPoolCreateFlags::TRANSIENT;
        }

        let pool_create_info = vk::CommandPoolCreateInfo::default()
            .flags(command_pool_create_flags)
            .queue_family_index(queue.queue_family_index());

        log::trace!(
            "Creating command pool on queue family index {:?}",
            queue.queue_family_index()
        );

        let vk_command_pool = unsafe {
            device_context
                .device()
                .create_command_pool(&pool_create_info, None)?
        };

        Ok(StagerCommandPoolVulkan {
            device_context,
            vk_command_pool,
            queue: queue.clone(),
        })
    }

    pub fn vk_command_pool(&self) -> vk::CommandPool {
        self.vk_command_pool
    }

    pub fn queue(&self) -> &StagerQueueVulkan {
        &self.queue
    }

    pub fn create_command_buffer(&self) -> StagerResult<StagerCommandBufferVulkan> {
        StagerCommandBufferVulkan::new(self)
    }

    pub(super) fn device_context(&self) -> &StagerDeviceContextVulkan {
        &self.device_context
    }
}
