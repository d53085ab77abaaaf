use super::{
    StagerCommandBufferVulkan, StagerCommandPoolVulkan, StagerDeviceContextVulkan,
    StagerFenceVulkan,
};
use crate::{
    StagerCommandPoolDef, StagerError, StagerQueuePriority, StagerQueueType, StagerResult,
};
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub struct StagerQueueVulkan {
    device_context: StagerDeviceContextVulkan,
    queue: Arc<Mutex<vk::Queue>>,
    queue_type: StagerQueueType,
    queue_family_index: u32,
    priority: StagerQueuePriority,
}

impl std::fmt::Debug for StagerQueueVulkan {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerQueueVulkan")
            .field("queue_type", &self.queue_type)
            .field("queue_family_index", &self.queue_family_index)
            .field("priority", &self.priority)
            .finish()
    }
}

impl StagerQueueVulkan {
    pub fn new(
        device_context: &StagerDeviceContextVulkan,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
    ) -> StagerResult<StagerQueueVulkan> {
        let queue_family_index = device_context
            .queue_family_indices()
            .family_index(queue_type);
        let queue = device_context
            .family_queue(queue_family_index)
            .ok_or_else(|| {
                StagerError::from(format!(
                    "No queue available in family {} for {:?}",
                    queue_family_index, queue_type
                ))
            })?;

        Ok(StagerQueueVulkan {
            device_context: device_context.clone(),
            queue,
            queue_type,
            queue_family_index,
            priority,
        })
    }

    pub fn queue_id(&self) -> u32 {
        self.queue_family_index << 16
    }

    pub fn queue_type(&self) -> StagerQueueType {
        self.queue_type
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn device_context(&self) -> &StagerDeviceContextVulkan {
        &self.device_context
    }

    pub fn create_command_pool(
        &self,
        command_pool_def: &StagerCommandPoolDef,
    ) -> StagerResult<StagerCommandPoolVulkan> {
        StagerCommandPoolVulkan::new(self, command_pool_def)
    }

    pub fn wait_for_queue_idle(&self) -> StagerResult<()> {
        let queue = self.queue.lock();
        unsafe {
            self.device_context.device().queue_wait_idle(*queue)?;
        }

        Ok(())
    }

    pub fn submit(
        &self,
        command_buffers: &[&StagerCommandBufferVulkan],
        signal_fence: Option<&StagerFenceVulkan>,
    ) -> StagerResult<()> {
        let command_buffer_list: Vec<_> = command_buffers
            .iter()
            .map(|x| x.vk_command_buffer())
            .collect();

        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffer_list);

        let fence = signal_fence
            .map(|x| x.vk_fence())
            .unwrap_or_else(vk::Fence::null);
        unsafe {
            let queue = self.queue.lock();
            log::trace!(
                "submit {} command buffers to queue {:?}",
                command_buffer_list.len(),
                *queue
            );
            self.device_context
                .device()
                .queue_submit(*queue, &[submit_info], fence)?;
        }

        if let Some(signal_fence) = signal_fence {
            signal_fence.set_submitted(true);
        }

        Ok(())
    }
}
