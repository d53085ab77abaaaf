use crate::backends::headless::StagerQueueHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerQueueVulkan;
use crate::*;

/// A queue allows work to be submitted to the GPU
///
/// Submission is not internally serialized against other queues of the device. Callers that
/// share a device hold `StagerDeviceContext::submission_lock()` while submitting.
#[derive(Clone, Debug)]
pub enum StagerQueue {
    Headless(StagerQueueHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerQueueVulkan),
}

impl StagerQueue {
    /// Returns an opaque ID associated with this queue. It may be used to hash which queue a
    /// command pool is associated with
    pub fn queue_id(&self) -> u32 {
        match self {
            StagerQueue::Headless(inner) => inner.queue_id(),
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(inner) => inner.queue_id(),
        }
    }

    /// Get the type of queue that this is
    pub fn queue_type(&self) -> StagerQueueType {
        match self {
            StagerQueue::Headless(inner) => inner.queue_type(),
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(inner) => inner.queue_type(),
        }
    }

    /// Create a command pool for use with this queue
    pub fn create_command_pool(
        &self,
        command_pool_def: &StagerCommandPoolDef,
    ) -> StagerResult<StagerCommandPool> {
        Ok(match self {
            StagerQueue::Headless(inner) => {
                StagerCommandPool::Headless(inner.create_command_pool(command_pool_def)?)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(inner) => {
                StagerCommandPool::Vk(inner.create_command_pool(command_pool_def)?)
            }
        })
    }

    /// Submit command buffers for processing by the GPU. The fence, if provided, is signaled once
    /// the work completes.
    pub fn submit(
        &self,
        command_buffers: &[&StagerCommandBuffer],
        signal_fence: Option<&StagerFence>,
    ) -> StagerResult<()> {
        match self {
            StagerQueue::Headless(inner) => {
                let command_buffers = command_buffers
                    .iter()
                    .map(|x| {
                        x.headless_command_buffer()
                            .ok_or("Command buffer is not a headless command buffer")
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let signal_fence = match signal_fence {
                    Some(fence) => Some(
                        fence
                            .headless_fence()
                            .ok_or("Fence is not a headless fence")?,
                    ),
                    None => None,
                };
                inner.submit(&command_buffers, signal_fence)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(inner) => {
                let command_buffers = command_buffers
                    .iter()
                    .map(|x| {
                        x.vk_command_buffer()
                            .ok_or("Command buffer is not a vulkan command buffer")
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let signal_fence = match signal_fence {
                    Some(fence) => Some(fence.vk_fence().ok_or("Fence is not a vulkan fence")?),
                    None => None,
                };
                inner.submit(&command_buffers, signal_fence)
            }
        }
    }

    /// Wait until all work submitted to this queue is completed
    pub fn wait_for_queue_idle(&self) -> StagerResult<()> {
        match self {
            StagerQueue::Headless(inner) => inner.wait_for_queue_idle(),
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(inner) => inner.wait_for_queue_idle(),
        }
    }

    pub fn headless_queue(&self) -> Option<&StagerQueueHeadless> {
        match self {
            StagerQueue::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerQueue::Vk(_) => None,
        }
    }

    /// Get the underlying vulkan API object. This provides access to any internally created
    /// vulkan objects.
    #[cfg(feature = "stager-vulkan")]
    pub fn vk_queue(&self) -> Option<&StagerQueueVulkan> {
        match self {
            StagerQueue::Headless(_) => None,
            StagerQueue::Vk(inner) => Some(inner),
        }
    }
}
