use crate::backends::headless::StagerCommandPoolHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerCommandPoolVulkan;
use crate::*;

/// A pool of command buffers. All command buffers created from a pool must be submitted to the
/// queue the pool was created from.
///
/// Command pools must not be dropped while any of their command buffers are in use by the GPU.
#[derive(Debug)]
pub enum StagerCommandPool {
    Headless(StagerCommandPoolHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerCommandPoolVulkan),
}

impl StagerCommandPool {
    /// Allocate a command buffer from the pool
    pub fn create_command_buffer(&self) -> StagerResult<StagerCommandBuffer> {
        Ok(match self {
            StagerCommandPool::Headless(inner) => {
                StagerCommandBuffer::Headless(inner.create_command_buffer()?)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerCommandPool::Vk(inner) => StagerCommandBuffer::Vk(inner.create_command_buffer()?),
        })
    }

    pub fn headless_command_pool(&self) -> Option<&StagerCommandPoolHeadless> {
        match self {
            StagerCommandPool::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandPool::Vk(_) => None,
        }
    }

    #[cfg(feature = "stager-vulkan")]
    pub fn vk_command_pool(&self) -> Option<&StagerCommandPoolVulkan> {
        match self {
            StagerCommandPool::Headless(_) => None,
            StagerCommandPool::Vk(inner) => Some(inner),
        }
    }
}
