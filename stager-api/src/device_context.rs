use crate::backends::headless::StagerDeviceContextHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerDeviceContextVulkan;
use crate::*;
use parking_lot::Mutex;

/// A cloneable, thread-safe handle used to create queues and resources.
///
/// Resources created from a device context must not be in use by the device when they are
/// dropped.
#[derive(Clone, Debug)]
pub enum StagerDeviceContext {
    Headless(StagerDeviceContextHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerDeviceContextVulkan),
}

impl StagerDeviceContext {
    /// Create a software device. Always available.
    pub fn new_headless(device_def: &StagerHeadlessDeviceDef) -> StagerResult<Self> {
        Ok(StagerDeviceContext::Headless(
            StagerDeviceContextHeadless::new(device_def)?,
        ))
    }

    /// Get metadata about the device
    pub fn device_info(&self) -> &StagerDeviceInfo {
        match self {
            StagerDeviceContext::Headless(inner) => inner.device_info(),
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => inner.device_info(),
        }
    }

    /// Every queue submission made on behalf of this device must hold this lock
    pub fn submission_lock(&self) -> &Mutex<()> {
        match self {
            StagerDeviceContext::Headless(inner) => inner.submission_lock(),
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => inner.submission_lock(),
        }
    }

    /// Create a queue
    pub fn create_queue(
        &self,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
    ) -> StagerResult<StagerQueue> {
        Ok(match self {
            StagerDeviceContext::Headless(inner) => {
                StagerQueue::Headless(inner.create_queue(queue_type, priority)?)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => {
                StagerQueue::Vk(inner.create_queue(queue_type, priority)?)
            }
        })
    }

    /// Create a fence
    pub fn create_fence(&self) -> StagerResult<StagerFence> {
        Ok(match self {
            StagerDeviceContext::Headless(inner) => StagerFence::Headless(inner.create_fence()?),
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => StagerFence::Vk(inner.create_fence()?),
        })
    }

    /// Create a buffer
    pub fn create_buffer(
        &self,
        buffer_def: &StagerBufferDef,
    ) -> StagerResult<StagerBuffer> {
        Ok(match self {
            StagerDeviceContext::Headless(inner) => {
                StagerBuffer::Headless(inner.create_buffer(buffer_def)?)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => StagerBuffer::Vk(inner.create_buffer(buffer_def)?),
        })
    }

    /// Create a texture
    pub fn create_texture(
        &self,
        texture_def: &StagerTextureDef,
    ) -> StagerResult<StagerTexture> {
        Ok(match self {
            StagerDeviceContext::Headless(inner) => {
                StagerTexture::Headless(inner.create_texture(texture_def)?)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => {
                StagerTexture::Vk(inner.create_texture(texture_def)?)
            }
        })
    }

    /// Wait for the device (all queues) to be idle
    pub fn wait_for_device_idle(&self) -> StagerResult<()> {
        match self {
            StagerDeviceContext::Headless(inner) => inner.wait_for_device_idle(),
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(inner) => inner.wait_for_device_idle(),
        }
    }

    /// Get the underlying headless device. Used by tests for read-back and failure injection.
    pub fn headless_device_context(&self) -> Option<&StagerDeviceContextHeadless> {
        match self {
            StagerDeviceContext::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerDeviceContext::Vk(_) => None,
        }
    }

    /// Get the underlying vulkan API object. This provides access to any internally created
    /// vulkan objects.
    #[cfg(feature = "stager-vulkan")]
    pub fn vk_device_context(&self) -> Option<&StagerDeviceContextVulkan> {
        match self {
            StagerDeviceContext::Headless(_) => None,
            StagerDeviceContext::Vk(inner) => Some(inner),
        }
    }
}
