use crate::backends::headless::StagerBufferHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerBufferVulkan;
use crate::{StagerBufferDef, StagerResult};

/// A buffer is a piece of memory that can be accessed by the GPU. It may reside in CPU or GPU
/// memory depending on how it is created.
///
/// Buffers must not be dropped if they are in use by the GPU.
#[derive(Debug)]
pub enum StagerBuffer {
    Headless(StagerBufferHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerBufferVulkan),
}

impl StagerBuffer {
    /// Copy all the data in the given slice into the buffer. The buffer must be host-visible and
    /// large enough to hold the data.
    pub fn copy_to_host_visible_buffer<T: Copy>(
        &self,
        data: &[T],
    ) -> StagerResult<()> {
        match self {
            StagerBuffer::Headless(inner) => inner.copy_to_host_visible_buffer(data),
            #[cfg(feature = "stager-vulkan")]
            StagerBuffer::Vk(inner) => inner.copy_to_host_visible_buffer(data),
        }
    }

    /// Copy all the data in the given slice into the buffer starting at the given byte offset.
    pub fn copy_to_host_visible_buffer_with_offset<T: Copy>(
        &self,
        data: &[T],
        buffer_byte_offset: u64,
    ) -> StagerResult<()> {
        match self {
            StagerBuffer::Headless(inner) => {
                inner.copy_to_host_visible_buffer_with_offset(data, buffer_byte_offset)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerBuffer::Vk(inner) => {
                inner.copy_to_host_visible_buffer_with_offset(data, buffer_byte_offset)
            }
        }
    }

    /// Return the definition used to create the buffer
    pub fn buffer_def(&self) -> &StagerBufferDef {
        match self {
            StagerBuffer::Headless(inner) => inner.buffer_def(),
            #[cfg(feature = "stager-vulkan")]
            StagerBuffer::Vk(inner) => inner.buffer_def(),
        }
    }

    /// The declared size of the buffer in bytes
    pub fn size(&self) -> u64 {
        self.buffer_def().size
    }

    pub fn headless_buffer(&self) -> Option<&StagerBufferHeadless> {
        match self {
            StagerBuffer::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerBuffer::Vk(_) => None,
        }
    }

    /// Get the underlying vulkan API object. This provides access to any internally created
    /// vulkan objects.
    #[cfg(feature = "stager-vulkan")]
    pub fn vk_buffer(&self) -> Option<&StagerBufferVulkan> {
        match self {
            StagerBuffer::Headless(_) => None,
            StagerBuffer::Vk(inner) => Some(inner),
        }
    }
}
