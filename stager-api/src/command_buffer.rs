use crate::backends::headless::StagerCommandBufferHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerCommandBufferVulkan;
use crate::*;

/// A list of commands recorded by the CPU and submitted to the GPU.
///
/// Every command buffer here is recorded for one-time submission: `begin()` discards anything
/// previously recorded.
#[derive(Debug)]
pub enum StagerCommandBuffer {
    Headless(StagerCommandBufferHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerCommandBufferVulkan),
}

impl StagerCommandBuffer {
    /// Begins writing a command buffer. This can only be called when the command buffer is first
    /// allocated or after the previous recording was submitted.
    pub fn begin(&self) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => inner.begin(),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => inner.begin(),
        }
    }

    /// End writing the command buffer. This must be called before submitting the command buffer
    /// to the GPU
    pub fn end(&self) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => inner.end(),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => inner.end(),
        }
    }

    /// Copy a byte range from one buffer to another
    pub fn cmd_copy_buffer_to_buffer(
        &self,
        src_buffer: &StagerBuffer,
        dst_buffer: &StagerBuffer,
        params: &StagerCmdCopyBufferToBufferParams,
    ) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => inner.cmd_copy_buffer_to_buffer(
                src_buffer
                    .headless_buffer()
                    .ok_or("Source buffer is not a headless buffer")?,
                dst_buffer
                    .headless_buffer()
                    .ok_or("Destination buffer is not a headless buffer")?,
                params,
            ),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => inner.cmd_copy_buffer_to_buffer(
                src_buffer
                    .vk_buffer()
                    .ok_or("Source buffer is not a vulkan buffer")?,
                dst_buffer
                    .vk_buffer()
                    .ok_or("Destination buffer is not a vulkan buffer")?,
                params,
            ),
        }
    }

    /// Copy tightly packed texels from a buffer into one mip level of one array layer of a
    /// texture. The subresource must be in `COPY_DST`.
    pub fn cmd_copy_buffer_to_texture(
        &self,
        src_buffer: &StagerBuffer,
        dst_texture: &StagerTexture,
        params: &StagerCmdCopyBufferToTextureParams,
    ) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => inner.cmd_copy_buffer_to_texture(
                src_buffer
                    .headless_buffer()
                    .ok_or("Source buffer is not a headless buffer")?,
                dst_texture
                    .headless_texture()
                    .ok_or("Destination texture is not a headless texture")?,
                params,
            ),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => inner.cmd_copy_buffer_to_texture(
                src_buffer
                    .vk_buffer()
                    .ok_or("Source buffer is not a vulkan buffer")?,
                dst_texture
                    .vk_texture()
                    .ok_or("Destination texture is not a vulkan texture")?,
                params,
            ),
        }
    }

    /// Filtered copy from one mip level into another within the same array layer. The source
    /// level must be in `COPY_SRC` and the destination level in `COPY_DST`. Requires a
    /// graphics-capable queue.
    pub fn cmd_blit_texture(
        &self,
        texture: &StagerTexture,
        params: &StagerCmdBlitParams,
    ) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => inner.cmd_blit_texture(
                texture
                    .headless_texture()
                    .ok_or("Texture is not a headless texture")?,
                params,
            ),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => inner.cmd_blit_texture(
                texture.vk_texture().ok_or("Texture is not a vulkan texture")?,
                params,
            ),
        }
    }

    /// Add a memory barrier that moves a sub-range of a texture between states
    pub fn cmd_texture_barrier(
        &self,
        barrier: &StagerTextureBarrier,
        src_stage: StagerPipelineStage,
        dst_stage: StagerPipelineStage,
    ) -> StagerResult<()> {
        match self {
            StagerCommandBuffer::Headless(inner) => {
                inner.cmd_texture_barrier(barrier, src_stage, dst_stage)
            }
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(inner) => {
                inner.cmd_texture_barrier(barrier, src_stage, dst_stage)
            }
        }
    }

    pub fn headless_command_buffer(&self) -> Option<&StagerCommandBufferHeadless> {
        match self {
            StagerCommandBuffer::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerCommandBuffer::Vk(_) => None,
        }
    }

    #[cfg(feature = "stager-vulkan")]
    pub fn vk_command_buffer(&self) -> Option<&StagerCommandBufferVulkan> {
        match self {
            StagerCommandBuffer::Headless(_) => None,
            StagerCommandBuffer::Vk(inner) => Some(inner),
        }
    }
}
