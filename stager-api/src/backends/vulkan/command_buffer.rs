use super::util;
use super::{
    StagerBufferVulkan, StagerCommandPoolVulkan, StagerDeviceContextVulkan, StagerTextureVulkan,
};
use crate::{
    StagerCmdBlitParams, StagerCmdCopyBufferToBufferParams, StagerCmdCopyBufferToTextureParams,
    StagerError, StagerPipelineStage, StagerQueueType, StagerResult, StagerTextureBarrier,
};
use ash::vk;

#[derive(Debug)]
pub struct StagerCommandBufferVulkan {
    device_context: StagerDeviceContextVulkan,
    vk_command_buffer: vk::CommandBuffer,
    queue_type: StagerQueueType,
}

fn offset_3d(extents: crate::StagerExtents3D) -> vk::Offset3D {
    vk::Offset3D {
        x: extents.width as i32,
        y: extents.height as i32,
        z: extents.depth as i32,
    }
}

impl StagerCommandBufferVulkan {
    pub fn vk_command_buffer(&self) -> vk::CommandBuffer {
        self.vk_command_buffer
    }

    pub fn queue_type(&self) -> StagerQueueType {
        self.queue_type
    }

    pub fn new(command_pool: &StagerCommandPoolVulkan) -> StagerResult<StagerCommandBufferVulkan> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.vk_command_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let device_context = command_pool.device_context().clone();
        let vk_command_buffer = unsafe {
            device_context
                .device()
                .allocate_command_buffers(&allocate_info)?
        }
        .into_iter()
        .next()
        .ok_or_else(|| StagerError::from("No command buffer was allocated"))?;

        Ok(StagerCommandBufferVulkan {
            device_context,
            vk_command_buffer,
            queue_type: command_pool.queue().queue_type(),
        })
    }

    pub fn begin(&self) -> StagerResult<()> {
        let command_buffer_usage_flags = vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT;

        let begin_info = vk::CommandBufferBeginInfo::default().flags(command_buffer_usage_flags);

        unsafe {
            self.device_context
                .device()
                .begin_command_buffer(self.vk_command_buffer, &begin_info)?;
        }

        Ok(())
    }

    pub fn end(&self) -> StagerResult<()> {
        unsafe {
            self.device_context
                .device()
                .end_command_buffer(self.vk_command_buffer)?;
        }

        Ok(())
    }

    pub fn cmd_copy_buffer_to_buffer(
        &self,
        src_buffer: &StagerBufferVulkan,
        dst_buffer: &StagerBufferVulkan,
        params: &StagerCmdCopyBufferToBufferParams,
    ) -> StagerResult<()> {
        unsafe {
            self.device_context.device().cmd_copy_buffer(
                self.vk_command_buffer,
                src_buffer.vk_buffer(),
                dst_buffer.vk_buffer(),
                &[vk::BufferCopy {
                    src_offset: params.src_byte_offset,
                    dst_offset: params.dst_byte_offset,
                    size: params.size,
                }],
            );
        }

        Ok(())
    }

    pub fn cmd_copy_buffer_to_texture(
        &self,
        src_buffer: &StagerBufferVulkan,
        dst_texture: &StagerTextureVulkan,
        params: &StagerCmdCopyBufferToTextureParams,
    ) -> StagerResult<()> {
        let texture_def = dst_texture.texture_def();
        let extents = texture_def.extents.mip_extents(params.mip_level);

        let image_copy = vk::BufferImageCopy::default()
            .buffer_offset(params.buffer_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: params.mip_level,
                base_array_layer: params.array_layer,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extents.width,
                height: extents.height,
                depth: extents.depth,
            });

        unsafe {
            self.device_context.device().cmd_copy_buffer_to_image(
                self.vk_command_buffer,
                src_buffer.vk_buffer(),
                dst_texture.vk_image(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[image_copy],
            );
        }

        Ok(())
    }

    pub fn cmd_blit_texture(
        &self,
        texture: &StagerTextureVulkan,
        params: &StagerCmdBlitParams,
    ) -> StagerResult<()> {
        let src_subresource = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: params.src_mip_level,
            base_array_layer: params.array_layer,
            layer_count: 1,
        };

        let dst_subresource = vk::ImageSubresourceLayers {
            mip_level: params.dst_mip_level,
            ..src_subresource
        };

        let image_blit = vk::ImageBlit {
            src_subresource,
            src_offsets: [vk::Offset3D::default(), offset_3d(params.src_extents)],
            dst_subresource,
            dst_offsets: [vk::Offset3D::default(), offset_3d(params.dst_extents)],
        };

        unsafe {
            self.device_context.device().cmd_blit_image(
                self.vk_command_buffer,
                texture.vk_image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                texture.vk_image(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[image_blit],
                util::filter_to_vk(params.filter),
            );
        }

        Ok(())
    }

    pub fn cmd_texture_barrier(
        &self,
        barrier: &StagerTextureBarrier,
        src_stage: StagerPipelineStage,
        dst_stage: StagerPipelineStage,
    ) -> StagerResult<()> {
        let texture = barrier
            .texture
            .vk_texture()
            .ok_or("Texture barrier references a texture from another backend")?;

        let old_layout = util::resource_state_to_image_layout(barrier.src_state)
            .ok_or_else(|| format!("{:?} has no image layout", barrier.src_state))?;
        let new_layout = util::resource_state_to_image_layout(barrier.dst_state)
            .ok_or_else(|| format!("{:?} has no image layout", barrier.dst_state))?;

        let image_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(util::access_flags_to_vk(barrier.src_access))
            .dst_access_mask(util::access_flags_to_vk(barrier.dst_access))
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.vk_image())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: util::image_aspect_to_vk(barrier.aspect),
                base_mip_level: barrier.mip_range.start,
                level_count: barrier.mip_range.end - barrier.mip_range.start,
                base_array_layer: barrier.layer_range.start,
                layer_count: barrier.layer_range.end - barrier.layer_range.start,
            });

        unsafe {
            self.device_context.device().cmd_pipeline_barrier(
                self.vk_command_buffer,
                util::pipeline_stage_to_vk(src_stage),
                util::pipeline_stage_to_vk(dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }

        Ok(())
    }
}
