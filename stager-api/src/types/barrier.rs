use crate::{
    StagerExtents3D, StagerFilterType, StagerImageAspect, StagerQueueType, StagerResourceState,
    StagerTexture,
};
use std::ops::Range;

bitflags::bitflags! {
    /// Memory accesses that a barrier makes available (source) or visible (destination). Similar
    /// to VkAccessFlags
    #[derive(Default)]
    pub struct StagerAccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 1<<0;
        const INDEX_READ = 1<<1;
        const VERTEX_ATTRIBUTE_READ = 1<<2;
        const UNIFORM_READ = 1<<3;
        const SHADER_READ = 1<<5;
        const SHADER_WRITE = 1<<6;
        const TRANSFER_READ = 1<<11;
        const TRANSFER_WRITE = 1<<12;
        const HOST_READ = 1<<13;
        const HOST_WRITE = 1<<14;
        const MEMORY_READ = 1<<15;
        const MEMORY_WRITE = 1<<16;
    }
}

impl StagerAccessFlags {
    /// The accesses implied by a resource being in the given state
    pub fn from_resource_state(state: StagerResourceState) -> StagerAccessFlags {
        let mut flags = StagerAccessFlags::empty();
        if state.intersects(StagerResourceState::COPY_SRC) {
            flags |= StagerAccessFlags::TRANSFER_READ;
        }

        if state.intersects(StagerResourceState::COPY_DST) {
            flags |= StagerAccessFlags::TRANSFER_WRITE;
        }

        if state.intersects(StagerResourceState::VERTEX_AND_CONSTANT_BUFFER) {
            flags |= StagerAccessFlags::UNIFORM_READ | StagerAccessFlags::VERTEX_ATTRIBUTE_READ;
        }

        if state.intersects(StagerResourceState::INDEX_BUFFER) {
            flags |= StagerAccessFlags::INDEX_READ;
        }

        if state.intersects(StagerResourceState::UNORDERED_ACCESS) {
            flags |= StagerAccessFlags::SHADER_READ | StagerAccessFlags::SHADER_WRITE;
        }

        if state.intersects(StagerResourceState::SHADER_RESOURCE) {
            flags |= StagerAccessFlags::SHADER_READ;
        }

        if state.intersects(StagerResourceState::COMMON) {
            flags |= StagerAccessFlags::MEMORY_READ | StagerAccessFlags::MEMORY_WRITE;
        }

        flags
    }
}

bitflags::bitflags! {
    /// Pipeline stages a barrier waits on (source) or blocks (destination). Similar to
    /// VkPipelineStageFlags
    #[derive(Default)]
    pub struct StagerPipelineStage: u32 {
        const TOP_OF_PIPE = 1<<0;
        const DRAW_INDIRECT = 1<<1;
        const VERTEX_INPUT = 1<<2;
        const VERTEX_SHADER = 1<<3;
        const FRAGMENT_SHADER = 1<<7;
        const COMPUTE_SHADER = 1<<11;
        const TRANSFER = 1<<12;
        const BOTTOM_OF_PIPE = 1<<13;
        const HOST = 1<<14;
        const ALL_COMMANDS = 1<<16;
    }
}

impl StagerPipelineStage {
    // Based on what is being accessed, determine what stages need to be blocked
    pub fn for_access(
        queue_type: StagerQueueType,
        access_flags: StagerAccessFlags,
    ) -> StagerPipelineStage {
        let mut flags = StagerPipelineStage::empty();
        match queue_type {
            StagerQueueType::Graphics => {
                if access_flags.intersects(
                    StagerAccessFlags::INDEX_READ | StagerAccessFlags::VERTEX_ATTRIBUTE_READ,
                ) {
                    flags |= StagerPipelineStage::VERTEX_INPUT;
                }

                if access_flags.intersects(
                    StagerAccessFlags::UNIFORM_READ
                        | StagerAccessFlags::SHADER_READ
                        | StagerAccessFlags::SHADER_WRITE,
                ) {
                    flags |= StagerPipelineStage::VERTEX_SHADER;
                    flags |= StagerPipelineStage::FRAGMENT_SHADER;
                    flags |= StagerPipelineStage::COMPUTE_SHADER;
                }
            }
            StagerQueueType::Compute => {
                if access_flags.intersects(
                    StagerAccessFlags::INDEX_READ | StagerAccessFlags::VERTEX_ATTRIBUTE_READ,
                ) {
                    return StagerPipelineStage::ALL_COMMANDS;
                }

                if access_flags.intersects(
                    StagerAccessFlags::UNIFORM_READ
                        | StagerAccessFlags::SHADER_READ
                        | StagerAccessFlags::SHADER_WRITE,
                ) {
                    flags |= StagerPipelineStage::COMPUTE_SHADER;
                }
            }
            StagerQueueType::Transfer => {
                return StagerPipelineStage::ALL_COMMANDS;
            }
        }

        if access_flags.intersects(StagerAccessFlags::INDIRECT_COMMAND_READ) {
            flags |= StagerPipelineStage::DRAW_INDIRECT;
        }

        if access_flags
            .intersects(StagerAccessFlags::TRANSFER_READ | StagerAccessFlags::TRANSFER_WRITE)
        {
            flags |= StagerPipelineStage::TRANSFER;
        }

        if access_flags.intersects(StagerAccessFlags::HOST_READ | StagerAccessFlags::HOST_WRITE) {
            flags |= StagerPipelineStage::HOST;
        }

        if access_flags
            .intersects(StagerAccessFlags::MEMORY_READ | StagerAccessFlags::MEMORY_WRITE)
        {
            flags |= StagerPipelineStage::ALL_COMMANDS;
        }

        if flags.is_empty() {
            flags |= StagerPipelineStage::TOP_OF_PIPE;
        }

        flags
    }
}

/// A memory barrier for textures. This is used to transition a sub-range of a texture's mip levels
/// and array layers between resource states.
///
/// By default the barrier covers every mip level and array layer of the texture, with access masks
/// derived from the states. Narrow it with the builder-style setters:
///
/// ```ignore
/// let barrier = StagerTextureBarrier::state_transition(
///     &texture,
///     StagerResourceState::UNDEFINED,
///     StagerResourceState::COPY_DST,
/// )
/// .mip_level(0);
/// ```
#[derive(Clone, Debug)]
pub struct StagerTextureBarrier<'a> {
    pub texture: &'a StagerTexture,
    pub src_state: StagerResourceState,
    pub dst_state: StagerResourceState,
    pub src_access: StagerAccessFlags,
    pub dst_access: StagerAccessFlags,
    pub aspect: StagerImageAspect,
    pub mip_range: Range<u32>,
    pub layer_range: Range<u32>,
}

impl<'a> StagerTextureBarrier<'a> {
    /// Creates a simple state transition
    pub fn state_transition(
        texture: &'a StagerTexture,
        src_state: StagerResourceState,
        dst_state: StagerResourceState,
    ) -> StagerTextureBarrier<'a> {
        let texture_def = texture.texture_def();
        StagerTextureBarrier {
            texture,
            src_state,
            dst_state,
            src_access: StagerAccessFlags::from_resource_state(src_state),
            dst_access: StagerAccessFlags::from_resource_state(dst_state),
            aspect: StagerImageAspect::Color,
            mip_range: 0..texture_def.mip_count,
            layer_range: 0..texture_def.array_length,
        }
    }

    pub fn access(
        mut self,
        src_access: StagerAccessFlags,
        dst_access: StagerAccessFlags,
    ) -> Self {
        self.src_access = src_access;
        self.dst_access = dst_access;
        self
    }

    pub fn aspect(
        mut self,
        aspect: StagerImageAspect,
    ) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn mip_range(
        mut self,
        mip_range: Range<u32>,
    ) -> Self {
        self.mip_range = mip_range;
        self
    }

    pub fn mip_level(
        self,
        mip_level: u32,
    ) -> Self {
        self.mip_range(mip_level..mip_level + 1)
    }

    pub fn layer_range(
        mut self,
        layer_range: Range<u32>,
    ) -> Self {
        self.layer_range = layer_range;
        self
    }

    pub fn layer(
        self,
        layer: u32,
    ) -> Self {
        self.layer_range(layer..layer + 1)
    }

    /// Returns true if the barrier's range lies within the texture's mips and layers
    pub fn is_within_texture(&self) -> bool {
        let texture_def = self.texture.texture_def();
        self.mip_range.start < self.mip_range.end
            && self.mip_range.end <= texture_def.mip_count
            && self.layer_range.start < self.layer_range.end
            && self.layer_range.end <= texture_def.array_length
    }
}

/// Parameters for copying a region of one buffer into another
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagerCmdCopyBufferToBufferParams {
    pub src_byte_offset: u64,
    pub dst_byte_offset: u64,
    pub size: u64,
}

/// Parameters for copying tightly packed texel data from a buffer into one subresource of a
/// texture. The full extents of the mip level are written.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagerCmdCopyBufferToTextureParams {
    pub buffer_offset: u64,
    pub array_layer: u32,
    pub mip_level: u32,
}

/// Parameters for a filtered copy between two mip levels of the same array layer of a texture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagerCmdBlitParams {
    pub src_mip_level: u32,
    pub dst_mip_level: u32,
    pub src_extents: StagerExtents3D,
    pub dst_extents: StagerExtents3D,
    pub array_layer: u32,
    pub filter: StagerFilterType,
}
