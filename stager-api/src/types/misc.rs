#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Information about the device, mostly limits, requirements (like memory alignment), and flags to
/// indicate whether certain features are supported
#[derive(Clone, Debug)]
pub struct StagerDeviceInfo {
    /// True if the transfer queue lives in a family separate from the graphics family. When this is
    /// false, transfer work is submitted to a graphics-capable queue.
    pub has_dedicated_transfer_queue: bool,
    pub upload_buffer_texture_alignment: u32,
    pub upload_buffer_texture_row_alignment: u32,
}

impl Default for StagerDeviceInfo {
    fn default() -> Self {
        StagerDeviceInfo {
            has_dedicated_transfer_queue: false,
            upload_buffer_texture_alignment: 16,
            upload_buffer_texture_row_alignment: 1,
        }
    }
}

/// Used to indicate which type of queue to use. Some operations require certain types of queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerQueueType {
    /// Graphics queues generally supports all operations and are a safe default choice
    Graphics,

    /// Compute queues can be used for compute-based work.
    Compute,

    /// Transfer queues are generally limited to basic operations like copying data from buffers
    /// to images.
    Transfer,
}

impl StagerQueueType {
    /// Blits require filtering hardware, which is only guaranteed on graphics queues
    pub fn supports_blit(self) -> bool {
        self == StagerQueueType::Graphics
    }
}

/// Hint passed along when a queue is requested. Backends that cannot honor priorities ignore it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerQueuePriority {
    Low,
    Medium,
    High,
}

impl Default for StagerQueuePriority {
    fn default() -> Self {
        StagerQueuePriority::Medium
    }
}

/// Indicates how the memory will be accessed and affects where in memory it needs to be allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerMemoryUsage {
    /// The memory is only accessed by the GPU
    GpuOnly,

    /// The memory is accessed by the CPU and GPU. This is typical of staging buffers.
    CpuToGpu,

    /// The memory is written by the GPU and read back by the CPU
    GpuToCpu,
}

impl StagerMemoryUsage {
    pub fn is_host_visible(self) -> bool {
        match self {
            StagerMemoryUsage::GpuOnly => false,
            StagerMemoryUsage::CpuToGpu | StagerMemoryUsage::GpuToCpu => true,
        }
    }
}

impl Default for StagerMemoryUsage {
    fn default() -> Self {
        StagerMemoryUsage::GpuOnly
    }
}

bitflags::bitflags! {
    /// Indicates how a resource will be used. In some cases, multiple flags are allowed.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct StagerResourceType: u32 {
        const UNDEFINED = 0;
        const TEXTURE = 1<<0;
        const TEXTURE_READ_WRITE = 1<<1;
        const UNIFORM_BUFFER = 1<<2;
        const BUFFER = 1<<3;
        const BUFFER_READ_WRITE = 1<<4;
        const VERTEX_BUFFER = 1<<5;
        const INDEX_BUFFER = 1<<6;
        const INDIRECT_BUFFER = 1<<7;
        /// Cubemap textures are 2d textures with six array layers
        const TEXTURE_CUBE = 1<<8 | StagerResourceType::TEXTURE.bits();
    }
}

impl StagerResourceType {
    pub fn is_buffer(self) -> bool {
        self.intersects(
            StagerResourceType::UNIFORM_BUFFER
                | StagerResourceType::BUFFER
                | StagerResourceType::BUFFER_READ_WRITE
                | StagerResourceType::VERTEX_BUFFER
                | StagerResourceType::INDEX_BUFFER
                | StagerResourceType::INDIRECT_BUFFER,
        )
    }

    pub fn is_texture(self) -> bool {
        self.intersects(StagerResourceType::TEXTURE | StagerResourceType::TEXTURE_READ_WRITE)
    }
}

bitflags::bitflags! {
    /// The current state of a resource. When an operation is performed that references a resource,
    /// it must be in the correct state. Resources are moved between state using barriers.
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct StagerResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const UNORDERED_ACCESS = 0x8;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        /// Similar to vulkan's SHADER_READ_ONLY_OPTIMAL image layout
        const SHADER_RESOURCE = 0x40 | 0x80;
        /// Similar to vulkan's TRANSFER_DST_OPTIMAL image layout
        const COPY_DST = 0x400;
        /// Similar to vulkan's TRANSFER_SRC_OPTIMAL image layout
        const COPY_SRC = 0x800;
        /// Similar to vulkan's COMMON image layout
        const COMMON = 0x2000;
    }
}

impl Default for StagerResourceState {
    fn default() -> Self {
        StagerResourceState::UNDEFINED
    }
}

/// Filtering used when a blit changes the resolution of the copied region
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerFilterType {
    Nearest,
    Linear,
}

impl Default for StagerFilterType {
    fn default() -> Self {
        StagerFilterType::Linear
    }
}

/// Selects which aspect of an image a barrier or copy applies to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerImageAspect {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

impl Default for StagerImageAspect {
    fn default() -> Self {
        StagerImageAspect::Color
    }
}

/// A 3d size for textures, copy regions, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StagerExtents3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl StagerExtents3D {
    pub fn new(
        width: u32,
        height: u32,
        depth: u32,
    ) -> Self {
        StagerExtents3D {
            width,
            height,
            depth,
        }
    }

    /// Extents of the given mip level. Each dimension is halved per level and never drops below 1.
    pub fn mip_extents(
        &self,
        mip_level: u32,
    ) -> StagerExtents3D {
        StagerExtents3D {
            width: (self.width >> mip_level).max(1),
            height: (self.height >> mip_level).max(1),
            depth: (self.depth >> mip_level).max(1),
        }
    }

    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

/// Number of mip levels required to reduce the largest dimension down to a single texel
pub fn mip_level_count_for_extents(extents: StagerExtents3D) -> u32 {
    let max_dimension = extents.width.max(extents.height).max(extents.depth).max(1);
    32 - max_dimension.leading_zeros()
}

/// Uncompressed texel formats the transfer path can upload and generate mips for
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum StagerFormat {
    UNDEFINED,
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl Default for StagerFormat {
    fn default() -> Self {
        StagerFormat::UNDEFINED
    }
}

impl StagerFormat {
    pub fn channel_count(self) -> u32 {
        match self {
            StagerFormat::UNDEFINED => 0,
            StagerFormat::R8_UNORM | StagerFormat::R32_SFLOAT => 1,
            StagerFormat::R8G8_UNORM => 2,
            StagerFormat::R8G8B8A8_UNORM
            | StagerFormat::R8G8B8A8_SRGB
            | StagerFormat::B8G8R8A8_UNORM
            | StagerFormat::B8G8R8A8_SRGB
            | StagerFormat::R32G32B32A32_SFLOAT => 4,
        }
    }

    pub fn is_float(self) -> bool {
        match self {
            StagerFormat::R32_SFLOAT | StagerFormat::R32G32B32A32_SFLOAT => true,
            _ => false,
        }
    }

    pub fn bytes_per_channel(self) -> u32 {
        if self.is_float() {
            4
        } else {
            1
        }
    }

    pub fn block_or_pixel_size_in_bytes(self) -> u32 {
        self.channel_count() * self.bytes_per_channel()
    }
}

/// Indicates the current state of a fence
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StagerFenceStatus {
    /// The fence was submitted to the command buffer and signaled as completed by the GPU
    Complete,
    /// The fence will be signaled as complete later by the GPU
    Incomplete,
    /// The fence was never submitted, or was submitted and already returned complete once, putting
    /// it back into the unsubmitted state
    Unsubmitted,
}
