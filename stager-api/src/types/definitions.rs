#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::{
    StagerExtents3D, StagerFormat, StagerMemoryUsage, StagerQueueType, StagerResourceType,
};

/// Used to create a `StagerBuffer`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StagerBufferDef {
    pub size: u64,
    pub memory_usage: StagerMemoryUsage,
    pub queue_type: StagerQueueType,
    pub resource_type: StagerResourceType,
}

impl Default for StagerBufferDef {
    fn default() -> Self {
        StagerBufferDef {
            size: 0,
            memory_usage: StagerMemoryUsage::GpuOnly,
            queue_type: StagerQueueType::Graphics,
            resource_type: StagerResourceType::UNDEFINED,
        }
    }
}

impl StagerBufferDef {
    pub fn verify(&self) {
        assert_ne!(self.size, 0);
    }

    /// A host-visible buffer used as the source of copies into device-local resources
    pub fn for_staging_buffer(
        size: usize,
        resource_type: StagerResourceType,
    ) -> StagerBufferDef {
        StagerBufferDef {
            size: size as u64,
            memory_usage: StagerMemoryUsage::CpuToGpu,
            queue_type: StagerQueueType::Transfer,
            resource_type,
        }
    }

    /// A device-local buffer that can only be filled by a device-side copy
    pub fn for_device_buffer(
        size: usize,
        resource_type: StagerResourceType,
    ) -> StagerBufferDef {
        StagerBufferDef {
            size: size as u64,
            memory_usage: StagerMemoryUsage::GpuOnly,
            queue_type: StagerQueueType::Graphics,
            resource_type,
        }
    }

    pub fn for_device_vertex_buffer(size: usize) -> StagerBufferDef {
        Self::for_device_buffer(size, StagerResourceType::VERTEX_BUFFER)
    }

    pub fn for_device_index_buffer(size: usize) -> StagerBufferDef {
        Self::for_device_buffer(size, StagerResourceType::INDEX_BUFFER)
    }
}

/// Used to create a `StagerTexture`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StagerTextureDef {
    pub extents: StagerExtents3D,
    pub array_length: u32,
    pub mip_count: u32,
    pub format: StagerFormat,
    pub resource_type: StagerResourceType,
}

impl Default for StagerTextureDef {
    fn default() -> Self {
        StagerTextureDef {
            extents: StagerExtents3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            array_length: 1,
            mip_count: 1,
            format: StagerFormat::UNDEFINED,
            resource_type: StagerResourceType::TEXTURE,
        }
    }
}

impl StagerTextureDef {
    pub fn verify(&self) {
        assert!(self.extents.width > 0);
        assert!(self.extents.height > 0);
        assert!(self.extents.depth > 0);
        assert!(self.array_length > 0);
        assert!(self.mip_count > 0);
        assert_ne!(self.format, StagerFormat::UNDEFINED);

        if self.resource_type.contains(StagerResourceType::TEXTURE_CUBE) {
            assert_eq!(self.array_length % 6, 0);
        }
    }

    /// Size of one array layer at the base mip level, tightly packed
    pub fn layer_size_in_bytes(&self) -> u64 {
        self.mip_size_in_bytes(0)
    }

    pub fn mip_size_in_bytes(
        &self,
        mip_level: u32,
    ) -> u64 {
        self.extents.mip_extents(mip_level).texel_count()
            * self.format.block_or_pixel_size_in_bytes() as u64
    }
}

/// Used to create a headless (software) device
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StagerHeadlessDeviceDef {
    /// Reported through `StagerDeviceInfo`. Controls whether transfer and graphics queues are
    /// considered separate.
    pub has_dedicated_transfer_queue: bool,
    /// If set, allocations that would push the total allocated bytes past this limit fail
    pub allocation_limit: Option<u64>,
    pub upload_buffer_texture_alignment: u32,
}

impl Default for StagerHeadlessDeviceDef {
    fn default() -> Self {
        StagerHeadlessDeviceDef {
            has_dedicated_transfer_queue: true,
            allocation_limit: None,
            upload_buffer_texture_alignment: 16,
        }
    }
}

/// Used to create a `StagerCommandPool`
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct StagerCommandPoolDef {
    /// Set to true if the command buffers allocated from the pool are short-lived, like one-shot
    /// uploads
    pub transient: bool,
}
