use super::device_context::HeadlessAllocation;
use super::StagerDeviceContextHeadless;
use crate::{StagerResourceState, StagerResult, StagerTextureDef};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub(super) struct HeadlessSubresource {
    pub(super) data: Vec<u8>,
    pub(super) state: StagerResourceState,
}

pub(super) struct StagerTextureHeadlessInner {
    pub(super) id: u64,
    pub(super) texture_def: StagerTextureDef,
    // Layer-major: index = layer * mip_count + mip
    pub(super) subresources: Mutex<Vec<HeadlessSubresource>>,
    current_state: AtomicU32,
    _allocation: HeadlessAllocation,
}

/// A texture backed by host memory, one tightly packed allocation per mip level per array layer.
/// The state of every subresource is tracked so that barriers and copies can be validated.
#[derive(Clone)]
pub struct StagerTextureHeadless {
    pub(super) inner: Arc<StagerTextureHeadlessInner>,
}

impl std::fmt::Debug for StagerTextureHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerTextureHeadless")
            .field("id", &self.inner.id)
            .field("texture_def", &self.inner.texture_def)
            .finish()
    }
}

impl PartialEq for StagerTextureHeadless {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.inner.id == other.inner.id
    }
}

impl StagerTextureHeadless {
    pub fn new(
        device_context: &StagerDeviceContextHeadless,
        texture_def: &StagerTextureDef,
    ) -> StagerResult<StagerTextureHeadless> {
        texture_def.verify();

        let mut total_size = 0;
        let mut subresources = Vec::with_capacity(
            (texture_def.array_length * texture_def.mip_count) as usize,
        );
        for _layer in 0..texture_def.array_length {
            for mip in 0..texture_def.mip_count {
                let size = texture_def.mip_size_in_bytes(mip);
                total_size += size;
                subresources.push(HeadlessSubresource {
                    data: vec![0; size as usize],
                    state: StagerResourceState::UNDEFINED,
                });
            }
        }

        let allocation = device_context.allocate(total_size)?;
        let inner = StagerTextureHeadlessInner {
            id: device_context.next_resource_id(),
            texture_def: texture_def.clone(),
            subresources: Mutex::new(subresources),
            current_state: AtomicU32::new(StagerResourceState::UNDEFINED.bits()),
            _allocation: allocation,
        };

        log::trace!(
            "Created headless texture {} ({:?}, {} layers, {} mips, {} bytes)",
            inner.id,
            texture_def.extents,
            texture_def.array_length,
            texture_def.mip_count,
            total_size
        );

        Ok(StagerTextureHeadless {
            inner: Arc::new(inner),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn texture_def(&self) -> &StagerTextureDef {
        &self.inner.texture_def
    }

    pub fn current_state(&self) -> StagerResourceState {
        StagerResourceState::from_bits_truncate(self.inner.current_state.load(Ordering::Acquire))
    }

    pub fn set_current_state(
        &self,
        state: StagerResourceState,
    ) {
        self.inner
            .current_state
            .store(state.bits(), Ordering::Release);
    }

    pub(super) fn subresource_index(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> StagerResult<usize> {
        let texture_def = &self.inner.texture_def;
        if array_layer >= texture_def.array_length || mip_level >= texture_def.mip_count {
            return Err(format!(
                "Subresource (layer {}, mip {}) is outside texture {} ({} layers, {} mips)",
                array_layer,
                mip_level,
                self.inner.id,
                texture_def.array_length,
                texture_def.mip_count
            )
            .into());
        }

        Ok((array_layer * texture_def.mip_count + mip_level) as usize)
    }

    /// Read back the texels of one mip level of one array layer
    pub fn read_subresource(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> StagerResult<Vec<u8>> {
        let index = self.subresource_index(array_layer, mip_level)?;
        Ok(self.inner.subresources.lock()[index].data.clone())
    }

    /// The state the device believes one subresource is in, as moved by executed barriers
    pub fn subresource_state(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> StagerResult<StagerResourceState> {
        let index = self.subresource_index(array_layer, mip_level)?;
        Ok(self.inner.subresources.lock()[index].state)
    }
}
