//! The state machine every mip level of an uploaded image walks through, and the ordered list of
//! barriers, copies and blits that drives an image through it.
//!
//! Nothing here touches a device. `ImageUploadPlan` is computed from the image's shape alone and
//! replayed into command buffers by the image upload path, so the sequencing can be checked on its
//! own.

use stager_api::{
    StagerAccessFlags, StagerExtents3D, StagerFilterType, StagerPipelineStage, StagerQueueType,
    StagerResourceState, StagerTexture, StagerTextureBarrier, StagerTextureDef,
};
use std::ops::Range;

/// The states a mip level passes through during an upload
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LevelState {
    Undefined,
    TransferDestination,
    TransferSource,
    ShaderReadOnly,
}

impl LevelState {
    pub fn resource_state(self) -> StagerResourceState {
        match self {
            LevelState::Undefined => StagerResourceState::UNDEFINED,
            LevelState::TransferDestination => StagerResourceState::COPY_DST,
            LevelState::TransferSource => StagerResourceState::COPY_SRC,
            LevelState::ShaderReadOnly => StagerResourceState::SHADER_RESOURCE,
        }
    }

    /// Returns None for resource states the upload state machine never uses
    pub fn from_resource_state(state: StagerResourceState) -> Option<LevelState> {
        if state == StagerResourceState::UNDEFINED {
            Some(LevelState::Undefined)
        } else if state == StagerResourceState::COPY_DST {
            Some(LevelState::TransferDestination)
        } else if state == StagerResourceState::COPY_SRC {
            Some(LevelState::TransferSource)
        } else if state == StagerResourceState::SHADER_RESOURCE {
            Some(LevelState::ShaderReadOnly)
        } else {
            None
        }
    }

    fn access(self) -> StagerAccessFlags {
        StagerAccessFlags::from_resource_state(self.resource_state())
    }

    // Stages that produce (as a source) or consume (as a destination) a level in this state
    fn pipeline_stage(self) -> StagerPipelineStage {
        match self {
            LevelState::Undefined => StagerPipelineStage::TOP_OF_PIPE,
            LevelState::TransferDestination | LevelState::TransferSource => {
                StagerPipelineStage::TRANSFER
            }
            LevelState::ShaderReadOnly => {
                StagerPipelineStage::for_access(StagerQueueType::Graphics, self.access())
            }
        }
    }
}

/// Transitions that are part of the upload state machine
pub fn is_legal_transition(
    from: LevelState,
    to: LevelState,
) -> bool {
    matches!(
        (from, to),
        (LevelState::Undefined, LevelState::TransferDestination)
            | (LevelState::TransferDestination, LevelState::TransferSource)
            | (LevelState::TransferDestination, LevelState::ShaderReadOnly)
            | (LevelState::TransferSource, LevelState::ShaderReadOnly)
    )
}

/// A block of mip levels and array layers
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub mip_range: Range<u32>,
    pub layer_range: Range<u32>,
}

impl SubresourceRange {
    pub fn whole(
        mip_count: u32,
        array_length: u32,
    ) -> Self {
        SubresourceRange {
            mip_range: 0..mip_count,
            layer_range: 0..array_length,
        }
    }

    /// Mip level 0 of every layer
    pub fn base_level(array_length: u32) -> Self {
        SubresourceRange {
            mip_range: 0..1,
            layer_range: 0..array_length,
        }
    }

    /// Exactly one mip level of one layer
    pub fn level(
        array_layer: u32,
        mip_level: u32,
    ) -> Self {
        SubresourceRange {
            mip_range: mip_level..mip_level + 1,
            layer_range: array_layer..array_layer + 1,
        }
    }

    pub fn contains(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> bool {
        self.mip_range.contains(&mip_level) && self.layer_range.contains(&array_layer)
    }
}

/// Everything needed to record one state transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarrierRequest {
    pub from: LevelState,
    pub to: LevelState,
    pub range: SubresourceRange,
    pub src_access: StagerAccessFlags,
    pub dst_access: StagerAccessFlags,
    pub src_stage: StagerPipelineStage,
    pub dst_stage: StagerPipelineStage,
}

impl BarrierRequest {
    fn new(
        from: LevelState,
        to: LevelState,
        range: SubresourceRange,
    ) -> Self {
        BarrierRequest {
            from,
            to,
            range,
            src_access: from.access(),
            dst_access: to.access(),
            src_stage: from.pipeline_stage(),
            dst_stage: to.pipeline_stage(),
        }
    }

    pub fn texture_barrier<'a>(
        &self,
        texture: &'a StagerTexture,
    ) -> StagerTextureBarrier<'a> {
        StagerTextureBarrier::state_transition(
            texture,
            self.from.resource_state(),
            self.to.resource_state(),
        )
        .access(self.src_access, self.dst_access)
        .mip_range(self.range.mip_range.clone())
        .layer_range(self.range.layer_range.clone())
    }
}

/// The barrier that moves `range` from `from` to `to`, or None if the upload state machine has no
/// such transition.
pub fn required_barrier(
    from: LevelState,
    to: LevelState,
    range: SubresourceRange,
) -> Option<BarrierRequest> {
    if is_legal_transition(from, to) {
        Some(BarrierRequest::new(from, to, range))
    } else {
        None
    }
}

// Append the barrier for a transition of the upload state machine
fn push_transition(
    steps: &mut Vec<UploadStep>,
    from: LevelState,
    to: LevelState,
    range: SubresourceRange,
) {
    let barrier = required_barrier(from, to, range);
    debug_assert!(
        barrier.is_some(),
        "{:?} -> {:?} is not an upload transition",
        from,
        to
    );
    steps.extend(barrier.map(UploadStep::Barrier));
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStep {
    Barrier(BarrierRequest),
    /// Copy one tightly packed layer from the scratch buffer into mip level 0
    CopyLayer {
        array_layer: u32,
    },
    /// Fill `dst_mip_level` by filtering `src_mip_level` of the same layer
    Blit {
        array_layer: u32,
        src_mip_level: u32,
        dst_mip_level: u32,
        src_extents: StagerExtents3D,
        dst_extents: StagerExtents3D,
        filter: StagerFilterType,
    },
}

impl UploadStep {
    pub fn is_barrier(&self) -> bool {
        matches!(self, UploadStep::Barrier(_))
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, UploadStep::CopyLayer { .. })
    }

    pub fn is_blit(&self) -> bool {
        matches!(self, UploadStep::Blit { .. })
    }
}

/// The ordered steps of an image upload, split by the queue they run on.
///
/// The transfer phase moves mip 0 of every layer to `TransferDestination`, copies each layer in,
/// and, if there are more levels, moves mip 0 on to `TransferSource`. The graphics phase walks
/// every layer and level, promoting the level to `TransferDestination`, blitting the level above
/// into it and demoting it to `TransferSource` so it can seed the next one, and finishes with one
/// barrier taking the whole image to `ShaderReadOnly`.
#[derive(Clone, Debug)]
pub struct ImageUploadPlan {
    extents: StagerExtents3D,
    mip_count: u32,
    array_length: u32,
    transfer_phase: Vec<UploadStep>,
    graphics_phase: Vec<UploadStep>,
}

impl ImageUploadPlan {
    pub fn new(
        width: u32,
        height: u32,
        mip_count: u32,
        array_length: u32,
    ) -> Self {
        Self::for_extents(
            StagerExtents3D::new(width, height, 1),
            mip_count,
            array_length,
        )
    }

    pub fn for_texture_def(texture_def: &StagerTextureDef) -> Self {
        Self::for_extents(
            texture_def.extents,
            texture_def.mip_count,
            texture_def.array_length,
        )
    }

    pub fn for_extents(
        extents: StagerExtents3D,
        mip_count: u32,
        array_length: u32,
    ) -> Self {
        let mip_count = mip_count.max(1);
        let array_length = array_length.max(1);

        let mut transfer_phase = Vec::with_capacity(array_length as usize + 2);
        push_transition(
            &mut transfer_phase,
            LevelState::Undefined,
            LevelState::TransferDestination,
            SubresourceRange::base_level(array_length),
        );

        for array_layer in 0..array_length {
            transfer_phase.push(UploadStep::CopyLayer { array_layer });
        }

        let mut graphics_phase = Vec::default();
        if mip_count > 1 {
            push_transition(
                &mut transfer_phase,
                LevelState::TransferDestination,
                LevelState::TransferSource,
                SubresourceRange::base_level(array_length),
            );

            graphics_phase.reserve((array_length * (mip_count - 1) * 3 + 1) as usize);
            for array_layer in 0..array_length {
                for mip_level in 1..mip_count {
                    push_transition(
                        &mut graphics_phase,
                        LevelState::Undefined,
                        LevelState::TransferDestination,
                        SubresourceRange::level(array_layer, mip_level),
                    );

                    graphics_phase.push(UploadStep::Blit {
                        array_layer,
                        src_mip_level: mip_level - 1,
                        dst_mip_level: mip_level,
                        src_extents: extents.mip_extents(mip_level - 1),
                        dst_extents: extents.mip_extents(mip_level),
                        filter: StagerFilterType::Linear,
                    });

                    push_transition(
                        &mut graphics_phase,
                        LevelState::TransferDestination,
                        LevelState::TransferSource,
                        SubresourceRange::level(array_layer, mip_level),
                    );
                }
            }

            push_transition(
                &mut graphics_phase,
                LevelState::TransferSource,
                LevelState::ShaderReadOnly,
                SubresourceRange::whole(mip_count, array_length),
            );
        } else {
            push_transition(
                &mut graphics_phase,
                LevelState::TransferDestination,
                LevelState::ShaderReadOnly,
                SubresourceRange::whole(mip_count, array_length),
            );
        }

        ImageUploadPlan {
            extents,
            mip_count,
            array_length,
            transfer_phase,
            graphics_phase,
        }
    }

    pub fn extents(&self) -> StagerExtents3D {
        self.extents
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn array_length(&self) -> u32 {
        self.array_length
    }

    pub fn transfer_phase(&self) -> &[UploadStep] {
        &self.transfer_phase
    }

    pub fn graphics_phase(&self) -> &[UploadStep] {
        &self.graphics_phase
    }

    /// The state the image is left in once the transfer phase has been submitted
    pub fn transfer_phase_state(&self) -> LevelState {
        if self.mip_count > 1 {
            LevelState::TransferSource
        } else {
            LevelState::TransferDestination
        }
    }

    /// The state the image is left in once the graphics phase has been submitted
    pub fn graphics_phase_state(&self) -> LevelState {
        LevelState::ShaderReadOnly
    }

    pub fn steps(&self) -> impl Iterator<Item = &UploadStep> {
        self.transfer_phase.iter().chain(self.graphics_phase.iter())
    }

    pub fn barrier_count(&self) -> usize {
        self.steps().filter(|x| x.is_barrier()).count()
    }

    pub fn copy_count(&self) -> usize {
        self.steps().filter(|x| x.is_copy()).count()
    }

    pub fn blit_count(&self) -> usize {
        self.steps().filter(|x| x.is_blit()).count()
    }

    /// Every state one subresource passes through, starting from `Undefined`
    pub fn level_states(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> Vec<LevelState> {
        let mut states = vec![LevelState::Undefined];
        for step in self.steps() {
            if let UploadStep::Barrier(barrier) = step {
                if barrier.range.contains(array_layer, mip_level) {
                    states.push(barrier.to);
                }
            }
        }

        states
    }
}
