use crate::{
    StagerCmdBlitParams, StagerCmdCopyBufferToBufferParams, StagerCmdCopyBufferToTextureParams,
    StagerPipelineStage, StagerQueueType, StagerResourceState,
};
use std::ops::Range;

/// A command that was executed by a successful headless submission. Resources are identified by
/// the id the device assigned them at creation.
#[derive(Clone, Debug, PartialEq)]
pub enum StagerHeadlessCommandRecord {
    CopyBufferToBuffer {
        src_buffer: u64,
        dst_buffer: u64,
        params: StagerCmdCopyBufferToBufferParams,
    },
    CopyBufferToTexture {
        src_buffer: u64,
        dst_texture: u64,
        params: StagerCmdCopyBufferToTextureParams,
    },
    BlitTexture {
        texture: u64,
        params: StagerCmdBlitParams,
    },
    TextureBarrier {
        texture: u64,
        src_state: StagerResourceState,
        dst_state: StagerResourceState,
        mip_range: Range<u32>,
        layer_range: Range<u32>,
        src_stage: StagerPipelineStage,
        dst_stage: StagerPipelineStage,
    },
}

impl StagerHeadlessCommandRecord {
    pub fn is_barrier(&self) -> bool {
        matches!(self, StagerHeadlessCommandRecord::TextureBarrier { .. })
    }

    pub fn is_blit(&self) -> bool {
        matches!(self, StagerHeadlessCommandRecord::BlitTexture { .. })
    }

    pub fn is_copy(&self) -> bool {
        matches!(
            self,
            StagerHeadlessCommandRecord::CopyBufferToBuffer { .. }
                | StagerHeadlessCommandRecord::CopyBufferToTexture { .. }
        )
    }
}

/// One accepted queue submission, in the order commands executed
#[derive(Clone, Debug)]
pub struct StagerHeadlessSubmission {
    pub queue_type: StagerQueueType,
    pub queue_id: u32,
    pub commands: Vec<StagerHeadlessCommandRecord>,
}

impl StagerHeadlessSubmission {
    pub fn barrier_count(&self) -> usize {
        self.commands.iter().filter(|x| x.is_barrier()).count()
    }

    pub fn blit_count(&self) -> usize {
        self.commands.iter().filter(|x| x.is_blit()).count()
    }

    pub fn copy_count(&self) -> usize {
        self.commands.iter().filter(|x| x.is_copy()).count()
    }
}
