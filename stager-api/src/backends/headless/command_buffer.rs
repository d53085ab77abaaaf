use super::buffer::StagerBufferHeadlessInner;
use super::{
    StagerBufferHeadless, StagerHeadlessCommandRecord, StagerQueueHeadless, StagerTextureHeadless,
};
use crate::{
    StagerCmdBlitParams, StagerCmdCopyBufferToBufferParams, StagerCmdCopyBufferToTextureParams,
    StagerExtents3D, StagerFilterType, StagerFormat, StagerPipelineStage, StagerQueueType,
    StagerResourceState, StagerResult, StagerTextureBarrier,
};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::Arc;

enum HeadlessCommand {
    CopyBufferToBuffer {
        src: Arc<StagerBufferHeadlessInner>,
        dst: Arc<StagerBufferHeadlessInner>,
        params: StagerCmdCopyBufferToBufferParams,
    },
    CopyBufferToTexture {
        src: Arc<StagerBufferHeadlessInner>,
        dst: StagerTextureHeadless,
        params: StagerCmdCopyBufferToTextureParams,
    },
    BlitTexture {
        texture: StagerTextureHeadless,
        params: StagerCmdBlitParams,
    },
    TextureBarrier {
        texture: StagerTextureHeadless,
        src_state: StagerResourceState,
        dst_state: StagerResourceState,
        mip_range: Range<u32>,
        layer_range: Range<u32>,
        src_stage: StagerPipelineStage,
        dst_stage: StagerPipelineStage,
    },
}

#[derive(Default)]
struct CommandBufferState {
    is_recording: bool,
    is_executable: bool,
    commands: Vec<HeadlessCommand>,
}

/// Records commands for later execution by `StagerQueueHeadless::submit`. Recording validates
/// anything that can be known up front (ranges, extents, queue capabilities); resource states are
/// validated when the commands execute.
pub struct StagerCommandBufferHeadless {
    queue_type: StagerQueueType,
    queue_family: StagerQueueType,
    state: Mutex<CommandBufferState>,
}

impl std::fmt::Debug for StagerCommandBufferHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StagerCommandBufferHeadless")
            .field("queue_type", &self.queue_type)
            .field("is_recording", &state.is_recording)
            .field("command_count", &state.commands.len())
            .finish()
    }
}

impl StagerCommandBufferHeadless {
    pub(super) fn new(queue: &StagerQueueHeadless) -> Self {
        StagerCommandBufferHeadless {
            queue_type: queue.queue_type(),
            queue_family: queue.queue_family(),
            state: Default::default(),
        }
    }

    pub(super) fn queue_family(&self) -> StagerQueueType {
        self.queue_family
    }

    pub fn begin(&self) -> StagerResult<()> {
        let mut state = self.state.lock();
        if state.is_recording {
            return Err("begin() called on a command buffer that is already recording".into());
        }

        state.is_recording = true;
        state.is_executable = false;
        state.commands.clear();
        Ok(())
    }

    pub fn end(&self) -> StagerResult<()> {
        let mut state = self.state.lock();
        if !state.is_recording {
            return Err("end() called on a command buffer that is not recording".into());
        }

        state.is_recording = false;
        state.is_executable = true;
        Ok(())
    }

    fn record(
        &self,
        command: HeadlessCommand,
    ) -> StagerResult<()> {
        let mut state = self.state.lock();
        if !state.is_recording {
            return Err("Commands can only be recorded between begin() and end()".into());
        }

        state.commands.push(command);
        Ok(())
    }

    pub fn cmd_copy_buffer_to_buffer(
        &self,
        src_buffer: &StagerBufferHeadless,
        dst_buffer: &StagerBufferHeadless,
        params: &StagerCmdCopyBufferToBufferParams,
    ) -> StagerResult<()> {
        let src_end = params.src_byte_offset.checked_add(params.size);
        let dst_end = params.dst_byte_offset.checked_add(params.size);
        if src_end.map_or(true, |end| end > src_buffer.buffer_def().size)
            || dst_end.map_or(true, |end| end > dst_buffer.buffer_def().size)
        {
            return Err(format!(
                "Buffer copy {:?} is out of range (src is {} bytes, dst is {} bytes)",
                params,
                src_buffer.buffer_def().size,
                dst_buffer.buffer_def().size
            )
            .into());
        }

        log::trace!(
            "cmd_copy_buffer_to_buffer {} -> {} {:?}",
            src_buffer.id(),
            dst_buffer.id(),
            params
        );

        self.record(HeadlessCommand::CopyBufferToBuffer {
            src: src_buffer.inner.clone(),
            dst: dst_buffer.inner.clone(),
            params: *params,
        })
    }

    pub fn cmd_copy_buffer_to_texture(
        &self,
        src_buffer: &StagerBufferHeadless,
        dst_texture: &StagerTextureHeadless,
        params: &StagerCmdCopyBufferToTextureParams,
    ) -> StagerResult<()> {
        dst_texture.subresource_index(params.array_layer, params.mip_level)?;

        let copy_size = dst_texture.texture_def().mip_size_in_bytes(params.mip_level);
        let src_end = params.buffer_offset.checked_add(copy_size);
        if src_end.map_or(true, |end| end > src_buffer.buffer_def().size) {
            return Err(format!(
                "Copy of {} bytes from offset {} overflows source buffer of {} bytes",
                copy_size,
                params.buffer_offset,
                src_buffer.buffer_def().size
            )
            .into());
        }

        log::trace!(
            "cmd_copy_buffer_to_texture {} -> {} {:?}",
            src_buffer.id(),
            dst_texture.id(),
            params
        );

        self.record(HeadlessCommand::CopyBufferToTexture {
            src: src_buffer.inner.clone(),
            dst: dst_texture.clone(),
            params: *params,
        })
    }

    pub fn cmd_blit_texture(
        &self,
        texture: &StagerTextureHeadless,
        params: &StagerCmdBlitParams,
    ) -> StagerResult<()> {
        if self.queue_family != StagerQueueType::Graphics {
            return Err(format!(
                "Blits are not supported on a queue of the {:?} family",
                self.queue_family
            )
            .into());
        }

        if params.src_mip_level == params.dst_mip_level {
            return Err("Blit source and destination must be different mip levels".into());
        }

        texture.subresource_index(params.array_layer, params.src_mip_level)?;
        texture.subresource_index(params.array_layer, params.dst_mip_level)?;

        let texture_def = texture.texture_def();
        if !extents_fit(
            params.src_extents,
            texture_def.extents.mip_extents(params.src_mip_level),
        ) || !extents_fit(
            params.dst_extents,
            texture_def.extents.mip_extents(params.dst_mip_level),
        ) {
            return Err(format!(
                "Blit extents {:?} -> {:?} exceed the mip levels of texture {}",
                params.src_extents,
                params.dst_extents,
                texture.id()
            )
            .into());
        }

        log::trace!("cmd_blit_texture {} {:?}", texture.id(), params);

        self.record(HeadlessCommand::BlitTexture {
            texture: texture.clone(),
            params: *params,
        })
    }

    pub fn cmd_texture_barrier(
        &self,
        barrier: &StagerTextureBarrier,
        src_stage: StagerPipelineStage,
        dst_stage: StagerPipelineStage,
    ) -> StagerResult<()> {
        let texture = barrier
            .texture
            .headless_texture()
            .ok_or("Texture barrier references a texture from another backend")?;

        if !barrier.is_within_texture() {
            return Err(format!(
                "Barrier range mips {:?} layers {:?} is outside texture {}",
                barrier.mip_range,
                barrier.layer_range,
                texture.id()
            )
            .into());
        }

        log::trace!(
            "cmd_texture_barrier {} {:?} -> {:?} mips {:?} layers {:?}",
            texture.id(),
            barrier.src_state,
            barrier.dst_state,
            barrier.mip_range,
            barrier.layer_range
        );

        self.record(HeadlessCommand::TextureBarrier {
            texture: texture.clone(),
            src_state: barrier.src_state,
            dst_state: barrier.dst_state,
            mip_range: barrier.mip_range.clone(),
            layer_range: barrier.layer_range.clone(),
            src_stage,
            dst_stage,
        })
    }

    /// Runs every recorded command against host memory, returning a record of each
    pub(super) fn execute(&self) -> StagerResult<Vec<StagerHeadlessCommandRecord>> {
        let state = self.state.lock();
        if !state.is_executable {
            return Err("Command buffer must be ended before it is submitted".into());
        }

        let mut records = Vec::with_capacity(state.commands.len());
        for command in &state.commands {
            records.push(execute_command(command)?);
        }

        Ok(records)
    }
}

fn extents_fit(
    region: StagerExtents3D,
    available: StagerExtents3D,
) -> bool {
    region.width > 0
        && region.height > 0
        && region.depth > 0
        && region.width <= available.width
        && region.height <= available.height
        && region.depth <= available.depth
}

#[profiling::function]
fn execute_command(command: &HeadlessCommand) -> StagerResult<StagerHeadlessCommandRecord> {
    match command {
        HeadlessCommand::CopyBufferToBuffer { src, dst, params } => {
            let src_range = params.src_byte_offset as usize
                ..(params.src_byte_offset + params.size) as usize;
            let dst_offset = params.dst_byte_offset as usize;
            if Arc::ptr_eq(src, dst) {
                src.contents.lock().copy_within(src_range, dst_offset);
            } else {
                let src_contents = src.contents.lock();
                let mut dst_contents = dst.contents.lock();
                dst_contents[dst_offset..dst_offset + params.size as usize]
                    .copy_from_slice(&src_contents[src_range]);
            }

            Ok(StagerHeadlessCommandRecord::CopyBufferToBuffer {
                src_buffer: src.id,
                dst_buffer: dst.id,
                params: *params,
            })
        }
        HeadlessCommand::CopyBufferToTexture { src, dst, params } => {
            let index = dst.subresource_index(params.array_layer, params.mip_level)?;
            let src_contents = src.contents.lock();
            let mut subresources = dst.inner.subresources.lock();
            let subresource = &mut subresources[index];
            if subresource.state != StagerResourceState::COPY_DST {
                return Err(format!(
                    "Copy into texture {} layer {} mip {} requires COPY_DST but the subresource is {:?}",
                    dst.id(),
                    params.array_layer,
                    params.mip_level,
                    subresource.state
                )
                .into());
            }

            let start = params.buffer_offset as usize;
            let end = start + subresource.data.len();
            subresource.data.copy_from_slice(&src_contents[start..end]);

            Ok(StagerHeadlessCommandRecord::CopyBufferToTexture {
                src_buffer: src.id,
                dst_texture: dst.id(),
                params: *params,
            })
        }
        HeadlessCommand::BlitTexture { texture, params } => {
            let src_index = texture.subresource_index(params.array_layer, params.src_mip_level)?;
            let dst_index = texture.subresource_index(params.array_layer, params.dst_mip_level)?;
            let texture_def = texture.texture_def();

            let mut subresources = texture.inner.subresources.lock();
            if subresources[src_index].state != StagerResourceState::COPY_SRC
                || subresources[dst_index].state != StagerResourceState::COPY_DST
            {
                return Err(format!(
                    "Blit in texture {} requires mip {} in COPY_SRC and mip {} in COPY_DST, found {:?} and {:?}",
                    texture.id(),
                    params.src_mip_level,
                    params.dst_mip_level,
                    subresources[src_index].state,
                    subresources[dst_index].state
                )
                .into());
            }

            let src_data = subresources[src_index].data.clone();
            blit_texels(
                &src_data,
                texture_def.extents.mip_extents(params.src_mip_level),
                params.src_extents,
                &mut subresources[dst_index].data,
                texture_def.extents.mip_extents(params.dst_mip_level),
                params.dst_extents,
                texture_def.format,
                params.filter,
            );

            Ok(StagerHeadlessCommandRecord::BlitTexture {
                texture: texture.id(),
                params: *params,
            })
        }
        HeadlessCommand::TextureBarrier {
            texture,
            src_state,
            dst_state,
            mip_range,
            layer_range,
            src_stage,
            dst_stage,
        } => {
            let mut subresources = texture.inner.subresources.lock();
            for layer in layer_range.clone() {
                for mip in mip_range.clone() {
                    let index = texture.subresource_index(layer, mip)?;
                    let subresource = &mut subresources[index];
                    // Transitions out of UNDEFINED discard whatever state the subresource was in
                    if *src_state != StagerResourceState::UNDEFINED
                        && subresource.state != *src_state
                    {
                        return Err(format!(
                            "Barrier on texture {} layer {} mip {} expects {:?} but the subresource is {:?}",
                            texture.id(),
                            layer,
                            mip,
                            src_state,
                            subresource.state
                        )
                        .into());
                    }

                    subresource.state = *dst_state;
                }
            }

            Ok(StagerHeadlessCommandRecord::TextureBarrier {
                texture: texture.id(),
                src_state: *src_state,
                dst_state: *dst_state,
                mip_range: mip_range.clone(),
                layer_range: layer_range.clone(),
                src_stage: *src_stage,
                dst_stage: *dst_stage,
            })
        }
    }
}

fn read_channel(
    data: &[u8],
    offset: usize,
    format: StagerFormat,
) -> f64 {
    if format.is_float() {
        let bytes = [
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ];
        f32::from_ne_bytes(bytes) as f64
    } else {
        data[offset] as f64
    }
}

fn write_channel(
    data: &mut [u8],
    offset: usize,
    format: StagerFormat,
    value: f64,
) {
    if format.is_float() {
        data[offset..offset + 4].copy_from_slice(&(value as f32).to_ne_bytes());
    } else {
        data[offset] = value.round().clamp(0.0, 255.0) as u8;
    }
}

// Maps destination texel i of dst_size onto the half-open source range it covers
fn source_span(
    i: u32,
    src_size: u32,
    dst_size: u32,
) -> Range<u32> {
    let start = (i as u64 * src_size as u64 / dst_size as u64) as u32;
    let end = ((i as u64 + 1) * src_size as u64 / dst_size as u64) as u32;
    start..end.max(start + 1)
}

/// Rescales the region at the origin of `src` into the region at the origin of `dst`. Linear
/// filtering averages every source texel covered by a destination texel, nearest filtering takes
/// the first.
#[allow(clippy::too_many_arguments)]
fn blit_texels(
    src: &[u8],
    src_level_extents: StagerExtents3D,
    src_extents: StagerExtents3D,
    dst: &mut [u8],
    dst_level_extents: StagerExtents3D,
    dst_extents: StagerExtents3D,
    format: StagerFormat,
    filter: StagerFilterType,
) {
    let texel_size = format.block_or_pixel_size_in_bytes() as usize;
    let channel_count = format.channel_count() as usize;
    let channel_size = format.bytes_per_channel() as usize;

    let texel_offset = |extents: StagerExtents3D, x: u32, y: u32, z: u32| -> usize {
        ((z as usize * extents.height as usize + y as usize) * extents.width as usize + x as usize)
            * texel_size
    };

    for z in 0..dst_extents.depth {
        let zs = source_span(z, src_extents.depth, dst_extents.depth);
        for y in 0..dst_extents.height {
            let ys = source_span(y, src_extents.height, dst_extents.height);
            for x in 0..dst_extents.width {
                let xs = source_span(x, src_extents.width, dst_extents.width);
                let dst_offset = texel_offset(dst_level_extents, x, y, z);
                for channel in 0..channel_count {
                    let channel_offset = channel * channel_size;
                    let value = match filter {
                        StagerFilterType::Nearest => {
                            let src_offset =
                                texel_offset(src_level_extents, xs.start, ys.start, zs.start);
                            read_channel(src, src_offset + channel_offset, format)
                        }
                        StagerFilterType::Linear => {
                            let mut sum = 0.0;
                            let mut count = 0.0;
                            for sz in zs.clone() {
                                for sy in ys.clone() {
                                    for sx in xs.clone() {
                                        let src_offset = texel_offset(src_level_extents, sx, sy, sz);
                                        sum += read_channel(src, src_offset + channel_offset, format);
                                        count += 1.0;
                                    }
                                }
                            }
                            sum / count
                        }
                    };

                    write_channel(dst, dst_offset + channel_offset, format, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_span_halving() {
        assert_eq!(source_span(0, 4, 2), 0..2);
        assert_eq!(source_span(1, 4, 2), 2..4);
        // Odd sizes round down and never produce an empty span
        assert_eq!(source_span(0, 3, 1), 0..3);
        assert_eq!(source_span(0, 1, 1), 0..1);
    }

    #[test]
    fn test_blit_texels_linear_averages() {
        let extents_2x2 = StagerExtents3D::new(2, 2, 1);
        let extents_1x1 = StagerExtents3D::new(1, 1, 1);
        let src = [10u8, 20, 30, 40];
        let mut dst = [0u8; 1];
        blit_texels(
            &src,
            extents_2x2,
            extents_2x2,
            &mut dst,
            extents_1x1,
            extents_1x1,
            StagerFormat::R8_UNORM,
            StagerFilterType::Linear,
        );
        assert_eq!(dst[0], 25);
    }

    #[test]
    fn test_blit_texels_nearest_and_float() {
        let extents_2x1 = StagerExtents3D::new(2, 1, 1);
        let extents_1x1 = StagerExtents3D::new(1, 1, 1);

        let src = [7u8, 200];
        let mut dst = [0u8; 1];
        blit_texels(
            &src,
            extents_2x1,
            extents_2x1,
            &mut dst,
            extents_1x1,
            extents_1x1,
            StagerFormat::R8_UNORM,
            StagerFilterType::Nearest,
        );
        assert_eq!(dst[0], 7);

        let mut src = Vec::new();
        src.extend_from_slice(&1.0f32.to_ne_bytes());
        src.extend_from_slice(&2.0f32.to_ne_bytes());
        let mut dst = [0u8; 4];
        blit_texels(
            &src,
            extents_2x1,
            extents_2x1,
            &mut dst,
            extents_1x1,
            extents_1x1,
            StagerFormat::R32_SFLOAT,
            StagerFilterType::Linear,
        );
        assert_eq!(f32::from_ne_bytes(dst), 1.5);
    }
}
