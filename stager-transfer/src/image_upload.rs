use crate::{
    ImageUploadPlan, ScratchBufferGuard, TransferError, TransferManager, TransferResult,
    UploadStep,
};
use stager_api::{
    StagerBuffer, StagerCmdBlitParams, StagerCmdCopyBufferToTextureParams, StagerCommandBuffer,
    StagerResult, StagerTexture,
};

// Record a phase of the plan. Copies read layer `i` from `i * layer_size` in the scratch buffer.
fn record_upload_steps(
    command_buffer: &StagerCommandBuffer,
    scratch_buffer: &StagerBuffer,
    texture: &StagerTexture,
    steps: &[UploadStep],
    layer_size: u64,
) -> StagerResult<()> {
    for step in steps {
        match step {
            UploadStep::Barrier(barrier) => {
                log::trace!(
                    "barrier {:?} -> {:?} mips {:?} layers {:?}",
                    barrier.from,
                    barrier.to,
                    barrier.range.mip_range,
                    barrier.range.layer_range
                );
                command_buffer.cmd_texture_barrier(
                    &barrier.texture_barrier(texture),
                    barrier.src_stage,
                    barrier.dst_stage,
                )?;
            }
            UploadStep::CopyLayer { array_layer } => {
                command_buffer.cmd_copy_buffer_to_texture(
                    scratch_buffer,
                    texture,
                    &StagerCmdCopyBufferToTextureParams {
                        buffer_offset: *array_layer as u64 * layer_size,
                        array_layer: *array_layer,
                        mip_level: 0,
                    },
                )?;
            }
            UploadStep::Blit {
                array_layer,
                src_mip_level,
                dst_mip_level,
                src_extents,
                dst_extents,
                filter,
            } => {
                command_buffer.cmd_blit_texture(
                    texture,
                    &StagerCmdBlitParams {
                        src_mip_level: *src_mip_level,
                        dst_mip_level: *dst_mip_level,
                        src_extents: *src_extents,
                        dst_extents: *dst_extents,
                        array_layer: *array_layer,
                        filter: *filter,
                    },
                )?;
            }
        }
    }

    Ok(())
}

impl TransferManager {
    /// Upload every array layer of `dst_texture` from `region` and generate the rest of its mip
    /// chain. `region` holds the base level of each layer, tightly packed and layer-major. On
    /// success the texture is in `SHADER_RESOURCE`.
    #[profiling::function]
    pub fn upload_to_image(
        &self,
        dst_texture: &StagerTexture,
        region: &[u8],
    ) -> TransferResult<()> {
        self.ensure_usable()?;

        let texture_def = dst_texture.texture_def();
        let expected = texture_def.layer_size_in_bytes() * texture_def.array_length as u64;
        if (region.len() as u64) < expected {
            log::error!(
                "{}: image upload needs {} bytes for {} layers of {:?} but the region has {}",
                self.identifier(),
                expected,
                texture_def.array_length,
                texture_def.extents,
                region.len()
            );
            return Err(TransferError::InvalidRegion {
                expected,
                actual: region.len() as u64,
            });
        }

        let mut scratch_buffer = self.scratch_buffer(expected as usize)?;
        scratch_buffer.write(&region[..expected as usize])?;
        self.transfer_to_image(&scratch_buffer, dst_texture)
    }

    /// Like `upload_to_image`, with the base level of each array layer supplied separately (cube
    /// faces, animation frames). There must be exactly one slice per layer, each exactly one layer
    /// in size.
    pub fn upload_layers_to_image(
        &self,
        dst_texture: &StagerTexture,
        layers: &[&[u8]],
    ) -> TransferResult<()> {
        self.ensure_usable()?;

        let texture_def = dst_texture.texture_def();
        let layer_size = texture_def.layer_size_in_bytes();
        let expected = layer_size * texture_def.array_length as u64;
        if layers.len() != texture_def.array_length as usize
            || layers.iter().any(|x| x.len() as u64 != layer_size)
        {
            let actual: u64 = layers.iter().map(|x| x.len() as u64).sum();
            log::error!(
                "{}: image upload needs {} layers of {} bytes, got {} layers totalling {} bytes",
                self.identifier(),
                texture_def.array_length,
                layer_size,
                layers.len(),
                actual
            );
            return Err(TransferError::InvalidRegion { expected, actual });
        }

        let mut scratch_buffer = self.scratch_buffer(expected as usize)?;
        for (array_layer, layer) in layers.iter().enumerate() {
            scratch_buffer.write_at(array_layer as u64 * layer_size, layer)?;
        }

        self.transfer_to_image(&scratch_buffer, dst_texture)
    }

    /// Run both upload phases for `dst_texture` from an already filled scratch buffer that holds
    /// the base level of every layer, tightly packed and layer-major.
    ///
    /// The texture's current state is updated after each phase that succeeds. If the transfer
    /// phase fails the graphics phase does not run and the current state is left as it was.
    pub fn transfer_to_image(
        &self,
        scratch_buffer: &ScratchBufferGuard,
        dst_texture: &StagerTexture,
    ) -> TransferResult<()> {
        self.ensure_usable()?;

        let texture_def = dst_texture.texture_def();
        let layer_size = texture_def.layer_size_in_bytes();
        let required = layer_size * texture_def.array_length as u64;
        if required > scratch_buffer.capacity() {
            log::error!(
                "{}: image upload of {} bytes overflows scratch buffer #{} ({} bytes)",
                self.identifier(),
                required,
                scratch_buffer.scratch_buffer().id(),
                scratch_buffer.capacity()
            );
            return Err(TransferError::CapacityOverflow {
                required,
                available: scratch_buffer.capacity(),
            });
        }

        let plan = ImageUploadPlan::for_texture_def(texture_def);
        log::debug!(
            "{}: uploading {}x{} {:?} image, {} layers, {} mip levels, {} bytes ({} copies, {} blits, {} barriers)",
            self.identifier(),
            texture_def.extents.width,
            texture_def.extents.height,
            texture_def.format,
            texture_def.array_length,
            texture_def.mip_count,
            required,
            plan.copy_count(),
            plan.blit_count(),
            plan.barrier_count()
        );

        self.record_and_submit(
            self.transfer_upload_queue(),
            "image upload (transfer phase)",
            |command_buffer| {
                record_upload_steps(
                    command_buffer,
                    scratch_buffer.buffer(),
                    dst_texture,
                    plan.transfer_phase(),
                    layer_size,
                )
            },
        )?;
        dst_texture.set_current_state(plan.transfer_phase_state().resource_state());

        self.generate_mip_chain(&plan, scratch_buffer, dst_texture, layer_size)?;
        dst_texture.set_current_state(plan.graphics_phase_state().resource_state());

        log::trace!(
            "{}: {} bytes transferred to device image",
            self.identifier(),
            required
        );
        Ok(())
    }

    #[profiling::function]
    fn generate_mip_chain(
        &self,
        plan: &ImageUploadPlan,
        scratch_buffer: &ScratchBufferGuard,
        dst_texture: &StagerTexture,
        layer_size: u64,
    ) -> TransferResult<()> {
        self.record_and_submit(
            self.graphics_upload_queue(),
            "image upload (graphics phase)",
            |command_buffer| {
                record_upload_steps(
                    command_buffer,
                    scratch_buffer.buffer(),
                    dst_texture,
                    plan.graphics_phase(),
                    layer_size,
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use stager_api::backends::headless::StagerHeadlessCommandRecord;
    use stager_api::{
        StagerDeviceContext, StagerExtents3D, StagerFormat, StagerHeadlessDeviceDef,
        StagerQueueType, StagerResourceState, StagerResourceType, StagerTexture, StagerTextureDef,
    };

    fn create_transfer_manager(
        has_dedicated_transfer_queue: bool
    ) -> (StagerDeviceContext, TransferManager) {
        let _ = env_logger::builder().is_test(true).try_init();
        let device_context = StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef {
            has_dedicated_transfer_queue,
            ..Default::default()
        })
        .unwrap();
        let transfer_manager =
            TransferManager::new(&device_context, &TransferManagerDef::default()).unwrap();
        (device_context, transfer_manager)
    }

    fn create_texture(
        device_context: &StagerDeviceContext,
        width: u32,
        height: u32,
        mip_count: u32,
        array_length: u32,
    ) -> StagerTexture {
        device_context
            .create_texture(&StagerTextureDef {
                extents: StagerExtents3D::new(width, height, 1),
                array_length,
                mip_count,
                format: StagerFormat::R8G8B8A8_UNORM,
                resource_type: StagerResourceType::TEXTURE,
            })
            .unwrap()
    }

    fn solid_layers(
        width: u32,
        height: u32,
        array_length: u32,
    ) -> Vec<u8> {
        let layer_size = (width * height * 4) as usize;
        let mut region = Vec::with_capacity(layer_size * array_length as usize);
        for array_layer in 0..array_length {
            region.extend(std::iter::repeat((array_layer as u8 + 1) * 10).take(layer_size));
        }
        region
    }

    #[test]
    fn test_single_level_upload() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 8, 4, 1, 1);

        let region: Vec<u8> = (0..8 * 4 * 4).map(|x| x as u8).collect();
        transfer_manager.upload_to_image(&texture, &region).unwrap();
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );

        let submissions = headless.submission_log();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].queue_type, StagerQueueType::Transfer);
        assert_eq!(submissions[0].barrier_count(), 1);
        assert_eq!(submissions[0].copy_count(), 1);
        assert_eq!(submissions[1].queue_type, StagerQueueType::Graphics);
        assert_eq!(submissions[1].barrier_count(), 1);
        assert_eq!(submissions[1].blit_count(), 0);

        let headless_texture = texture.headless_texture().unwrap();
        assert_eq!(headless_texture.read_subresource(0, 0).unwrap(), region);
        assert_eq!(
            headless_texture.subresource_state(0, 0).unwrap(),
            StagerResourceState::SHADER_RESOURCE
        );
    }

    #[test]
    fn test_full_mip_chain_upload() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 256, 256, 9, 1);

        transfer_manager
            .upload_to_image(&texture, &solid_layers(256, 256, 1))
            .unwrap();
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );

        let submissions = headless.submission_log();
        assert_eq!(submissions.len(), 2);
        let copy_count: usize = submissions.iter().map(|x| x.copy_count()).sum();
        let blit_count: usize = submissions.iter().map(|x| x.blit_count()).sum();
        let barrier_count: usize = submissions.iter().map(|x| x.barrier_count()).sum();
        assert_eq!(copy_count, 1);
        assert_eq!(blit_count, 8);
        assert_eq!(barrier_count, 19);

        // Blits only ever run on the graphics queue
        assert_eq!(submissions[0].blit_count(), 0);
        assert_eq!(submissions[1].queue_type, StagerQueueType::Graphics);

        let mut expected_width = 128;
        for command in &submissions[1].commands {
            if let StagerHeadlessCommandRecord::BlitTexture { params, .. } = command {
                assert_eq!(params.dst_extents.width, expected_width);
                assert_eq!(params.dst_extents.height, expected_width);
                assert_eq!(params.src_extents.width, expected_width * 2);
                expected_width /= 2;
            }
        }
        assert_eq!(expected_width, 0);

        // A solid image filters to the same value at every level
        let headless_texture = texture.headless_texture().unwrap();
        for mip_level in 0..9 {
            let size = (256 >> mip_level) as usize;
            let data = headless_texture.read_subresource(0, mip_level).unwrap();
            assert_eq!(data.len(), size * size * 4);
            assert!(data.iter().all(|&x| x == 10));
            assert_eq!(
                headless_texture.subresource_state(0, mip_level).unwrap(),
                StagerResourceState::SHADER_RESOURCE
            );
        }
    }

    #[test]
    fn test_mip_chain_halves_each_level() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let texture = create_texture(&device_context, 2, 2, 2, 1);

        // Four texels with red channels 10, 20, 30, 40
        let mut region = vec![0u8; 16];
        for (i, value) in [10u8, 20, 30, 40].iter().enumerate() {
            region[i * 4] = *value;
            region[i * 4 + 3] = 255;
        }
        transfer_manager.upload_to_image(&texture, &region).unwrap();

        let mip1 = texture
            .headless_texture()
            .unwrap()
            .read_subresource(0, 1)
            .unwrap();
        assert_eq!(mip1, vec![25, 0, 0, 255]);
    }

    #[test]
    fn test_layered_upload() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 16, 16, 5, 6);

        transfer_manager
            .upload_to_image(&texture, &solid_layers(16, 16, 6))
            .unwrap();

        let submissions = headless.submission_log();
        assert_eq!(submissions[0].copy_count(), 6);
        assert_eq!(submissions[1].blit_count(), 6 * 4);
        let barrier_count: usize = submissions.iter().map(|x| x.barrier_count()).sum();
        assert_eq!(barrier_count, 2 + 6 * 4 * 2 + 1);

        let headless_texture = texture.headless_texture().unwrap();
        for array_layer in 0..6 {
            let expected = (array_layer as u8 + 1) * 10;
            for mip_level in 0..5 {
                let data = headless_texture
                    .read_subresource(array_layer, mip_level)
                    .unwrap();
                assert!(data.iter().all(|&x| x == expected));
            }
        }
    }

    #[test]
    fn test_upload_layers_individually() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let texture = create_texture(&device_context, 4, 4, 3, 2);

        let first = vec![1u8; 64];
        let second = vec![2u8; 64];
        transfer_manager
            .upload_layers_to_image(&texture, &[first.as_slice(), second.as_slice()])
            .unwrap();

        let headless_texture = texture.headless_texture().unwrap();
        assert_eq!(headless_texture.read_subresource(0, 2).unwrap(), vec![1; 4]);
        assert_eq!(headless_texture.read_subresource(1, 2).unwrap(), vec![2; 4]);

        match transfer_manager.upload_layers_to_image(&texture, &[first.as_slice()]) {
            Err(TransferError::InvalidRegion { expected, actual }) => {
                assert_eq!(expected, 128);
                assert_eq!(actual, 64);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_short_region_is_rejected() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 8, 8, 1, 2);

        match transfer_manager.upload_to_image(&texture, &solid_layers(8, 8, 1)) {
            Err(TransferError::InvalidRegion { expected, actual }) => {
                assert_eq!(expected, 512);
                assert_eq!(actual, 256);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(headless.submission_log().is_empty());
        assert_eq!(texture.current_state(), StagerResourceState::UNDEFINED);
    }

    #[test]
    fn test_transfer_phase_failure_skips_graphics_phase() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 32, 32, 6, 1);

        headless.fail_next_submit(StagerQueueType::Transfer);
        match transfer_manager.upload_to_image(&texture, &solid_layers(32, 32, 1)) {
            Err(TransferError::SubmissionFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        assert!(headless.submission_log().is_empty());
        assert_eq!(texture.current_state(), StagerResourceState::UNDEFINED);
        assert_eq!(transfer_manager.statistics().locked_count(), 0);

        // The same upload succeeds once the device accepts work again
        transfer_manager
            .upload_to_image(&texture, &solid_layers(32, 32, 1))
            .unwrap();
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );
    }

    #[test]
    fn test_transfer_phase_failure_keeps_previous_state() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 32, 32, 6, 1);

        transfer_manager
            .upload_to_image(&texture, &solid_layers(32, 32, 1))
            .unwrap();
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );
        assert_eq!(headless.submission_log().len(), 2);

        headless.fail_next_submit(StagerQueueType::Transfer);
        match transfer_manager.upload_to_image(&texture, &solid_layers(32, 32, 1)) {
            Err(TransferError::SubmissionFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        assert_eq!(headless.submission_log().len(), 2);
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );
        let headless_texture = texture.headless_texture().unwrap();
        for mip_level in 0..6 {
            assert_eq!(
                headless_texture.subresource_state(0, mip_level).unwrap(),
                StagerResourceState::SHADER_RESOURCE
            );
        }
    }

    #[test]
    fn test_graphics_phase_failure_keeps_transfer_state() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 32, 32, 6, 1);

        headless.fail_next_submit(StagerQueueType::Graphics);
        match transfer_manager.upload_to_image(&texture, &solid_layers(32, 32, 1)) {
            Err(TransferError::SubmissionFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        assert_eq!(headless.submission_log().len(), 1);
        assert_eq!(texture.current_state(), StagerResourceState::COPY_SRC);
    }

    #[test]
    fn test_shared_queue_runs_both_phases() {
        let (device_context, transfer_manager) = create_transfer_manager(false);
        let headless = device_context.headless_device_context().unwrap();
        let texture = create_texture(&device_context, 64, 64, 7, 1);

        transfer_manager
            .upload_to_image(&texture, &solid_layers(64, 64, 1))
            .unwrap();
        assert_eq!(
            texture.current_state(),
            StagerResourceState::SHADER_RESOURCE
        );

        let submissions = headless.submission_log();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].queue_id, submissions[1].queue_id);
        assert_eq!(submissions[1].blit_count(), 6);
    }

    #[test]
    fn test_reupload_replaces_contents() {
        let (device_context, transfer_manager) = create_transfer_manager(true);
        let texture = create_texture(&device_context, 8, 8, 4, 1);

        transfer_manager
            .upload_to_image(&texture, &solid_layers(8, 8, 1))
            .unwrap();
        transfer_manager
            .upload_to_image(&texture, &vec![99u8; 8 * 8 * 4])
            .unwrap();

        let headless_texture = texture.headless_texture().unwrap();
        for mip_level in 0..4 {
            let data = headless_texture.read_subresource(0, mip_level).unwrap();
            assert!(data.iter().all(|&x| x == 99));
        }

        // Both uploads shared one scratch buffer
        assert_eq!(transfer_manager.statistics().buffer_count(), 1);
    }
}
