use super::{
    StagerCommandBufferHeadless, StagerCommandPoolHeadless, StagerDeviceContextHeadless,
    StagerFenceHeadless, StagerHeadlessSubmission,
};
use crate::{StagerCommandPoolDef, StagerQueuePriority, StagerQueueType, StagerResult};

#[derive(Clone, Debug)]
pub struct StagerQueueHeadless {
    device_context: StagerDeviceContextHeadless,
    queue_type: StagerQueueType,
    priority: StagerQueuePriority,
    queue_id: u32,
}

impl StagerQueueHeadless {
    pub(super) fn new(
        device_context: &StagerDeviceContextHeadless,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
        queue_id: u32,
    ) -> Self {
        log::trace!(
            "Created headless {:?} queue {} ({:?} priority)",
            queue_type,
            queue_id,
            priority
        );

        StagerQueueHeadless {
            device_context: device_context.clone(),
            queue_type,
            priority,
            queue_id,
        }
    }

    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    pub fn queue_type(&self) -> StagerQueueType {
        self.queue_type
    }

    pub fn priority(&self) -> StagerQueuePriority {
        self.priority
    }

    pub fn device_context(&self) -> &StagerDeviceContextHeadless {
        &self.device_context
    }

    /// The kind of hardware family the queue is allocated from. Without a dedicated transfer
    /// family, transfer queues come from the graphics family.
    pub fn queue_family(&self) -> StagerQueueType {
        match self.queue_type {
            StagerQueueType::Transfer
                if !self.device_context.device_info().has_dedicated_transfer_queue =>
            {
                StagerQueueType::Graphics
            }
            queue_type => queue_type,
        }
    }

    pub fn create_command_pool(
        &self,
        command_pool_def: &StagerCommandPoolDef,
    ) -> StagerResult<StagerCommandPoolHeadless> {
        StagerCommandPoolHeadless::new(self, command_pool_def)
    }

    pub fn wait_for_queue_idle(&self) -> StagerResult<()> {
        Ok(())
    }

    /// Executes the command buffers in order. Either every command executes and the submission is
    /// logged, or an error is returned. A validation error part way through leaves the effects of
    /// the commands that already ran, as a device would.
    #[profiling::function]
    pub fn submit(
        &self,
        command_buffers: &[&StagerCommandBufferHeadless],
        signal_fence: Option<&StagerFenceHeadless>,
    ) -> StagerResult<()> {
        if self.device_context.take_injected_failure(self.queue_type) {
            log::trace!(
                "Injected failure for submission to {:?} queue {}",
                self.queue_type,
                self.queue_id
            );
            return Err(format!(
                "Submission to {:?} queue {} was rejected by the device",
                self.queue_type, self.queue_id
            )
            .into());
        }

        log::trace!(
            "submit {} command buffers to {:?} queue {}",
            command_buffers.len(),
            self.queue_type,
            self.queue_id
        );

        let mut commands = Vec::default();
        for command_buffer in command_buffers {
            if command_buffer.queue_family() != self.queue_family() {
                return Err(format!(
                    "Command buffer recorded for the {:?} family submitted to a {:?} family queue",
                    command_buffer.queue_family(),
                    self.queue_family()
                )
                .into());
            }

            commands.append(&mut command_buffer.execute()?);
        }

        self.device_context.push_submission(StagerHeadlessSubmission {
            queue_type: self.queue_type,
            queue_id: self.queue_id,
            commands,
        });

        if let Some(signal_fence) = signal_fence {
            signal_fence.set_submitted(true);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn create_device(has_dedicated_transfer_queue: bool) -> StagerDeviceContext {
        let _ = env_logger::builder().is_test(true).try_init();
        StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef {
            has_dedicated_transfer_queue,
            ..Default::default()
        })
        .unwrap()
    }

    fn create_texture(
        device_context: &StagerDeviceContext,
        size: u32,
        mip_count: u32,
    ) -> StagerTexture {
        device_context
            .create_texture(&StagerTextureDef {
                extents: StagerExtents3D::new(size, size, 1),
                mip_count,
                format: StagerFormat::R8G8B8A8_UNORM,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_copy_buffer_to_buffer() {
        let device_context = create_device(true);
        let queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::High)
            .unwrap();
        let command_pool = queue
            .create_command_pool(&StagerCommandPoolDef { transient: true })
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();

        let src = device_context
            .create_buffer(&StagerBufferDef::for_staging_buffer(
                8,
                StagerResourceType::BUFFER,
            ))
            .unwrap();
        let dst = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(4))
            .unwrap();
        src.copy_to_host_visible_buffer(&[1u8, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();

        command_buffer.begin().unwrap();
        command_buffer
            .cmd_copy_buffer_to_buffer(
                &src,
                &dst,
                &StagerCmdCopyBufferToBufferParams {
                    src_byte_offset: 2,
                    dst_byte_offset: 0,
                    size: 4,
                },
            )
            .unwrap();
        command_buffer.end().unwrap();

        let fence = device_context.create_fence().unwrap();
        assert_eq!(fence.fence_status().unwrap(), StagerFenceStatus::Unsubmitted);
        queue.submit(&[&command_buffer], Some(&fence)).unwrap();
        assert_eq!(fence.fence_status().unwrap(), StagerFenceStatus::Complete);
        assert_eq!(fence.fence_status().unwrap(), StagerFenceStatus::Unsubmitted);

        let contents = dst.headless_buffer().unwrap().read_contents();
        assert_eq!(contents, vec![3, 4, 5, 6]);

        let log = device_context
            .headless_device_context()
            .unwrap()
            .submission_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].queue_type, StagerQueueType::Transfer);
        assert_eq!(log[0].copy_count(), 1);
    }

    #[test]
    fn test_host_write_to_gpu_only_buffer_fails() {
        let device_context = create_device(true);
        let buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_index_buffer(16))
            .unwrap();
        assert!(buffer.copy_to_host_visible_buffer(&[0u32; 4]).is_err());
    }

    #[test]
    fn test_offsets_that_wrap_are_rejected() {
        let device_context = create_device(true);
        let queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::High)
            .unwrap();
        let command_pool = queue
            .create_command_pool(&StagerCommandPoolDef { transient: true })
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();

        let src = device_context
            .create_buffer(&StagerBufferDef::for_staging_buffer(
                100,
                StagerResourceType::BUFFER,
            ))
            .unwrap();
        let dst = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(64))
            .unwrap();

        assert!(src
            .copy_to_host_visible_buffer_with_offset(&[1u8; 8], u64::MAX - 2)
            .is_err());

        command_buffer.begin().unwrap();
        assert!(command_buffer
            .cmd_copy_buffer_to_buffer(
                &src,
                &dst,
                &StagerCmdCopyBufferToBufferParams {
                    src_byte_offset: u64::MAX - 10,
                    dst_byte_offset: 0,
                    size: 64,
                },
            )
            .is_err());
        command_buffer.end().unwrap();
    }

    #[test]
    fn test_copy_requires_copy_dst_state() {
        let device_context = create_device(true);
        let queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::Medium)
            .unwrap();
        let command_pool = queue
            .create_command_pool(&StagerCommandPoolDef::default())
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();
        let texture = create_texture(&device_context, 2, 1);
        let src = device_context
            .create_buffer(&StagerBufferDef::for_staging_buffer(
                16,
                StagerResourceType::BUFFER,
            ))
            .unwrap();

        let params = StagerCmdCopyBufferToTextureParams::default();

        // Texture is still UNDEFINED
        command_buffer.begin().unwrap();
        command_buffer
            .cmd_copy_buffer_to_texture(&src, &texture, &params)
            .unwrap();
        command_buffer.end().unwrap();
        assert!(queue.submit(&[&command_buffer], None).is_err());

        command_buffer.begin().unwrap();
        command_buffer
            .cmd_texture_barrier(
                &StagerTextureBarrier::state_transition(
                    &texture,
                    StagerResourceState::UNDEFINED,
                    StagerResourceState::COPY_DST,
                ),
                StagerPipelineStage::TOP_OF_PIPE,
                StagerPipelineStage::TRANSFER,
            )
            .unwrap();
        command_buffer
            .cmd_copy_buffer_to_texture(&src, &texture, &params)
            .unwrap();
        command_buffer.end().unwrap();
        queue.submit(&[&command_buffer], None).unwrap();

        let headless_texture = texture.headless_texture().unwrap();
        assert_eq!(
            headless_texture.subresource_state(0, 0).unwrap(),
            StagerResourceState::COPY_DST
        );
        // The device does not touch the tracked current state
        assert_eq!(texture.current_state(), StagerResourceState::UNDEFINED);
    }

    #[test]
    fn test_barrier_src_state_is_validated() {
        let device_context = create_device(true);
        let queue = device_context
            .create_queue(StagerQueueType::Graphics, StagerQueuePriority::Medium)
            .unwrap();
        let command_pool = queue
            .create_command_pool(&StagerCommandPoolDef::default())
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();
        let texture = create_texture(&device_context, 4, 3);

        command_buffer.begin().unwrap();
        command_buffer
            .cmd_texture_barrier(
                &StagerTextureBarrier::state_transition(
                    &texture,
                    StagerResourceState::COPY_SRC,
                    StagerResourceState::SHADER_RESOURCE,
                )
                .mip_level(1),
                StagerPipelineStage::TRANSFER,
                StagerPipelineStage::FRAGMENT_SHADER,
            )
            .unwrap();
        command_buffer.end().unwrap();
        assert!(queue.submit(&[&command_buffer], None).is_err());
        assert!(device_context
            .headless_device_context()
            .unwrap()
            .submission_log()
            .is_empty());

        // Out of range barriers are rejected while recording
        command_buffer.begin().unwrap();
        assert!(command_buffer
            .cmd_texture_barrier(
                &StagerTextureBarrier::state_transition(
                    &texture,
                    StagerResourceState::UNDEFINED,
                    StagerResourceState::COPY_DST,
                )
                .mip_level(3),
                StagerPipelineStage::TOP_OF_PIPE,
                StagerPipelineStage::TRANSFER,
            )
            .is_err());
    }

    #[test]
    fn test_blit_requires_graphics_family() {
        let device_context = create_device(true);
        let texture = create_texture(&device_context, 4, 2);
        let params = StagerCmdBlitParams {
            src_mip_level: 0,
            dst_mip_level: 1,
            src_extents: StagerExtents3D::new(4, 4, 1),
            dst_extents: StagerExtents3D::new(2, 2, 1),
            array_layer: 0,
            filter: StagerFilterType::Linear,
        };

        let transfer_queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::Medium)
            .unwrap();
        let command_pool = transfer_queue
            .create_command_pool(&StagerCommandPoolDef::default())
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();
        command_buffer.begin().unwrap();
        assert!(command_buffer.cmd_blit_texture(&texture, &params).is_err());

        // Without a dedicated transfer family, transfer queues can blit
        let device_context = create_device(false);
        let texture = create_texture(&device_context, 4, 2);
        let transfer_queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::Medium)
            .unwrap();
        let command_pool = transfer_queue
            .create_command_pool(&StagerCommandPoolDef::default())
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();
        command_buffer.begin().unwrap();
        assert!(command_buffer.cmd_blit_texture(&texture, &params).is_ok());
    }

    #[test]
    fn test_injected_submit_failure() {
        let device_context = create_device(true);
        let queue = device_context
            .create_queue(StagerQueueType::Transfer, StagerQueuePriority::Medium)
            .unwrap();
        let command_pool = queue
            .create_command_pool(&StagerCommandPoolDef::default())
            .unwrap();
        let command_buffer = command_pool.create_command_buffer().unwrap();
        command_buffer.begin().unwrap();
        command_buffer.end().unwrap();

        let headless = device_context.headless_device_context().unwrap();
        headless.fail_next_submit(StagerQueueType::Graphics);
        // Injection only applies to the named queue type
        queue.submit(&[&command_buffer], None).unwrap();

        headless.fail_next_submit(StagerQueueType::Transfer);
        assert!(queue.submit(&[&command_buffer], None).is_err());
        queue.submit(&[&command_buffer], None).unwrap();
        assert_eq!(headless.submission_log().len(), 2);
    }

    #[test]
    fn test_allocation_limit() {
        let device_context = create_device(true);
        let headless = device_context.headless_device_context().unwrap();
        headless.set_allocation_limit(Some(100));

        let first = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(60))
            .unwrap();
        assert_eq!(headless.allocated_bytes(), 60);

        match device_context.create_buffer(&StagerBufferDef::for_device_vertex_buffer(60)) {
            Err(StagerError::OutOfDeviceMemory {
                requested,
                available,
            }) => {
                assert_eq!(requested, 60);
                assert_eq!(available, 40);
            }
            other => panic!("unexpected result {:?}", other),
        }

        drop(first);
        assert_eq!(headless.allocated_bytes(), 0);
        device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(60))
            .unwrap();
    }
}
