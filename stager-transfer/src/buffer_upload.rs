use crate::{ScratchBufferGuard, TransferError, TransferManager, TransferResult};
use stager_api::{StagerBuffer, StagerCmdCopyBufferToBufferParams};

impl TransferManager {
    /// Copy `dst_buffer.size()` bytes of `region`, starting at `src_offset`, into `dst_buffer`.
    /// Blocks until the copy has executed.
    #[profiling::function]
    pub fn upload_to_buffer(
        &self,
        dst_buffer: &StagerBuffer,
        region: &[u8],
        src_offset: u64,
    ) -> TransferResult<()> {
        self.ensure_usable()?;

        let end = src_offset.checked_add(dst_buffer.size());
        let required = end.unwrap_or(u64::MAX);
        if end.map_or(true, |end| end > region.len() as u64) {
            log::error!(
                "{}: buffer upload of {} bytes at offset {} reads past the {} byte region",
                self.identifier(),
                dst_buffer.size(),
                src_offset,
                region.len()
            );
            return Err(TransferError::CapacityOverflow {
                required,
                available: region.len() as u64,
            });
        }

        let mut scratch_buffer = self.scratch_buffer(region.len())?;
        scratch_buffer.write(region)?;
        self.transfer_to_buffer(&scratch_buffer, dst_buffer, src_offset)
    }

    /// Copy `dst_buffer.size()` bytes out of an already filled scratch buffer, starting at
    /// `src_offset`, into `dst_buffer`. Blocks until the copy has executed.
    pub fn transfer_to_buffer(
        &self,
        scratch_buffer: &ScratchBufferGuard,
        dst_buffer: &StagerBuffer,
        src_offset: u64,
    ) -> TransferResult<()> {
        self.ensure_usable()?;

        let size = dst_buffer.size();
        let end = src_offset.checked_add(size);
        let required = end.unwrap_or(u64::MAX);
        if end.map_or(true, |end| end > scratch_buffer.capacity()) {
            log::error!(
                "{}: buffer upload of {} bytes at offset {} overflows scratch buffer #{} ({} bytes)",
                self.identifier(),
                size,
                src_offset,
                scratch_buffer.scratch_buffer().id(),
                scratch_buffer.capacity()
            );
            return Err(TransferError::CapacityOverflow {
                required,
                available: scratch_buffer.capacity(),
            });
        }

        log::debug!(
            "{}: uploading {} bytes to a {:?} buffer from scratch buffer #{} at offset {}",
            self.identifier(),
            size,
            dst_buffer.buffer_def().resource_type,
            scratch_buffer.scratch_buffer().id(),
            src_offset
        );

        let params = StagerCmdCopyBufferToBufferParams {
            src_byte_offset: src_offset,
            dst_byte_offset: 0,
            size,
        };

        self.record_and_submit(
            self.transfer_upload_queue(),
            "buffer upload",
            |command_buffer| {
                command_buffer.cmd_copy_buffer_to_buffer(scratch_buffer.buffer(), dst_buffer, &params)
            },
        )?;

        log::trace!(
            "{}: {} bytes transferred to device buffer",
            self.identifier(),
            size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use stager_api::{
        StagerBufferDef, StagerDeviceContext, StagerHeadlessDeviceDef, StagerQueueType,
    };

    fn create_transfer_manager() -> (StagerDeviceContext, TransferManager) {
        let _ = env_logger::builder().is_test(true).try_init();
        let device_context =
            StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef::default()).unwrap();
        let transfer_manager =
            TransferManager::new(&device_context, &TransferManagerDef::default()).unwrap();
        (device_context, transfer_manager)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|x| (x * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_upload_round_trips_content() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(256))
            .unwrap();

        let region = pattern(256);
        transfer_manager
            .upload_to_buffer(&dst_buffer, &region, 0)
            .unwrap();

        let headless = device_context.headless_device_context().unwrap();
        assert_eq!(dst_buffer.headless_buffer().unwrap().read_contents(), region);

        let submissions = headless.submission_log();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].queue_type, StagerQueueType::Transfer);
        assert_eq!(submissions[0].copy_count(), 1);

        // The scratch buffer went back to the pool
        assert_eq!(transfer_manager.statistics().locked_count(), 0);
    }

    #[test]
    fn test_upload_from_offset() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_index_buffer(64))
            .unwrap();

        let region = pattern(100);
        transfer_manager
            .upload_to_buffer(&dst_buffer, &region, 36)
            .unwrap();
        assert_eq!(
            dst_buffer.headless_buffer().unwrap().read_contents(),
            &region[36..100]
        );
    }

    #[test]
    fn test_oversized_offset_is_rejected() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(64))
            .unwrap();

        match transfer_manager.upload_to_buffer(&dst_buffer, &pattern(100), 37) {
            Err(TransferError::CapacityOverflow {
                required,
                available,
            }) => {
                assert_eq!(required, 101);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected result {:?}", other),
        }

        let headless = device_context.headless_device_context().unwrap();
        assert!(headless.submission_log().is_empty());
        assert_eq!(
            dst_buffer.headless_buffer().unwrap().read_contents(),
            vec![0; 64]
        );
    }

    #[test]
    fn test_offset_that_wraps_is_rejected() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(64))
            .unwrap();

        match transfer_manager.upload_to_buffer(&dst_buffer, &[1; 100], u64::MAX - 10) {
            Err(TransferError::CapacityOverflow {
                required,
                available,
            }) => {
                assert_eq!(required, u64::MAX);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected result {:?}", other),
        }

        let mut scratch_buffer = transfer_manager.scratch_buffer(100).unwrap();
        scratch_buffer.write(&[1; 100]).unwrap();
        match transfer_manager.transfer_to_buffer(&scratch_buffer, &dst_buffer, u64::MAX - 10) {
            Err(TransferError::CapacityOverflow { available, .. }) => {
                assert_eq!(available, scratch_buffer.capacity());
            }
            other => panic!("unexpected result {:?}", other),
        }

        let headless = device_context.headless_device_context().unwrap();
        assert!(headless.submission_log().is_empty());
        assert_eq!(
            dst_buffer.headless_buffer().unwrap().read_contents(),
            vec![0; 64]
        );
    }

    #[test]
    fn test_transfer_from_packed_scratch_buffer() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let vertices = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(64))
            .unwrap();
        let indices = device_context
            .create_buffer(&StagerBufferDef::for_device_index_buffer(32))
            .unwrap();

        let vertex_data = pattern(64);
        let index_data = vec![9u8; 32];

        let mut scratch_buffer = transfer_manager.scratch_buffer(96).unwrap();
        scratch_buffer.write_at(0, &vertex_data).unwrap();
        scratch_buffer.write_at(64, &index_data).unwrap();
        assert_eq!(scratch_buffer.bytes_written(), 96);

        transfer_manager
            .transfer_to_buffer(&scratch_buffer, &vertices, 0)
            .unwrap();
        transfer_manager
            .transfer_to_buffer(&scratch_buffer, &indices, 64)
            .unwrap();

        assert_eq!(vertices.headless_buffer().unwrap().read_contents(), vertex_data);
        assert_eq!(indices.headless_buffer().unwrap().read_contents(), index_data);

        match transfer_manager.transfer_to_buffer(&scratch_buffer, &indices, 65) {
            Err(TransferError::CapacityOverflow {
                required,
                available,
            }) => {
                assert_eq!(required, 97);
                assert_eq!(available, 96);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_submission_failure_releases_scratch_buffer() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let headless = device_context.headless_device_context().unwrap();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(32))
            .unwrap();

        headless.fail_next_submit(StagerQueueType::Transfer);
        match transfer_manager.upload_to_buffer(&dst_buffer, &pattern(32), 0) {
            Err(TransferError::SubmissionFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(transfer_manager.statistics().locked_count(), 0);
        assert_eq!(
            dst_buffer.headless_buffer().unwrap().read_contents(),
            vec![0; 32]
        );

        // Nothing was left recording or locked
        transfer_manager
            .upload_to_buffer(&dst_buffer, &pattern(32), 0)
            .unwrap();
        assert_eq!(
            dst_buffer.headless_buffer().unwrap().read_contents(),
            pattern(32)
        );
        assert_eq!(transfer_manager.statistics().buffer_count(), 1);
    }

    #[test]
    fn test_terminated_manager_rejects_uploads() {
        let (device_context, transfer_manager) = create_transfer_manager();
        let dst_buffer = device_context
            .create_buffer(&StagerBufferDef::for_device_vertex_buffer(32))
            .unwrap();

        transfer_manager.terminate();
        match transfer_manager.upload_to_buffer(&dst_buffer, &pattern(32), 0) {
            Err(TransferError::NotUsable) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
