use crate::{
    ScratchBufferGuard, ScratchBufferPool, ScratchPoolStatistics, TransferError, TransferResult,
};
use parking_lot::Mutex;
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};
use stager_api::{
    StagerCommandBuffer, StagerCommandPool, StagerCommandPoolDef, StagerDeviceContext,
    StagerFence, StagerQueue, StagerQueuePriority, StagerQueueType, StagerResult,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// The category of GPU work a transfer manager uploads for. Each category gets its own manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum TransferWorkType {
    Graphics,
    Physics,
}

/// Used to create a `TransferManager`
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct TransferManagerDef {
    pub work_type: TransferWorkType,
    /// Used in log messages
    pub identifier: String,
    pub queue_priority: StagerQueuePriority,
    /// Upper bound on the number of pooled scratch buffers
    pub max_scratch_buffers: usize,
    /// Scratch buffers created when the manager is initialized
    pub preallocated_scratch_buffer_sizes: Vec<u64>,
}

impl Default for TransferManagerDef {
    fn default() -> Self {
        TransferManagerDef {
            work_type: TransferWorkType::Graphics,
            identifier: "TransferManager".to_string(),
            queue_priority: StagerQueuePriority::Medium,
            max_scratch_buffers: 16,
            preallocated_scratch_buffer_sizes: Vec::default(),
        }
    }
}

impl TransferManagerDef {
    pub fn verify(&self) {
        assert!(self.max_scratch_buffers > 0);
        assert!(self.preallocated_scratch_buffer_sizes.len() <= self.max_scratch_buffers);
    }
}

// Dropped in field order: the command buffer is freed before its pool
struct UploadCommandResources {
    command_buffer: StagerCommandBuffer,
    fence: StagerFence,
    _command_pool: StagerCommandPool,
}

/// A queue with a reusable command buffer. Recording, submitting and waiting happen while holding
/// `resources`, so one upload at a time uses the command buffer.
pub(crate) struct UploadQueue {
    queue: StagerQueue,
    resources: Mutex<UploadCommandResources>,
}

impl UploadQueue {
    fn new(
        device_context: &StagerDeviceContext,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
    ) -> StagerResult<Self> {
        let queue = device_context.create_queue(queue_type, priority)?;
        let command_pool = queue.create_command_pool(&StagerCommandPoolDef { transient: true })?;
        let command_buffer = command_pool.create_command_buffer()?;
        let fence = device_context.create_fence()?;

        Ok(UploadQueue {
            queue,
            resources: Mutex::new(UploadCommandResources {
                command_buffer,
                fence,
                _command_pool: command_pool,
            }),
        })
    }

    pub(crate) fn queue(&self) -> &StagerQueue {
        &self.queue
    }
}

/// Moves host bytes into device-local buffers and textures through pooled scratch buffers.
///
/// Buffer uploads are a single copy on the transfer queue. Texture uploads copy the base level on
/// the transfer queue, then build the rest of the mip chain and move the texture to a
/// shader-readable state on a graphics-capable queue. Every call blocks until the device has
/// finished the work.
///
/// If the device has a dedicated transfer queue family, the manager creates a separate graphics
/// queue for the second phase. Otherwise the transfer queue (which then belongs to the graphics
/// family) runs both phases.
pub struct TransferManager {
    work_type: TransferWorkType,
    identifier: String,
    device_context: StagerDeviceContext,
    scratch_pool: ScratchBufferPool,
    transfer_queue: UploadQueue,
    specific_queue: Option<UploadQueue>,
    usable: AtomicBool,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("identifier", &self.identifier)
            .field("work_type", &self.work_type)
            .field("separated_queues", &self.separated_queues())
            .field("usable", &self.usable())
            .finish()
    }
}

impl Drop for TransferManager {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl TransferManager {
    pub fn new(
        device_context: &StagerDeviceContext,
        transfer_manager_def: &TransferManagerDef,
    ) -> TransferResult<Self> {
        transfer_manager_def.verify();

        let transfer_queue = UploadQueue::new(
            device_context,
            StagerQueueType::Transfer,
            transfer_manager_def.queue_priority,
        )?;

        let specific_queue = if device_context.device_info().has_dedicated_transfer_queue {
            Some(UploadQueue::new(
                device_context,
                StagerQueueType::Graphics,
                transfer_manager_def.queue_priority,
            )?)
        } else {
            None
        };

        let scratch_pool =
            ScratchBufferPool::new(device_context, transfer_manager_def.max_scratch_buffers);
        scratch_pool.preallocate(&transfer_manager_def.preallocated_scratch_buffer_sizes)?;

        log::info!(
            "{} initialized for {:?} work ({} queues)",
            transfer_manager_def.identifier,
            transfer_manager_def.work_type,
            if specific_queue.is_some() {
                "separate transfer and graphics"
            } else {
                "shared transfer/graphics"
            }
        );

        Ok(TransferManager {
            work_type: transfer_manager_def.work_type,
            identifier: transfer_manager_def.identifier.clone(),
            device_context: device_context.clone(),
            scratch_pool,
            transfer_queue,
            specific_queue,
            usable: AtomicBool::new(true),
        })
    }

    /// False once the manager has been terminated
    pub fn usable(&self) -> bool {
        self.usable.load(Ordering::Acquire)
    }

    pub fn work_type(&self) -> TransferWorkType {
        self.work_type
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn device_context(&self) -> &StagerDeviceContext {
        &self.device_context
    }

    /// True if the graphics phase of texture uploads runs on its own queue
    pub fn separated_queues(&self) -> bool {
        self.specific_queue.is_some()
    }

    pub fn transfer_queue(&self) -> &StagerQueue {
        self.transfer_queue.queue()
    }

    /// The queue that generates mip chains and finishes texture uploads
    pub fn graphics_queue(&self) -> &StagerQueue {
        self.graphics_upload_queue().queue()
    }

    pub fn statistics(&self) -> ScratchPoolStatistics {
        self.scratch_pool.statistics()
    }

    /// Lock a scratch buffer of at least `bytes` for packing data by hand. Pass it to
    /// `transfer_to_buffer` or `transfer_to_image`; it returns to the pool when dropped.
    pub fn scratch_buffer(
        &self,
        bytes: usize,
    ) -> TransferResult<ScratchBufferGuard> {
        self.ensure_usable()?;
        self.scratch_pool.acquire(bytes)
    }

    /// Wait for all in-flight work to drain and release every scratch buffer. The manager is not
    /// usable afterwards. Calling this more than once does nothing.
    pub fn terminate(&self) {
        if !self.usable.swap(false, Ordering::AcqRel) {
            return;
        }

        self.scratch_pool.clear_after(|| {
            let _submission_lock = self.device_context.submission_lock().lock();
            if let Err(e) = self.device_context.wait_for_device_idle() {
                log::error!(
                    "{} was unable to wait for the device to drain: {}",
                    self.identifier,
                    e
                );
            }
        });

        log::info!("{} terminated", self.identifier);
    }

    pub(crate) fn ensure_usable(&self) -> TransferResult<()> {
        if self.usable() {
            Ok(())
        } else {
            Err(TransferError::NotUsable)
        }
    }

    pub(crate) fn transfer_upload_queue(&self) -> &UploadQueue {
        &self.transfer_queue
    }

    pub(crate) fn graphics_upload_queue(&self) -> &UploadQueue {
        self.specific_queue.as_ref().unwrap_or(&self.transfer_queue)
    }

    /// Record commands with `f` into the queue's command buffer, submit it under the device's
    /// submission lock and block until the device has executed it.
    pub(crate) fn record_and_submit<F>(
        &self,
        upload_queue: &UploadQueue,
        description: &str,
        f: F,
    ) -> TransferResult<()>
    where
        F: FnOnce(&StagerCommandBuffer) -> StagerResult<()>,
    {
        let resources = upload_queue.resources.lock();
        let command_buffer = &resources.command_buffer;

        command_buffer
            .begin()
            .map_err(TransferError::CommandRecordingFailure)?;

        if let Err(e) = f(command_buffer) {
            log::error!("{}: recording {} failed: {}", self.identifier, description, e);
            // Close the recording so the next begin() starts clean
            if let Err(end_error) = command_buffer.end() {
                log::warn!(
                    "{}: unable to end abandoned command buffer: {}",
                    self.identifier,
                    end_error
                );
            }
            return Err(TransferError::CommandRecordingFailure(e));
        }

        command_buffer
            .end()
            .map_err(TransferError::CommandRecordingFailure)?;

        log::trace!(
            "{}: submitting {} to {:?} queue {}",
            self.identifier,
            description,
            upload_queue.queue.queue_type(),
            upload_queue.queue.queue_id()
        );

        {
            let _submission_lock = self.device_context.submission_lock().lock();
            upload_queue
                .queue
                .submit(&[command_buffer], Some(&resources.fence))
                .map_err(|e| {
                    log::error!("{}: submitting {} failed: {}", self.identifier, description, e);
                    TransferError::SubmissionFailure(e)
                })?;
        }

        resources
            .fence
            .wait()
            .map_err(TransferError::SubmissionFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stager_api::StagerHeadlessDeviceDef;

    fn create_device(has_dedicated_transfer_queue: bool) -> StagerDeviceContext {
        let _ = env_logger::builder().is_test(true).try_init();
        StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef {
            has_dedicated_transfer_queue,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_queue_separation_follows_device() {
        let device_context = create_device(true);
        let transfer_manager =
            TransferManager::new(&device_context, &TransferManagerDef::default()).unwrap();
        assert!(transfer_manager.separated_queues());
        assert_eq!(
            transfer_manager.transfer_queue().queue_type(),
            StagerQueueType::Transfer
        );
        assert_eq!(
            transfer_manager.graphics_queue().queue_type(),
            StagerQueueType::Graphics
        );

        let device_context = create_device(false);
        let transfer_manager =
            TransferManager::new(&device_context, &TransferManagerDef::default()).unwrap();
        assert!(!transfer_manager.separated_queues());
        assert_eq!(
            transfer_manager.graphics_queue().queue_id(),
            transfer_manager.transfer_queue().queue_id()
        );
    }

    #[test]
    fn test_preallocated_scratch_buffers() {
        let device_context = create_device(true);
        let transfer_manager = TransferManager::new(
            &device_context,
            &TransferManagerDef {
                preallocated_scratch_buffer_sizes: vec![1024, 4096],
                ..Default::default()
            },
        )
        .unwrap();

        let statistics = transfer_manager.statistics();
        assert_eq!(statistics.buffer_count(), 2);
        assert_eq!(statistics.total_bytes(), 1024 + 4096);
        assert_eq!(statistics.max_buffers, 16);
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let device_context = create_device(true);
        let headless = device_context.headless_device_context().unwrap();
        let transfer_manager = TransferManager::new(
            &device_context,
            &TransferManagerDef {
                preallocated_scratch_buffer_sizes: vec![1024],
                ..Default::default()
            },
        )
        .unwrap();
        assert!(transfer_manager.usable());
        assert_eq!(headless.allocated_bytes(), 1024);

        transfer_manager.terminate();
        assert!(!transfer_manager.usable());
        assert_eq!(transfer_manager.statistics().buffer_count(), 0);
        assert_eq!(headless.allocated_bytes(), 0);

        transfer_manager.terminate();
        match transfer_manager.scratch_buffer(16) {
            Err(TransferError::NotUsable) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_failed_recording_leaves_command_buffer_reusable() {
        let device_context = create_device(true);
        let transfer_manager =
            TransferManager::new(&device_context, &TransferManagerDef::default()).unwrap();

        let result = transfer_manager.record_and_submit(
            transfer_manager.transfer_upload_queue(),
            "a failing recording",
            |_| Err("recording failed".into()),
        );
        match result {
            Err(TransferError::CommandRecordingFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        transfer_manager
            .record_and_submit(
                transfer_manager.transfer_upload_queue(),
                "an empty recording",
                |_| Ok(()),
            )
            .unwrap();

        let headless = device_context.headless_device_context().unwrap();
        assert_eq!(headless.submission_log().len(), 1);
    }
}
