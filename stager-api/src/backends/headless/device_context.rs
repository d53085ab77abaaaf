use super::{
    StagerBufferHeadless, StagerFenceHeadless, StagerHeadlessSubmission, StagerQueueHeadless,
    StagerTextureHeadless,
};
use crate::{
    StagerBufferDef, StagerDeviceInfo, StagerError, StagerHeadlessDeviceDef, StagerQueuePriority,
    StagerQueueType, StagerResult, StagerTextureDef,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

pub(super) struct StagerDeviceContextHeadlessInner {
    device_info: StagerDeviceInfo,
    submission_lock: Mutex<()>,

    allocation_limit: Mutex<Option<u64>>,
    allocated_bytes: AtomicU64,

    next_resource_id: AtomicU64,
    next_queue_id: AtomicU32,

    // Indexed by queue_type_index()
    fail_next_submit: [AtomicBool; 3],
    submission_log: Mutex<Vec<StagerHeadlessSubmission>>,
}

/// A software device. Resources are host memory and submitted work executes synchronously on the
/// submitting thread.
#[derive(Clone)]
pub struct StagerDeviceContextHeadless {
    pub(super) inner: Arc<StagerDeviceContextHeadlessInner>,
}

impl std::fmt::Debug for StagerDeviceContextHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerDeviceContextHeadless")
            .field("device_info", &self.inner.device_info)
            .field(
                "allocated_bytes",
                &self.inner.allocated_bytes.load(Ordering::Relaxed),
            )
            .finish()
    }
}

fn queue_type_index(queue_type: StagerQueueType) -> usize {
    match queue_type {
        StagerQueueType::Graphics => 0,
        StagerQueueType::Compute => 1,
        StagerQueueType::Transfer => 2,
    }
}

impl StagerDeviceContextHeadless {
    pub fn new(device_def: &StagerHeadlessDeviceDef) -> StagerResult<Self> {
        let device_info = StagerDeviceInfo {
            has_dedicated_transfer_queue: device_def.has_dedicated_transfer_queue,
            upload_buffer_texture_alignment: device_def.upload_buffer_texture_alignment.max(1),
            upload_buffer_texture_row_alignment: 1,
        };

        log::debug!("Creating headless device {:?}", device_info);

        let inner = StagerDeviceContextHeadlessInner {
            device_info,
            submission_lock: Mutex::new(()),
            allocation_limit: Mutex::new(device_def.allocation_limit),
            allocated_bytes: AtomicU64::new(0),
            next_resource_id: AtomicU64::new(1),
            next_queue_id: AtomicU32::new(0),
            fail_next_submit: Default::default(),
            submission_log: Default::default(),
        };

        Ok(StagerDeviceContextHeadless {
            inner: Arc::new(inner),
        })
    }

    pub fn device_info(&self) -> &StagerDeviceInfo {
        &self.inner.device_info
    }

    pub fn submission_lock(&self) -> &Mutex<()> {
        &self.inner.submission_lock
    }

    pub fn create_queue(
        &self,
        queue_type: StagerQueueType,
        priority: StagerQueuePriority,
    ) -> StagerResult<StagerQueueHeadless> {
        let queue_id = self.inner.next_queue_id.fetch_add(1, Ordering::Relaxed);
        Ok(StagerQueueHeadless::new(self, queue_type, priority, queue_id))
    }

    pub fn create_fence(&self) -> StagerResult<StagerFenceHeadless> {
        Ok(StagerFenceHeadless::new())
    }

    pub fn create_buffer(
        &self,
        buffer_def: &StagerBufferDef,
    ) -> StagerResult<StagerBufferHeadless> {
        StagerBufferHeadless::new(self, buffer_def)
    }

    pub fn create_texture(
        &self,
        texture_def: &StagerTextureDef,
    ) -> StagerResult<StagerTextureHeadless> {
        StagerTextureHeadless::new(self, texture_def)
    }

    /// Work executes during submit, so there is never anything in flight
    pub fn wait_for_device_idle(&self) -> StagerResult<()> {
        log::trace!("headless device idle");
        Ok(())
    }

    //
    // Test controls
    //

    /// The next submission to a queue of the given type fails without executing any commands
    pub fn fail_next_submit(
        &self,
        queue_type: StagerQueueType,
    ) {
        self.inner.fail_next_submit[queue_type_index(queue_type)].store(true, Ordering::Relaxed);
    }

    /// Limit the total bytes of live buffers and textures. `None` removes the limit.
    pub fn set_allocation_limit(
        &self,
        allocation_limit: Option<u64>,
    ) {
        *self.inner.allocation_limit.lock() = allocation_limit;
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.inner.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Every successful submission since creation (or the last `clear_submission_log`)
    pub fn submission_log(&self) -> Vec<StagerHeadlessSubmission> {
        self.inner.submission_log.lock().clone()
    }

    pub fn clear_submission_log(&self) {
        self.inner.submission_log.lock().clear();
    }

    //
    // Used by the other headless objects
    //

    pub(super) fn next_resource_id(&self) -> u64 {
        self.inner.next_resource_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn take_injected_failure(
        &self,
        queue_type: StagerQueueType,
    ) -> bool {
        self.inner.fail_next_submit[queue_type_index(queue_type)].swap(false, Ordering::Relaxed)
    }

    pub(super) fn push_submission(
        &self,
        submission: StagerHeadlessSubmission,
    ) {
        self.inner.submission_log.lock().push(submission);
    }

    pub(super) fn allocate(
        &self,
        size: u64,
    ) -> StagerResult<HeadlessAllocation> {
        let allocation_limit = self.inner.allocation_limit.lock();
        let allocated = self.inner.allocated_bytes.load(Ordering::Relaxed);
        if let Some(limit) = *allocation_limit {
            if allocated + size > limit {
                return Err(StagerError::OutOfDeviceMemory {
                    requested: size,
                    available: limit.saturating_sub(allocated),
                });
            }
        }

        self.inner.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(HeadlessAllocation {
            device_context: self.inner.clone(),
            size,
        })
    }
}

/// Returns its bytes to the device's budget when dropped
pub(super) struct HeadlessAllocation {
    device_context: Arc<StagerDeviceContextHeadlessInner>,
    size: u64,
}

impl Drop for HeadlessAllocation {
    fn drop(&mut self) {
        self.device_context
            .allocated_bytes
            .fetch_sub(self.size, Ordering::Relaxed);
    }
}
