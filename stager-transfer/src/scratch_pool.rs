use crate::{TransferError, TransferResult};
use parking_lot::Mutex;
use stager_api::{
    StagerBuffer, StagerBufferDef, StagerDeviceContext, StagerResourceType, StagerResult,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A host-visible buffer owned by a `ScratchBufferPool`. At most one `ScratchBufferGuard` refers
/// to it at a time.
pub struct ScratchBuffer {
    id: u64,
    buffer: StagerBuffer,
    locked: AtomicBool,
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl ScratchBuffer {
    /// Stable for the lifetime of the pool, including when the buffer is grown
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> u64 {
        self.buffer.size()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn buffer(&self) -> &StagerBuffer {
        &self.buffer
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Exclusive use of one scratch buffer. The buffer returns to the pool when this is dropped.
pub struct ScratchBufferGuard {
    scratch_buffer: Arc<ScratchBuffer>,
    bytes_written: u64,
}

impl std::fmt::Debug for ScratchBufferGuard {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ScratchBufferGuard")
            .field("id", &self.scratch_buffer.id)
            .field("capacity", &self.capacity())
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

impl Drop for ScratchBufferGuard {
    fn drop(&mut self) {
        log::trace!("Releasing scratch buffer #{}", self.scratch_buffer.id);
        self.scratch_buffer.unlock();
    }
}

impl ScratchBufferGuard {
    fn new(scratch_buffer: Arc<ScratchBuffer>) -> Self {
        debug_assert!(scratch_buffer.is_locked());
        ScratchBufferGuard {
            scratch_buffer,
            bytes_written: 0,
        }
    }

    pub fn scratch_buffer(&self) -> &ScratchBuffer {
        &self.scratch_buffer
    }

    pub fn buffer(&self) -> &StagerBuffer {
        &self.scratch_buffer.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.scratch_buffer.capacity()
    }

    /// The end of the furthest write made through this guard
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write `data` at the start of the buffer
    pub fn write(
        &mut self,
        data: &[u8],
    ) -> TransferResult<()> {
        self.write_at(0, data)
    }

    /// Write `data` at `offset` bytes into the buffer. Several writes can pack multiple regions
    /// into one buffer.
    pub fn write_at(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> TransferResult<()> {
        let end = offset.checked_add(data.len() as u64);
        let required = end.unwrap_or(u64::MAX);
        if end.map_or(true, |end| end > self.capacity()) {
            log::error!(
                "Write of {} bytes at offset {} overflows scratch buffer #{} ({} bytes)",
                data.len(),
                offset,
                self.scratch_buffer.id,
                self.capacity()
            );
            return Err(TransferError::CapacityOverflow {
                required,
                available: self.capacity(),
            });
        }

        self.buffer()
            .copy_to_host_visible_buffer_with_offset(data, offset)?;
        self.bytes_written = self.bytes_written.max(required);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchBufferInfo {
    pub id: u64,
    pub capacity: u64,
    pub locked: bool,
}

/// A snapshot of the pool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScratchPoolStatistics {
    pub buffers: Vec<ScratchBufferInfo>,
    pub max_buffers: usize,
}

impl ScratchPoolStatistics {
    fn from_buffers(
        buffers: &[Arc<ScratchBuffer>],
        max_buffers: usize,
    ) -> Self {
        ScratchPoolStatistics {
            buffers: buffers
                .iter()
                .map(|x| ScratchBufferInfo {
                    id: x.id,
                    capacity: x.capacity(),
                    locked: x.is_locked(),
                })
                .collect(),
            max_buffers,
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn locked_count(&self) -> usize {
        self.buffers.iter().filter(|x| x.locked).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.buffers.iter().map(|x| x.capacity).sum()
    }
}

impl std::fmt::Display for ScratchPoolStatistics {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(
            f,
            "Allocated scratch buffers: {}/{} ({} bytes, {} locked)",
            self.buffer_count(),
            self.max_buffers,
            self.total_bytes(),
            self.locked_count()
        )?;

        for buffer in &self.buffers {
            writeln!(
                f,
                " - #{}: {} bytes{}",
                buffer.id,
                buffer.capacity,
                if buffer.locked { " (locked)" } else { "" }
            )?;
        }

        Ok(())
    }
}

/// A growable set of host-visible buffers used to stage uploads.
///
/// `acquire` never blocks waiting for a buffer. It looks for an unlocked buffer that is already
/// large enough, then for an unlocked buffer it can grow, then creates a new one. If all of those
/// fail the caller gets an error and decides whether to retry.
pub struct ScratchBufferPool {
    device_context: StagerDeviceContext,
    max_buffers: usize,
    next_buffer_id: AtomicU64,
    buffers: Mutex<Vec<Arc<ScratchBuffer>>>,
}

impl std::fmt::Debug for ScratchBufferPool {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ScratchBufferPool")
            .field("max_buffers", &self.max_buffers)
            .field("buffers", &*self.buffers.lock())
            .finish()
    }
}

impl ScratchBufferPool {
    pub fn new(
        device_context: &StagerDeviceContext,
        max_buffers: usize,
    ) -> Self {
        ScratchBufferPool {
            device_context: device_context.clone(),
            max_buffers,
            next_buffer_id: AtomicU64::new(0),
            buffers: Default::default(),
        }
    }

    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    fn create_buffer(
        &self,
        bytes: u64,
    ) -> StagerResult<StagerBuffer> {
        self.device_context
            .create_buffer(&StagerBufferDef::for_staging_buffer(
                bytes as usize,
                StagerResourceType::BUFFER,
            ))
    }

    /// Lock a buffer with a capacity of at least `bytes`.
    ///
    /// Search order: the first unlocked buffer that is large enough, then the first unlocked
    /// buffer that can be grown, then a new buffer if the pool is below `max_buffers`. A grow
    /// allocates the replacement while the old buffer is still alive, so the device must have
    /// room for both. Under memory pressure a grow can fail where freeing first would have
    /// succeeded; the old buffer is then kept and the search moves on, and the caller may see
    /// `AllocationFailure` even though an unlocked buffer existed.
    #[profiling::function]
    pub fn acquire(
        &self,
        bytes: usize,
    ) -> TransferResult<ScratchBufferGuard> {
        let requested = (bytes as u64).max(1);
        let mut buffers = self.buffers.lock();

        for scratch_buffer in buffers.iter() {
            if scratch_buffer.capacity() >= requested && scratch_buffer.try_lock() {
                log::trace!(
                    "Reusing scratch buffer #{} ({} bytes) for {} bytes",
                    scratch_buffer.id,
                    scratch_buffer.capacity(),
                    requested
                );
                return Ok(ScratchBufferGuard::new(scratch_buffer.clone()));
            }
        }

        // Nothing unlocked is large enough. Replace the first unlocked buffer with a larger one.
        // Buffers are only locked while this mutex is held, so an unlocked buffer stays unlocked.
        for index in 0..buffers.len() {
            if buffers[index].is_locked() {
                continue;
            }

            let id = buffers[index].id;
            match self.create_buffer(requested) {
                Ok(buffer) => {
                    log::info!(
                        "Grew scratch buffer #{} from {} to {} bytes",
                        id,
                        buffers[index].capacity(),
                        requested
                    );

                    let scratch_buffer = Arc::new(ScratchBuffer {
                        id,
                        buffer,
                        locked: AtomicBool::new(true),
                    });
                    buffers[index] = scratch_buffer.clone();
                    log::debug!(
                        "{}",
                        ScratchPoolStatistics::from_buffers(&buffers, self.max_buffers)
                    );
                    return Ok(ScratchBufferGuard::new(scratch_buffer));
                }
                Err(e) => {
                    log::warn!(
                        "Unable to grow scratch buffer #{} to {} bytes, trying the next one: {}",
                        id,
                        requested,
                        e
                    );
                }
            }
        }

        if buffers.len() >= self.max_buffers {
            log::warn!(
                "All {} scratch buffers are in use, no buffer available for {} bytes",
                buffers.len(),
                requested
            );
            return Err(TransferError::NoScratchBufferAvailable { requested });
        }

        let buffer = self.create_buffer(requested).map_err(|e| {
            log::error!("Unable to create a {} byte scratch buffer: {}", requested, e);
            TransferError::AllocationFailure(e)
        })?;

        let scratch_buffer = Arc::new(ScratchBuffer {
            id: self.next_buffer_id.fetch_add(1, Ordering::Relaxed),
            buffer,
            locked: AtomicBool::new(true),
        });
        buffers.push(scratch_buffer.clone());

        log::info!(
            "Created scratch buffer #{} ({} bytes)",
            scratch_buffer.id,
            requested
        );
        log::debug!(
            "{}",
            ScratchPoolStatistics::from_buffers(&buffers, self.max_buffers)
        );

        Ok(ScratchBufferGuard::new(scratch_buffer))
    }

    /// Create unlocked buffers of the given sizes up front. Sizes past the pool's cap are ignored.
    pub fn preallocate(
        &self,
        sizes: &[u64],
    ) -> TransferResult<()> {
        let mut buffers = self.buffers.lock();
        for &size in sizes {
            if buffers.len() >= self.max_buffers {
                log::warn!(
                    "Scratch pool is full ({} buffers), not preallocating {} bytes",
                    buffers.len(),
                    size
                );
                break;
            }

            let buffer = self
                .create_buffer(size.max(1))
                .map_err(TransferError::AllocationFailure)?;
            let id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
            log::info!("Preallocated scratch buffer #{} ({} bytes)", id, buffer.size());
            buffers.push(Arc::new(ScratchBuffer {
                id,
                buffer,
                locked: AtomicBool::new(false),
            }));
        }

        Ok(())
    }

    pub fn statistics(&self) -> ScratchPoolStatistics {
        ScratchPoolStatistics::from_buffers(&self.buffers.lock(), self.max_buffers)
    }

    /// Release every pooled buffer. Buffers that are still locked stay alive until their guard is
    /// dropped, but are no longer handed out.
    pub fn clear(&self) {
        self.clear_after(|| {});
    }

    /// Run `f` while holding the pool lock, then release every pooled buffer
    pub(crate) fn clear_after<F: FnOnce()>(
        &self,
        f: F,
    ) {
        let mut buffers = self.buffers.lock();
        f();

        if !buffers.is_empty() {
            log::debug!(
                "Releasing {} scratch buffers ({} bytes)",
                buffers.len(),
                buffers.iter().map(|x| x.capacity()).sum::<u64>()
            );
        }
        buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stager_api::StagerHeadlessDeviceDef;
    use std::collections::HashSet;

    fn create_device() -> StagerDeviceContext {
        let _ = env_logger::builder().is_test(true).try_init();
        StagerDeviceContext::new_headless(&StagerHeadlessDeviceDef::default()).unwrap()
    }

    #[test]
    fn test_acquire_returns_enough_capacity() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);

        for &size in &[1, 100, 4096, 50, 0] {
            let guard = pool.acquire(size).unwrap();
            assert!(guard.capacity() >= size as u64);
            assert!(guard.scratch_buffer().is_locked());
        }

        // Every guard was released before the next acquire
        let statistics = pool.statistics();
        assert_eq!(statistics.locked_count(), 0);
    }

    #[test]
    fn test_reuse_does_not_grow_pool() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);

        let first_id = pool.acquire(256).unwrap().scratch_buffer().id();
        let second_id = pool.acquire(256).unwrap().scratch_buffer().id();
        assert_eq!(first_id, second_id);

        // Smaller requests fit in the existing buffer too
        pool.acquire(128).unwrap();
        assert_eq!(pool.statistics().buffer_count(), 1);
        assert_eq!(pool.statistics().total_bytes(), 256);
    }

    #[test]
    fn test_unlocked_buffer_is_grown() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);

        let first_id = pool.acquire(64).unwrap().scratch_buffer().id();
        let guard = pool.acquire(1024).unwrap();
        assert_eq!(guard.scratch_buffer().id(), first_id);
        assert_eq!(guard.capacity(), 1024);
        drop(guard);

        let statistics = pool.statistics();
        assert_eq!(statistics.buffer_count(), 1);
        assert_eq!(statistics.total_bytes(), 1024);

        // The replaced buffer was released
        let headless = device_context.headless_device_context().unwrap();
        assert_eq!(headless.allocated_bytes(), 1024);
    }

    #[test]
    fn test_locked_buffers_are_skipped() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);

        let first = pool.acquire(64).unwrap();
        let second = pool.acquire(64).unwrap();
        assert_ne!(first.scratch_buffer().id(), second.scratch_buffer().id());

        let statistics = pool.statistics();
        assert_eq!(statistics.buffer_count(), 2);
        assert_eq!(statistics.locked_count(), 2);
    }

    #[test]
    fn test_full_pool_does_not_block() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 2);

        let first = pool.acquire(64).unwrap();
        let _second = pool.acquire(64).unwrap();
        match pool.acquire(64) {
            Err(TransferError::NoScratchBufferAvailable { requested }) => {
                assert_eq!(requested, 64)
            }
            other => panic!("unexpected result {:?}", other),
        }

        drop(first);
        pool.acquire(64).unwrap();
        assert_eq!(pool.statistics().buffer_count(), 2);
    }

    #[test]
    fn test_failed_grow_leaves_buffer_intact() {
        let device_context = create_device();
        let headless = device_context.headless_device_context().unwrap();
        headless.set_allocation_limit(Some(70));

        let pool = ScratchBufferPool::new(&device_context, 16);
        pool.acquire(40).unwrap();

        // 60 bytes alone would fit, but growing needs them while the 40 byte buffer is alive
        match pool.acquire(60) {
            Err(TransferError::AllocationFailure(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let statistics = pool.statistics();
        assert_eq!(statistics.buffer_count(), 1);
        assert_eq!(statistics.total_bytes(), 40);
        assert_eq!(statistics.locked_count(), 0);

        headless.set_allocation_limit(Some(200));
        let guard = pool.acquire(60).unwrap();
        assert_eq!(guard.capacity(), 60);
        drop(guard);
        assert_eq!(pool.statistics().buffer_count(), 1);
        assert_eq!(headless.allocated_bytes(), 60);
    }

    #[test]
    fn test_concurrent_acquires_are_exclusive() {
        const THREAD_COUNT: usize = 8;

        let device_context = create_device();
        let pool = Arc::new(ScratchBufferPool::new(&device_context, THREAD_COUNT));
        let barrier = Arc::new(std::sync::Barrier::new(THREAD_COUNT));

        let threads: Vec<_> = (0..THREAD_COUNT)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let guard = pool.acquire(128).unwrap();
                    let id = guard.scratch_buffer().id();
                    // Every thread holds its buffer at this point
                    barrier.wait();
                    id
                })
            })
            .collect();

        let ids: HashSet<u64> = threads.into_iter().map(|x| x.join().unwrap()).collect();
        assert_eq!(ids.len(), THREAD_COUNT);
        assert_eq!(pool.statistics().locked_count(), 0);
    }

    #[test]
    fn test_writes_are_bounds_checked() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);
        let mut guard = pool.acquire(16).unwrap();
        assert_eq!(guard.capacity(), 16);

        match guard.write(&[0; 17]) {
            Err(TransferError::CapacityOverflow {
                required,
                available,
            }) => {
                assert_eq!(required, 17);
                assert_eq!(available, 16);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(guard.write_at(10, &[0; 8]).is_err());
        assert_eq!(guard.bytes_written(), 0);

        guard.write_at(8, &[2; 8]).unwrap();
        guard.write(&[1; 8]).unwrap();
        assert_eq!(guard.bytes_written(), 16);

        let contents = guard.buffer().headless_buffer().unwrap().read_contents();
        assert_eq!(&contents[0..8], &[1; 8]);
        assert_eq!(&contents[8..16], &[2; 8]);
    }

    #[test]
    fn test_write_offset_that_wraps_is_rejected() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);
        let mut guard = pool.acquire(16).unwrap();

        match guard.write_at(u64::MAX - 2, &[1; 8]) {
            Err(TransferError::CapacityOverflow {
                required,
                available,
            }) => {
                assert_eq!(required, u64::MAX);
                assert_eq!(available, 16);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(guard.bytes_written(), 0);
        assert_eq!(
            guard.buffer().headless_buffer().unwrap().read_contents(),
            vec![0; 16]
        );
    }

    #[test]
    fn test_preallocate_and_statistics() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 3);
        pool.preallocate(&[256, 1024, 4096, 8192]).unwrap();

        let statistics = pool.statistics();
        assert_eq!(statistics.buffer_count(), 3);
        assert_eq!(statistics.total_bytes(), 256 + 1024 + 4096);

        // First fit, not best fit
        let guard = pool.acquire(200).unwrap();
        assert_eq!(guard.capacity(), 256);
        let guard2 = pool.acquire(200).unwrap();
        assert_eq!(guard2.capacity(), 1024);

        let text = pool.statistics().to_string();
        assert!(text.starts_with("Allocated scratch buffers: 3/3"));
        assert_eq!(text.matches("(locked)").count(), 2);
    }

    #[test]
    fn test_clear_keeps_held_buffers_alive() {
        let device_context = create_device();
        let pool = ScratchBufferPool::new(&device_context, 16);
        pool.preallocate(&[64]).unwrap();

        let mut guard = pool.acquire(32).unwrap();
        pool.clear();
        assert_eq!(pool.statistics().buffer_count(), 0);

        guard.write(&[7; 32]).unwrap();
        drop(guard);

        let headless = device_context.headless_device_context().unwrap();
        assert_eq!(headless.allocated_bytes(), 0);
    }
}
