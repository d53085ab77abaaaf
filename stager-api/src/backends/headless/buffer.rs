use super::device_context::HeadlessAllocation;
use super::StagerDeviceContextHeadless;
use crate::{StagerBufferDef, StagerResult};
use parking_lot::Mutex;
use std::sync::Arc;

pub(super) struct StagerBufferHeadlessInner {
    pub(super) id: u64,
    pub(super) buffer_def: StagerBufferDef,
    pub(super) contents: Mutex<Vec<u8>>,
    _allocation: HeadlessAllocation,
}

/// A buffer backed by host memory. Device-side copies read and write `contents` directly.
pub struct StagerBufferHeadless {
    pub(super) inner: Arc<StagerBufferHeadlessInner>,
}

impl std::fmt::Debug for StagerBufferHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StagerBufferHeadless")
            .field("id", &self.inner.id)
            .field("buffer_def", &self.inner.buffer_def)
            .finish()
    }
}

impl StagerBufferHeadless {
    pub fn new(
        device_context: &StagerDeviceContextHeadless,
        buffer_def: &StagerBufferDef,
    ) -> StagerResult<StagerBufferHeadless> {
        buffer_def.verify();

        let allocation = device_context.allocate(buffer_def.size)?;
        let inner = StagerBufferHeadlessInner {
            id: device_context.next_resource_id(),
            buffer_def: buffer_def.clone(),
            contents: Mutex::new(vec![0; buffer_def.size as usize]),
            _allocation: allocation,
        };

        log::trace!(
            "Created headless buffer {} ({} bytes, {:?})",
            inner.id,
            buffer_def.size,
            buffer_def.memory_usage
        );

        Ok(StagerBufferHeadless {
            inner: Arc::new(inner),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn buffer_def(&self) -> &StagerBufferDef {
        &self.inner.buffer_def
    }

    pub fn copy_to_host_visible_buffer<T: Copy>(
        &self,
        data: &[T],
    ) -> StagerResult<()> {
        self.copy_to_host_visible_buffer_with_offset(data, 0)
    }

    pub fn copy_to_host_visible_buffer_with_offset<T: Copy>(
        &self,
        data: &[T],
        buffer_byte_offset: u64,
    ) -> StagerResult<()> {
        if !self.inner.buffer_def.memory_usage.is_host_visible() {
            return Err(format!(
                "Buffer {} is not host visible ({:?})",
                self.inner.id, self.inner.buffer_def.memory_usage
            )
            .into());
        }

        let bytes = crate::memory::slice_as_bytes(data);
        let mut contents = self.inner.contents.lock();
        let end = buffer_byte_offset.checked_add(bytes.len() as u64);
        if end.map_or(true, |end| end > contents.len() as u64) {
            return Err(format!(
                "Host write of {} bytes at offset {} overflows buffer {} of {} bytes",
                bytes.len(),
                buffer_byte_offset,
                self.inner.id,
                contents.len()
            )
            .into());
        }

        let start = buffer_byte_offset as usize;
        contents[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Read back the current contents of the buffer, regardless of memory usage
    pub fn read_contents(&self) -> Vec<u8> {
        self.inner.contents.lock().clone()
    }
}
