use crate::{StagerFenceStatus, StagerResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Headless work completes inside `submit`, so a submitted fence is always already signaled
#[derive(Debug)]
pub struct StagerFenceHeadless {
    // Set to true when an operation is scheduled to signal this fence
    // Cleared when an operation is scheduled to consume this fence
    submitted: AtomicBool,
}

impl StagerFenceHeadless {
    pub(super) fn new() -> Self {
        StagerFenceHeadless {
            submitted: AtomicBool::new(false),
        }
    }

    pub(super) fn submitted(&self) -> bool {
        self.submitted.load(Ordering::Relaxed)
    }

    pub(super) fn set_submitted(
        &self,
        submitted: bool,
    ) {
        self.submitted.store(submitted, Ordering::Relaxed);
    }

    pub fn wait(&self) -> StagerResult<()> {
        self.set_submitted(false);
        Ok(())
    }

    pub fn fence_status(&self) -> StagerResult<StagerFenceStatus> {
        if self.submitted() {
            self.set_submitted(false);
            Ok(StagerFenceStatus::Complete)
        } else {
            Ok(StagerFenceStatus::Unsubmitted)
        }
    }
}
