use super::StagerDeviceContextVulkan;
use crate::{StagerFenceStatus, StagerResult};
use ash::vk;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct StagerFenceVulkan {
    device_context: StagerDeviceContextVulkan,
    vk_fence: vk::Fence,
    // Set to true when an operation is scheduled to signal this fence
    // Cleared when an operation is scheduled to consume this fence
    submitted: AtomicBool,
}

impl Drop for StagerFenceVulkan {
    fn drop(&mut self) {
        unsafe {
            self.device_context
                .device()
                .destroy_fence(self.vk_fence, None)
        }
    }
}

impl StagerFenceVulkan {
    pub fn new(device_context: &StagerDeviceContextVulkan) -> StagerResult<StagerFenceVulkan> {
        let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::empty());

        let vk_fence = unsafe { device_context.device().create_fence(&create_info, None)? };

        Ok(StagerFenceVulkan {
            device_context: device_context.clone(),
            vk_fence,
            submitted: AtomicBool::new(false),
        })
    }

    pub fn vk_fence(&self) -> vk::Fence {
        self.vk_fence
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
        if self.submitted() {
            let device = self.device_context.device();
            unsafe {
                device.wait_for_fences(&[self.vk_fence], true, u64::MAX)?;
                device.reset_fences(&[self.vk_fence])?;
            }
        }

        self.set_submitted(false);
        Ok(())
    }

    pub fn fence_status(&self) -> StagerResult<StagerFenceStatus> {
        if !self.submitted() {
            Ok(StagerFenceStatus::Unsubmitted)
        } else {
            let device = self.device_context.device();
            unsafe {
                let is_ready = device.get_fence_status(self.vk_fence)?;
                if is_ready {
                    device.reset_fences(&[self.vk_fence])?;
                    self.set_submitted(false);
                    Ok(StagerFenceStatus::Complete)
                } else {
                    Ok(StagerFenceStatus::Incomplete)
                }
            }
        }
    }
}
