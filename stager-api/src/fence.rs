use crate::backends::headless::StagerFenceHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerFenceVulkan;
use crate::{StagerFenceStatus, StagerResult};

/// A GPU -> CPU synchronization mechanism.
///
/// A fence can be in the following states:
///  * Unsubmitted - Initial state when created
///  * Incomplete - Once a command buffer is submitted, the fence is marked as incomplete
///  * Complete - The GPU can mark a fence as complete to signal completion of work.
///
/// The status of the fence returns to Unsubmitted when fence_status() is called while in a
/// completed state, or after wait() returns.
///
/// Fences must not be dropped if they are in use by the GPU.
#[derive(Debug)]
pub enum StagerFence {
    Headless(StagerFenceHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerFenceVulkan),
}

impl StagerFence {
    /// Get the status of the fence. See `StagerFenceStatus`
    pub fn fence_status(&self) -> StagerResult<StagerFenceStatus> {
        match self {
            StagerFence::Headless(inner) => inner.fence_status(),
            #[cfg(feature = "stager-vulkan")]
            StagerFence::Vk(inner) => inner.fence_status(),
        }
    }

    /// Wait for the fence to be signaled as complete by the GPU. Returns immediately if the fence
    /// was never submitted.
    pub fn wait(&self) -> StagerResult<()> {
        match self {
            StagerFence::Headless(inner) => inner.wait(),
            #[cfg(feature = "stager-vulkan")]
            StagerFence::Vk(inner) => inner.wait(),
        }
    }

    pub fn headless_fence(&self) -> Option<&StagerFenceHeadless> {
        match self {
            StagerFence::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerFence::Vk(_) => None,
        }
    }

    #[cfg(feature = "stager-vulkan")]
    pub fn vk_fence(&self) -> Option<&StagerFenceVulkan> {
        match self {
            StagerFence::Headless(_) => None,
            StagerFence::Vk(inner) => Some(inner),
        }
    }
}
