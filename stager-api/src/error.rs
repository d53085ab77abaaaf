#[cfg(feature = "stager-vulkan")]
use ash::vk;
#[cfg(feature = "stager-vulkan")]
use std::sync::Arc;

pub type StagerResult<T> = Result<T, StagerError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum StagerError {
    StringError(String),
    /// The device refused an allocation because it would exceed its memory budget
    OutOfDeviceMemory {
        requested: u64,
        available: u64,
    },
    #[cfg(feature = "stager-vulkan")]
    VkError(vk::Result),
    #[cfg(feature = "stager-vulkan")]
    GpuAllocatorError(Arc<gpu_allocator::AllocationError>),
}

impl std::error::Error for StagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            StagerError::StringError(_) => None,
            StagerError::OutOfDeviceMemory { .. } => None,
            #[cfg(feature = "stager-vulkan")]
            StagerError::VkError(ref e) => Some(e),
            #[cfg(feature = "stager-vulkan")]
            StagerError::GpuAllocatorError(ref e) => Some(&**e),
        }
    }
}

impl core::fmt::Display for StagerError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            StagerError::StringError(ref e) => e.fmt(fmt),
            StagerError::OutOfDeviceMemory {
                requested,
                available,
            } => write!(
                fmt,
                "out of device memory: requested {} bytes, {} bytes available",
                requested, available
            ),
            #[cfg(feature = "stager-vulkan")]
            StagerError::VkError(ref e) => e.fmt(fmt),
            #[cfg(feature = "stager-vulkan")]
            StagerError::GpuAllocatorError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for StagerError {
    fn from(str: &str) -> Self {
        StagerError::StringError(str.to_string())
    }
}

impl From<String> for StagerError {
    fn from(string: String) -> Self {
        StagerError::StringError(string)
    }
}

#[cfg(feature = "stager-vulkan")]
impl From<vk::Result> for StagerError {
    fn from(result: vk::Result) -> Self {
        StagerError::VkError(result)
    }
}

#[cfg(feature = "stager-vulkan")]
impl From<gpu_allocator::AllocationError> for StagerError {
    fn from(error: gpu_allocator::AllocationError) -> Self {
        StagerError::GpuAllocatorError(Arc::new(error))
    }
}
