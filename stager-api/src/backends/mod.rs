pub mod headless;

#[cfg(feature = "stager-vulkan")]
pub mod vulkan;
