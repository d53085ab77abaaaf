use crate::backends::headless::StagerTextureHeadless;
#[cfg(feature = "stager-vulkan")]
use crate::backends::vulkan::StagerTextureVulkan;
use crate::{StagerResourceState, StagerTextureDef};

/// An image that can be used by the GPU.
///
/// Besides its fixed definition, a texture carries a single current state: the state its
/// contents were last moved to by whoever uploads into it. It starts as `UNDEFINED`. The device
/// never updates it on its own.
///
/// Textures must not be dropped if they are in use by the GPU.
#[derive(Clone, Debug)]
pub enum StagerTexture {
    Headless(StagerTextureHeadless),
    #[cfg(feature = "stager-vulkan")]
    Vk(StagerTextureVulkan),
}

impl StagerTexture {
    /// Return the definition used to create the texture
    pub fn texture_def(&self) -> &StagerTextureDef {
        match self {
            StagerTexture::Headless(inner) => inner.texture_def(),
            #[cfg(feature = "stager-vulkan")]
            StagerTexture::Vk(inner) => inner.texture_def(),
        }
    }

    pub fn current_state(&self) -> StagerResourceState {
        match self {
            StagerTexture::Headless(inner) => inner.current_state(),
            #[cfg(feature = "stager-vulkan")]
            StagerTexture::Vk(inner) => inner.current_state(),
        }
    }

    pub fn set_current_state(
        &self,
        state: StagerResourceState,
    ) {
        match self {
            StagerTexture::Headless(inner) => inner.set_current_state(state),
            #[cfg(feature = "stager-vulkan")]
            StagerTexture::Vk(inner) => inner.set_current_state(state),
        }
    }

    pub fn headless_texture(&self) -> Option<&StagerTextureHeadless> {
        match self {
            StagerTexture::Headless(inner) => Some(inner),
            #[cfg(feature = "stager-vulkan")]
            StagerTexture::Vk(_) => None,
        }
    }

    /// Get the underlying vulkan API object. This provides access to any internally created
    /// vulkan objects.
    #[cfg(feature = "stager-vulkan")]
    pub fn vk_texture(&self) -> Option<&StagerTextureVulkan> {
        match self {
            StagerTexture::Headless(_) => None,
            StagerTexture::Vk(inner) => Some(inner),
        }
    }
}
