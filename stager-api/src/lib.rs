//! Device, queue, command buffer and resource abstraction used by the stager transfer subsystem.
//!
//! Every object is an enum over the compiled-in backends:
//!
//! * `Headless` - a software device that is always available. Buffers and textures live in host
//!   memory, recorded commands execute on submit, and resource states are validated the way a
//!   validation layer would. It also offers read-back and failure injection for tests.
//! * `Vk` - Vulkan, enabled with the `stager-vulkan` feature. The backend wraps an instance and
//!   device created elsewhere.
//!
//! The API follows the usual explicit-graphics-API shape: a `StagerDeviceContext` creates queues,
//! buffers, textures and fences; a `StagerQueue` creates command pools; command buffers record
//! copies, blits and barriers and are submitted back to a queue.

#[cfg(feature = "stager-vulkan")]
pub use ash;
#[cfg(feature = "stager-vulkan")]
pub use gpu_allocator;

pub use buffer::*;
pub use command_buffer::*;
pub use command_pool::*;
pub use device_context::*;
pub use error::*;
pub use fence::*;
pub use queue::*;
pub use texture::*;
pub use types::*;

pub mod backends;
pub mod memory;

mod buffer;
mod command_buffer;
mod command_pool;
mod device_context;
mod error;
mod fence;
mod queue;
mod texture;
mod types;
