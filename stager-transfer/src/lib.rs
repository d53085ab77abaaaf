//! Moves host bytes into device-local buffers and textures.
//!
//! A `TransferManager` owns a pool of host-visible scratch buffers, a transfer queue and (when the
//! device has a dedicated transfer family) a graphics queue. Uploads are synchronous:
//!
//! * `upload_to_buffer` writes the bytes into a scratch buffer and copies them into the destination
//!   on the transfer queue.
//! * `upload_to_image` copies the base level of every array layer on the transfer queue, then
//!   builds the mip chain with successive half-resolution blits and moves the texture to a
//!   shader-readable state on the graphics queue.
//!
//! The barrier/copy/blit sequence of an image upload is computed up front by `ImageUploadPlan`,
//! see the `transitions` module.
//!
//! Consumers receive the managers through a `TransferContext` built once at start-up.

pub use error::*;
pub use scratch_pool::*;
pub use transfer_context::*;
pub use transfer_manager::*;
pub use transitions::*;

pub use stager_api;

mod buffer_upload;
mod error;
mod image_upload;
mod scratch_pool;
mod transfer_context;
mod transfer_manager;
pub mod transitions;
