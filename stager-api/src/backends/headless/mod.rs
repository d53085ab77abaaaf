mod device_context;
pub use device_context::*;

mod buffer;
pub use buffer::*;

mod texture;
pub use texture::*;

mod queue;
pub use queue::*;

mod command_pool;
pub use command_pool::*;

mod command_buffer;
pub use command_buffer::*;

mod fence;
pub use fence::*;

mod submission_log;
pub use submission_log::*;
