mod barrier;
pub use barrier::*;

mod definitions;
pub use definitions::*;

mod misc;
pub use misc::*;
