pub mod collaborators;
pub mod errors;
pub mod pixel_format;
pub mod pixel_frame;
pub mod protocol;

pub use collaborators::{FrameSink, FrameSource};
pub use errors::{NetvidError, Result};
pub use pixel_frame::PixelFrame;
