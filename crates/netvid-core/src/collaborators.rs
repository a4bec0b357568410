//! Interface contracts for the external collaborators this repository does not
//! implement: a frame producer on the sending side, and a frame consumer (e.g. a
//! Linux `/dev/fb0` writer) on the receiving side. Neither trait has an
//! implementation in this crate.

use crate::PixelFrame;

/// Yields frames on demand to a sender.
pub trait FrameSource {
    /// Blocks (or `.await`s, in an async impl elsewhere) until the next frame is
    /// ready, or returns `None` when the source is exhausted.
    fn next_frame(&mut self) -> Option<PixelFrame>;
}

/// Consumes frames from the receiver's front buffer.
pub trait FrameSink {
    fn present(&mut self, frame: &PixelFrame);
}
