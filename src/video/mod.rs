//! Frame sources for offline sequence playback.

mod anim;
mod folder;

pub use anim::AnimationFile;
pub use folder::ImageFolder;

use image::RgbImage;

/// A lazy, finite sequence of frames.
///
/// `Ok(None)` is the end-of-stream sentinel; a source keeps returning it once
/// exhausted. Dropping a source releases whatever handle backs it, so
/// stopping mid-stream leaks nothing.
pub trait FrameSource {
    /// Reads the next frame, blocking on I/O as needed.
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;
}
