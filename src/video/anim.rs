//! Animated-image playback.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Result};
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, RgbImage};

use super::FrameSource;

/// Single-file sequence playback from an animated image (GIF or APNG).
///
/// Frames are decoded lazily as the source is drained. Per-frame delays are
/// ignored: the pipeline assumes the fixed frame rate from
/// [`crate::feature::FRAME_RATE`] for velocity units.
pub struct AnimationFile {
    frames: Frames<'static>,
}

impl AnimationFile {
    /// Opens an animation file. The path must have a supported extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_impl(path.as_ref())
    }

    fn open_impl(path: &Path) -> Result<Self> {
        let Some(ext) = path.extension() else {
            bail!("animation path must have a supported extension");
        };

        let reader = BufReader::new(File::open(path)?);
        let frames = if ext == "gif" {
            GifDecoder::new(reader)?.into_frames()
        } else if ext == "apng" || ext == "png" {
            let dec = PngDecoder::new(reader)?;
            if !dec.is_apng() {
                bail!("attempted to play back a still PNG as a sequence");
            }
            dec.apng().into_frames()
        } else {
            bail!(
                "file extension `{}` is not supported for animations",
                ext.to_string_lossy(),
            );
        };

        Ok(Self { frames })
    }
}

impl FrameSource for AnimationFile {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.next() {
            Some(frame) => {
                let rgba = frame?.into_buffer();
                Ok(Some(DynamicImage::ImageRgba8(rgba).to_rgb8()))
            }
            None => Ok(None),
        }
    }
}
