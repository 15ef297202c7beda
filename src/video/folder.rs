//! Folder-of-images playback.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use image::RgbImage;

use super::FrameSource;

/// Plays back a directory of still images in file-name order.
///
/// This is the playback mode used by frame-per-file datasets (one PNG per
/// video frame).
pub struct ImageFolder {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageFolder {
    /// Opens `dir`, selecting the files whose names end in `suffix`.
    ///
    /// A folder without a single matching frame is an unreadable frame
    /// source, reported as an error.
    pub fn open(dir: &Path, suffix: &str) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to open frame folder `{}`", dir.display()))?
        {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(suffix) {
                paths.push(entry.path());
            }
        }
        ensure!(
            !paths.is_empty(),
            "no `{suffix}` frames in `{}`",
            dir.display(),
        );
        paths.sort();
        Ok(Self { paths, next: 0 })
    }

    /// Number of frames this source will yield in total.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageFolder {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame `{}`", path.display()))?;
        Ok(Some(image.to_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use image::Rgb;

    use super::*;

    #[test]
    fn yields_matching_frames_in_name_order() {
        let dir = env::temp_dir().join("korobu-folder-test");
        fs::create_dir_all(&dir).unwrap();
        // Written out of order; playback must sort by name.
        for (name, value) in [("frame-002.png", 20u8), ("frame-001.png", 10)] {
            RgbImage::from_pixel(4, 4, Rgb([value, 0, 0]))
                .save(dir.join(name))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut source = ImageFolder::open(&dir, ".png").unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 10);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0).0[0], 20);
        assert!(source.next_frame().unwrap().is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_folder_is_a_setup_error() {
        let dir = env::temp_dir().join("korobu-folder-empty");
        fs::create_dir_all(&dir).unwrap();
        assert!(ImageFolder::open(&dir, ".png").is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
