//! Dataset buffers: pre-scanned landmark sequences with aligned labels.
//!
//! A [`DatasetBuffer`] is built once per video/folder sequence by fully
//! draining its frame source through a pose extractor, and is then reused
//! read-only across parameter sweeps. Every frame read from the source
//! advances the *processed-frame* counter, whether or not a pose was
//! detected; label lookup is by that counter, never by position within the
//! landmark sequence.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use rayon::prelude::*;

use crate::detect::{self, PersonDetector};
use crate::landmark::Landmarks;
use crate::pose::PoseEstimator;
use crate::video::FrameSource;

/// Ground truth for one sequence.
pub enum LabelSpec {
    /// One class id per processed frame, usually from a marker file.
    PerFrame(Vec<usize>),
    /// The whole sequence is a single activity class.
    Constant(usize),
}

/// A landmark set tagged with the processed-frame index at which it was
/// observed.
#[derive(Debug, Clone)]
pub struct Observation {
    pub frame: usize,
    pub landmarks: Landmarks,
}

/// One fully pre-scanned sequence, immutable after construction.
pub struct DatasetBuffer {
    name: String,
    observations: Vec<Observation>,
    labels: Vec<usize>,
}

impl DatasetBuffer {
    /// Builds a buffer by draining `source` through `pose`.
    ///
    /// Frames yielding no landmarks are skipped for landmark append but still
    /// advance the processed-frame counter. A label sequence that does not
    /// cover every processed frame is a setup error.
    pub fn build(
        name: &str,
        source: &mut dyn FrameSource,
        pose: &mut dyn PoseEstimator,
        labels: LabelSpec,
    ) -> Result<Self> {
        Self::build_impl(name, source, None, pose, labels)
    }

    /// Like [`DatasetBuffer::build`], but crops each frame to the most
    /// confident detected person (plus margin) before pose extraction.
    ///
    /// A frame with zero detections is skipped the same way a frame with no
    /// extractable pose is; the counter still advances.
    pub fn build_with_detector(
        name: &str,
        source: &mut dyn FrameSource,
        detector: &mut dyn PersonDetector,
        pose: &mut dyn PoseEstimator,
        labels: LabelSpec,
    ) -> Result<Self> {
        Self::build_impl(name, source, Some(detector), pose, labels)
    }

    fn build_impl(
        name: &str,
        source: &mut dyn FrameSource,
        mut detector: Option<&mut dyn PersonDetector>,
        pose: &mut dyn PoseEstimator,
        labels: LabelSpec,
    ) -> Result<Self> {
        let mut frame = 0usize;
        let mut observations = Vec::new();
        let mut constant_labels = Vec::new();
        while let Some(image) = source.next_frame()? {
            let index = frame;
            frame += 1;
            if let LabelSpec::Constant(class) = &labels {
                constant_labels.push(*class);
            }

            let view = match &mut detector {
                Some(detector) => {
                    match detect::most_confident(&detector.detect(&image)?) {
                        Some(person) => detect::crop_person(&image, &person),
                        None => {
                            log::trace!("`{name}` frame {index}: no person detected");
                            continue;
                        }
                    }
                }
                None => image,
            };

            match pose.estimate(&view)? {
                Some(landmarks) => observations.push(Observation {
                    frame: index,
                    landmarks,
                }),
                // Degenerate detection: a normal skip, the counter advanced.
                None => log::trace!("`{name}` frame {index}: no pose extracted"),
            }
        }

        let labels = match labels {
            LabelSpec::PerFrame(labels) => {
                ensure!(
                    labels.len() >= frame,
                    "`{name}`: {} labels for {frame} processed frames",
                    labels.len(),
                );
                labels
            }
            LabelSpec::Constant(_) => constant_labels,
        };

        log::debug!(
            "`{name}`: {} observations over {frame} processed frames",
            observations.len(),
        );
        Ok(Self {
            name: name.to_string(),
            observations,
            labels,
        })
    }

    /// Assembles a buffer from pre-computed parts.
    ///
    /// `labels` must be indexed by processed-frame index and cover every
    /// observation's frame.
    pub fn from_parts(name: &str, observations: Vec<Observation>, labels: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            observations,
            labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The retained observations, in processed-frame order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Ground-truth class id for a *processed-frame* index.
    ///
    /// An index without a label is a contract violation: it means the caller
    /// lost track of the processed-frame counter, and silently proceeding
    /// would misalign every downstream label.
    pub fn label_for(&self, frame: usize) -> Result<usize> {
        match self.labels.get(frame) {
            Some(&class) => Ok(class),
            None => bail!(
                "no label for processed frame {frame} in `{}` ({} labels)",
                self.name,
                self.labels.len(),
            ),
        }
    }
}

/// Reads a whitespace/newline-delimited marker file into per-frame class ids.
pub fn read_markers(path: &Path) -> Result<Vec<usize>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read marker file `{}`", path.display()))?;
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<usize>()
                .with_context(|| format!("malformed class id `{token}` in `{}`", path.display()))
        })
        .collect()
}

/// Lists the sequence directories under a dataset root, sorted by name.
pub fn sequence_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("failed to list dataset root `{}`", root.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(name) => bail!("non-UTF-8 sequence directory name: {:?}", name),
        };
        dirs.push((name, entry.path()));
    }
    dirs.sort();
    Ok(dirs)
}

/// Selects entries `start..end` (start inclusive, end exclusive), clamped to
/// the available range.
pub fn select(entries: &[(String, PathBuf)], start: usize, end: usize) -> &[(String, PathBuf)] {
    let end = end.min(entries.len());
    let start = start.min(end);
    &entries[start..end]
}

/// Splits `count` sequences into train/test index ranges by train fraction.
pub fn train_test_split(count: usize, train_fraction: f64) -> (Range<usize>, Range<usize>) {
    assert!((0.0..=1.0).contains(&train_fraction));
    let train = ((count as f64 * train_fraction).round() as usize).min(count);
    (0..train, train..count)
}

/// Builds buffers for the given sequences in parallel.
///
/// Buffer construction is embarrassingly parallel across sequences; each
/// buffer's own traversal stays strictly ordered. A setup error in one
/// sequence skips that sequence only and the rest proceed, so a batched
/// sweep survives individual broken recordings.
pub fn build_buffers<F>(entries: &[(String, PathBuf)], build: F) -> Vec<DatasetBuffer>
where
    F: Fn(&str, &Path) -> Result<DatasetBuffer> + Sync,
{
    entries
        .par_iter()
        .filter_map(|(name, path)| match build(name, path) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                log::error!("skipping sequence `{name}`: {e:#}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn markers_parse_mixed_whitespace() {
        let path = env::temp_dir().join("korobu-markers-ok.txt");
        fs::write(&path, "0 0 1\n1\t1\n2\n").unwrap();
        assert_eq!(read_markers(&path).unwrap(), vec![0, 0, 1, 1, 1, 2]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_marker_is_fatal() {
        let path = env::temp_dir().join("korobu-markers-bad.txt");
        fs::write(&path, "0 1 fall 2").unwrap();
        let err = read_markers(&path).unwrap_err();
        assert!(err.to_string().contains("malformed class id"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_marker_file_is_fatal() {
        assert!(read_markers(Path::new("/nonexistent/markers.txt")).is_err());
    }

    #[test]
    fn label_lookup_is_by_processed_frame_index() {
        let buffer = DatasetBuffer::from_parts("seq", Vec::new(), vec![0, 0, 1]);
        assert_eq!(buffer.label_for(2).unwrap(), 1);
        assert!(buffer.label_for(3).is_err());
    }

    #[test]
    fn split_rounds_to_nearest_sequence() {
        assert_eq!(train_test_split(10, 0.8), (0..8, 8..10));
        assert_eq!(train_test_split(10, 0.0), (0..0, 0..10));
        assert_eq!(train_test_split(3, 0.5), (0..2, 2..3));
    }

    #[test]
    fn select_clamps_out_of_range_bounds() {
        let entries: Vec<(String, PathBuf)> = (0..3)
            .map(|i| (format!("seq-{i}"), PathBuf::from(format!("/seq-{i}"))))
            .collect();
        assert_eq!(select(&entries, 1, 2).len(), 1);
        assert_eq!(select(&entries, 0, 100).len(), 3);
        assert_eq!(select(&entries, 5, 9).len(), 0);
    }
}
