//! Body-pose landmark extraction.

use std::path::Path;

use anyhow::{ensure, Result};
use image::RgbImage;

use crate::landmark::{Landmark, Landmarks, NUM_POSE_LANDMARKS};
use crate::nn::{sigmoid, Cnn};

// MediaPipe-style landmark networks output 33 pose + 6 auxiliary landmarks,
// 5 values each.
const NUM_RAW_LANDMARKS: usize = 39;

/// Extracts zero-or-one landmark sets per frame.
///
/// `None` means no person was present in the frame. That is a normal skip,
/// not an error. Callers must still advance their processed-frame counter for such
/// frames.
pub trait PoseEstimator {
    fn estimate(&mut self, image: &RgbImage) -> Result<Option<Landmarks>>;
}

/// A MediaPipe-style pose landmark network (`pose_landmark_lite.onnx` /
/// `pose_landmark_full.onnx`), loaded from a filesystem path.
///
/// Landmark coordinates are normalized to the input region, so velocities
/// derived from them are in region-relative units.
pub struct PoseNetwork {
    cnn: Cnn,
    presence_threshold: f32,
}

impl PoseNetwork {
    pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

    /// Loads the landmark model from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        // The lite and full variants both take 256×256 inputs in 0..=1.
        let cnn = Cnn::load(path, 256, 256, 0.0..=1.0)?;
        Ok(Self {
            cnn,
            presence_threshold: Self::DEFAULT_PRESENCE_THRESHOLD,
        })
    }

    /// Sets the pose presence score below which a frame counts as containing
    /// no person.
    pub fn set_presence_threshold(&mut self, threshold: f32) {
        self.presence_threshold = threshold;
    }
}

impl PoseEstimator for PoseNetwork {
    fn estimate(&mut self, image: &RgbImage) -> Result<Option<Landmarks>> {
        let outputs = self.cnn.estimate(image)?;
        ensure!(
            outputs.len() >= 2,
            "pose network produced {} outputs, expected landmarks + presence flag",
            outputs.len(),
        );

        let flag = outputs.get(1)?;
        ensure!(flag.len() == 1, "unexpected presence tensor shape {:?}", flag.shape());
        let presence = flag.iter().copied().next().unwrap_or(0.0);
        if presence < self.presence_threshold {
            log::trace!("pose presence {presence:.03} below threshold");
            return Ok(None);
        }

        let screen = outputs.get(0)?;
        ensure!(
            screen.len() == NUM_RAW_LANDMARKS * 5,
            "unexpected landmark tensor shape {:?}",
            screen.shape(),
        );
        let values: Vec<f32> = screen.iter().copied().collect();

        let (w, h) = (
            self.cnn.input_width() as f32,
            self.cnn.input_height() as f32,
        );
        let mut landmarks = Landmarks::new(NUM_POSE_LANDMARKS);
        for (i, chunk) in values
            .chunks_exact(5)
            .take(NUM_POSE_LANDMARKS)
            .enumerate()
        {
            // x/y/z are in input-pixel coordinates; normalize to the region.
            landmarks.set(
                i,
                Landmark::new([chunk[0] / w, chunk[1] / h, chunk[2] / w])
                    .with_visibility(sigmoid(chunk[3]))
                    .with_presence(sigmoid(chunk[4])),
            );
        }
        Ok(Some(landmarks))
    }
}
