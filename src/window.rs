//! Sliding-window aggregation of landmark streams into training samples.
//!
//! [`SampleWindow`] is the core state machine of the crate: it consumes one
//! landmark set per processed frame (tagged with its processed-frame index),
//! applies the frame-subsampling gate, maintains the bounded retained-frame
//! and motion-feature windows, and emits one feature vector per retained
//! frame once both windows are saturated. [`collect_samples`] drives a full
//! [`DatasetBuffer`] through a fresh window and attaches labels by
//! processed-frame index.

use std::collections::VecDeque;

use anyhow::{ensure, Result};

use crate::config::{InputKind, PipelineConfig};
use crate::dataset::DatasetBuffer;
use crate::feature::MotionFeature;
use crate::landmark::{Landmarks, NUM_POSE_LANDMARKS};

/// One emitted training/inference unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The windowed feature vector (representation per [`InputKind`]).
    pub features: Vec<f32>,
    /// Scalar class id, aligned with the emitting frame.
    pub class: usize,
    /// One-hot encoding of `class`, sized to the configured class count.
    pub one_hot: Vec<f32>,
    /// Processed-frame index of the frame that emitted this sample.
    pub frame: usize,
}

/// Windowed features emitted by [`SampleWindow::push`], before label
/// attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFeatures {
    /// Processed-frame index of the emitting frame.
    pub frame: usize,
    pub features: Vec<f32>,
}

/// Progress of a [`SampleWindow`] through its warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Fewer than 2 retained frames; no motion can be derived yet.
    Warmup,
    /// Motion window below `window_length - 1` entries; nothing is emitted.
    Filling,
    /// Both windows saturated; one sample per retained frame.
    Steady,
}

struct Retained {
    landmarks: Landmarks,
    flat: Vec<f32>,
}

/// The windowing/feature state machine.
///
/// Reset (or construct fresh) at the start of every dataset buffer; windows
/// never span sequence boundaries.
pub struct SampleWindow {
    window_length: usize,
    compress_frames: usize,
    input: InputKind,
    retained: VecDeque<Retained>,
    motion: VecDeque<MotionFeature>,
    last_retained: Option<usize>,
}

impl SampleWindow {
    /// Creates an empty window for `config`.
    ///
    /// # Panics
    ///
    /// Panics if the configured window length is less than 2.
    pub fn new(config: &PipelineConfig) -> Self {
        assert!(
            config.window_length >= 2,
            "window length must be at least 2, got {}",
            config.window_length,
        );
        Self {
            window_length: config.window_length,
            compress_frames: config.compress_frames,
            input: config.input,
            retained: VecDeque::with_capacity(config.window_length),
            motion: VecDeque::with_capacity(config.window_length - 1),
            last_retained: None,
        }
    }

    /// Discards all window contents, returning to [`WindowState::Warmup`].
    pub fn reset(&mut self) {
        self.retained.clear();
        self.motion.clear();
        self.last_retained = None;
    }

    pub fn state(&self) -> WindowState {
        if self.retained.len() < 2 {
            WindowState::Warmup
        } else if self.motion.len() < self.window_length - 1 {
            WindowState::Filling
        } else {
            WindowState::Steady
        }
    }

    /// Number of landmark sets currently retained.
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Processed-frame index of the most recently retained frame, if any.
    pub fn last_retained(&self) -> Option<usize> {
        self.last_retained
    }

    /// Feeds the landmark set observed at processed-frame index `frame`.
    ///
    /// Frames with no detected person must *not* be pushed; they only
    /// advance the caller's processed-frame counter. `frame` indices must be
    /// strictly increasing; a landmark set with the wrong point count is an
    /// input-contract violation. Both are reported as errors.
    ///
    /// Returns the windowed features when the frame was retained and the
    /// window is in [`WindowState::Steady`], `None` otherwise.
    pub fn push(
        &mut self,
        frame: usize,
        landmarks: &Landmarks,
    ) -> Result<Option<WindowFeatures>> {
        ensure!(
            landmarks.len() == NUM_POSE_LANDMARKS,
            "malformed landmark set: expected {} points, got {}",
            NUM_POSE_LANDMARKS,
            landmarks.len(),
        );
        if let Some(last) = self.last_retained {
            ensure!(
                frame > last,
                "processed-frame index went backwards: {} after {}",
                frame,
                last,
            );
            // The subsampling gate: retain only if more than `compress_frames`
            // processed frames have elapsed since the last retained one.
            if frame - last <= self.compress_frames {
                return Ok(None);
            }
        }
        self.last_retained = Some(frame);

        let flat = landmarks.flattened();
        self.retained.push_back(Retained {
            landmarks: landmarks.clone(),
            flat,
        });
        if self.retained.len() > self.window_length {
            self.retained.pop_front();
        }
        if self.retained.len() < 2 {
            return Ok(None);
        }

        // Pairwise motion between the two most-recently-retained frames.
        let prev = &self.retained[self.retained.len() - 2];
        let next = &self.retained[self.retained.len() - 1];
        self.motion.push_back(MotionFeature::between(
            &prev.landmarks,
            &prev.flat,
            &next.landmarks,
            &next.flat,
        ));
        if self.motion.len() > self.window_length - 1 {
            self.motion.pop_front();
        }

        if self.retained.len() < self.window_length || self.motion.len() < self.window_length - 1 {
            return Ok(None);
        }

        let features = match self.input {
            InputKind::Raw => self
                .retained
                .iter()
                .flat_map(|r| r.flat.iter().copied())
                .collect(),
            InputKind::Motion => self.motion.iter().flat_map(|m| m.as_array()).collect(),
        };
        Ok(Some(WindowFeatures { frame, features }))
    }
}

/// Runs a full [`DatasetBuffer`] through a fresh [`SampleWindow`], fetching
/// each emitted sample's label from the buffer by the emitting frame's
/// processed-frame index.
///
/// A label outside the configured class range is a contract violation and
/// aborts the collection; silently mismatched labels would corrupt all
/// downstream training.
pub fn collect_samples(buffer: &DatasetBuffer, config: &PipelineConfig) -> Result<Vec<Sample>> {
    let mut window = SampleWindow::new(config);
    let mut samples = Vec::new();
    for obs in buffer.observations() {
        let Some(out) = window.push(obs.frame, &obs.landmarks)? else {
            continue;
        };
        let class = buffer.label_for(out.frame)?;
        ensure!(
            class < config.class_count,
            "class id {} at processed frame {} of `{}` exceeds class count {}",
            class,
            out.frame,
            buffer.name(),
            config.class_count,
        );
        let mut one_hot = vec![0.0; config.class_count];
        one_hot[class] = 1.0;
        samples.push(Sample {
            features: out.features,
            class,
            one_hot,
            frame: out.frame,
        });
    }
    log::debug!(
        "`{}`: {} samples from {} observations (window {}, stride {})",
        buffer.name(),
        samples.len(),
        buffer.observations().len(),
        config.window_length,
        config.compress_frames,
    );
    Ok(samples)
}
