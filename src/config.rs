//! Pipeline configuration.

/// Selects what goes into an emitted sample's feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputKind {
    /// Concatenation of the flattened landmark vectors in the window.
    Raw,
    /// Concatenation of the derived motion features in the window.
    Motion,
}

impl InputKind {
    /// Short name used in report file names.
    pub fn name(&self) -> &'static str {
        match self {
            InputKind::Raw => "raw",
            InputKind::Motion => "motion",
        }
    }
}

/// Configuration of the windowing/feature pipeline.
///
/// The default configuration uses the shortest valid window (2 retained
/// frames), no frame subsampling, motion-feature input and 3 activity
/// classes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of most-recent retained frames kept for windowed feature
    /// construction. Must be at least 2; a single retained frame has no
    /// motion.
    pub window_length: usize,
    /// Subsampling stride: a processed frame is retained only if more than
    /// `compress_frames` processed frames have elapsed since the last
    /// retained one.
    pub compress_frames: usize,
    /// Sample feature representation.
    pub input: InputKind,
    /// Number of activity classes (one-hot label width). Must be nonzero.
    pub class_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_length: 2,
            compress_frames: 0,
            input: InputKind::Motion,
            class_count: 3,
        }
    }
}

impl PipelineConfig {
    pub fn window_length(mut self, window_length: usize) -> Self {
        self.window_length = window_length;
        self
    }

    pub fn compress_frames(mut self, compress_frames: usize) -> Self {
        self.compress_frames = compress_frames;
        self
    }

    pub fn input(mut self, input: InputKind) -> Self {
        self.input = input;
        self
    }

    pub fn class_count(mut self, class_count: usize) -> Self {
        self.class_count = class_count;
        self
    }
}
