//! Experiment driver: configuration sweeps over the pipeline and ensemble.
//!
//! The driver is pure iteration and configuration: it builds samples from
//! pre-scanned buffers, trains/evaluates the ensemble and appends recall
//! rows to a [`ReportSink`]. Buffers are treated as immutable shared state
//! and reused read-only across iterations.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use anyhow::Result;

use crate::classifier;
use crate::config::{InputKind, PipelineConfig};
use crate::dataset::{self, DatasetBuffer};
use crate::metrics::ConfusionMatrix;
use crate::report::{ReportRow, ReportSink};
use crate::timer::Timer;
use crate::window::{collect_samples, Sample};

/// Activity class names, indexed by class id.
pub const TARGET_NAMES: [&str; 3] = ["no action", "fall", "drink"];

/// Sweep-wide settings shared by all iterations.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Where trained models are persisted between the train and test phases.
    pub model_dir: PathBuf,
    /// Feature representation for emitted samples.
    pub input: InputKind,
    /// Subsampling stride applied to processed frames.
    pub compress_frames: usize,
    /// Number of activity classes.
    pub class_count: usize,
}

impl SweepOptions {
    fn config(&self, window_length: usize) -> PipelineConfig {
        PipelineConfig::default()
            .window_length(window_length)
            .compress_frames(self.compress_frames)
            .input(self.input)
            .class_count(self.class_count)
    }
}

/// Sweeps the window length over `window_lengths`, training on `train` and
/// evaluating on `test` at every point. One report row per window length.
pub fn window_sweep(
    train: &[DatasetBuffer],
    test: &[DatasetBuffer],
    window_lengths: RangeInclusive<usize>,
    options: &SweepOptions,
    report: &mut ReportSink,
) -> Result<()> {
    for window_length in window_lengths {
        let recalls = run_point(train, test, window_length, options)?;
        report.push(ReportRow {
            window_length,
            compress_frames: options.compress_frames,
            recalls,
        });
    }
    Ok(())
}

/// Sweeps the train/test split fraction over `fractions` at a fixed window
/// length, re-partitioning `buffers` at every point.
pub fn split_sweep(
    buffers: &[DatasetBuffer],
    fractions: &[f64],
    window_length: usize,
    options: &SweepOptions,
    report: &mut ReportSink,
) -> Result<()> {
    for &fraction in fractions {
        let (train_range, test_range) = dataset::train_test_split(buffers.len(), fraction);
        log::info!(
            "split {:.0}%: training on {} sequences, testing on {}",
            fraction * 100.0,
            train_range.len(),
            test_range.len(),
        );
        let recalls = run_point(
            &buffers[train_range],
            &buffers[test_range],
            window_length,
            options,
        )?;
        report.push(ReportRow {
            window_length,
            compress_frames: options.compress_frames,
            recalls,
        });
    }
    Ok(())
}

/// Runs one sweep point: trains the full ensemble on `train`, persists it,
/// then reloads every model from disk and evaluates it on `test`.
///
/// Returns the recall for every non-default target class, per classifier, in
/// ensemble order.
pub fn run_point(
    train: &[DatasetBuffer],
    test: &[DatasetBuffer],
    window_length: usize,
    options: &SweepOptions,
) -> Result<Vec<f32>> {
    let config = options.config(window_length);
    let mut ensemble = classifier::ensemble(options.class_count);
    let mut t_train = Timer::new("train");
    let mut t_test = Timer::new("test");

    let (features, one_hots, _) = gather(train, &config)?;
    for model in &mut ensemble {
        t_train.time(|| model.train(&features, &one_hots))?;
        model.save(&options.model_dir)?;
    }

    let (features, _, truths) = gather(test, &config)?;
    let mut recalls = Vec::new();
    for model in &mut ensemble {
        // Evaluate what was persisted, not what is still in memory.
        model.delete();
        model.load(&options.model_dir)?;
        let scores = t_test.time(|| model.predict(&features))?;
        let matrix = ConfusionMatrix::from_predictions(&truths, &scores, options.class_count);
        for class in 1..options.class_count {
            log::debug!(
                "window {window_length}: {:?} recall[{}] = {:.03}",
                model.kind(),
                TARGET_NAMES.get(class).copied().unwrap_or("?"),
                matrix.recall(class),
            );
            recalls.push(matrix.recall(class));
        }
    }
    log::info!("window {window_length}: {t_train}, {t_test}");
    Ok(recalls)
}

/// Collects all samples of `buffers` under `config` into classifier-shaped
/// columns.
fn gather(
    buffers: &[DatasetBuffer],
    config: &PipelineConfig,
) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>, Vec<usize>)> {
    let mut features = Vec::new();
    let mut one_hots = Vec::new();
    let mut classes = Vec::new();
    for buffer in buffers {
        for Sample {
            features: f,
            one_hot,
            class,
            ..
        } in collect_samples(buffer, config)?
        {
            features.push(f);
            one_hots.push(one_hot);
            classes.push(class);
        }
    }
    Ok((features, one_hots, classes))
}
