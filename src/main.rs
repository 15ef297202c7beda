use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use korobu::config::InputKind;
use korobu::dataset::{self, DatasetBuffer, LabelSpec};
use korobu::pose::PoseNetwork;
use korobu::report::ReportSink;
use korobu::sweep::{window_sweep, SweepOptions};
use korobu::video::ImageFolder;

/// Sequences reserved for evaluation, from the front of the sorted listing.
const TEST_SEQUENCES: usize = 10;

const FRAME_SUFFIX: &str = ".png";

fn main() -> Result<()> {
    korobu::init_logger!();

    let mut args = env::args_os().skip(1);
    let (Some(dataset_root), Some(model_path)) = (args.next(), args.next()) else {
        bail!("usage: korobu <dataset-root> <pose-model.onnx>");
    };
    let dataset_root = PathBuf::from(dataset_root);
    let model_path = PathBuf::from(model_path);

    let sequences = dataset::sequence_dirs(&dataset_root)?;
    if sequences.len() <= TEST_SEQUENCES {
        bail!(
            "dataset root `{}` has only {} sequences, need more than {}",
            dataset_root.display(),
            sequences.len(),
            TEST_SEQUENCES,
        );
    }
    let (test_seqs, train_seqs) = sequences.split_at(TEST_SEQUENCES);
    log::info!(
        "{} training sequences, {} test sequences",
        train_seqs.len(),
        test_seqs.len(),
    );

    let build = |name: &str, path: &Path| -> Result<DatasetBuffer> {
        let labels = dataset::read_markers(&dataset_root.join("markers").join(format!("{name}.txt")))?;
        let mut source = ImageFolder::open(path, FRAME_SUFFIX)?;
        let mut pose = PoseNetwork::load(&model_path)?;
        DatasetBuffer::build(name, &mut source, &mut pose, LabelSpec::PerFrame(labels))
    };
    let train_buffers = dataset::build_buffers(train_seqs, build);
    let test_buffers = dataset::build_buffers(test_seqs, build);
    if train_buffers.is_empty() || test_buffers.is_empty() {
        bail!("no usable sequences after buffer construction");
    }

    let model_dir = env::temp_dir().join("korobu-models");
    std::fs::create_dir_all(&model_dir)?;

    let input = InputKind::Motion;
    for compress_frames in 0..4 {
        let options = SweepOptions {
            model_dir: model_dir.clone(),
            input,
            compress_frames,
            class_count: 3,
        };
        let mut report = ReportSink::new();
        window_sweep(&train_buffers, &test_buffers, 2..=20, &options, &mut report)?;
        report.flush_tsv(&PathBuf::from(format!(
            "report_{}_cmp{compress_frames}.tsv",
            input.name(),
        )))?;
    }

    Ok(())
}
