//! Trainable activity classifiers sharing one train/predict/persist contract.

mod boosted;
mod dnn;
mod tree;

pub use boosted::BoostedTrees;
pub use dnn::DenseNet;
pub use tree::DecisionTree;

use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use ndarray::Array2;

/// The classifier kinds making up the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    DenseNet,
    DecisionTree,
    BoostedTrees,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::DenseNet,
        ModelKind::DecisionTree,
        ModelKind::BoostedTrees,
    ];

    /// File name used to persist this kind of model.
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::DenseNet => "dnn.json",
            ModelKind::DecisionTree => "tree.json",
            ModelKind::BoostedTrees => "boosted.json",
        }
    }

    pub(crate) fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// Contract shared by all classifiers in the ensemble.
///
/// All errors are fatal to the harness: there is no recovery path for a
/// model that cannot fit, persist or predict. In particular, predicting
/// before any fit or load is an error, never a silent zero result.
pub trait Classifier {
    fn kind(&self) -> ModelKind;

    /// Fits the model on all samples at once. `targets` holds one one-hot
    /// row per sample.
    fn train(&mut self, samples: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<()>;

    /// Returns one score vector over classes per sample.
    fn predict(&self, samples: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;

    /// Persists fitted parameters under `dir`, keyed by [`ModelKind`].
    fn save(&self, dir: &Path) -> Result<()>;

    /// Restores fitted parameters from `dir`.
    fn load(&mut self, dir: &Path) -> Result<()>;

    /// Releases fitted state; the model must be re-trained or re-loaded
    /// before the next prediction.
    fn delete(&mut self);
}

/// Builds the full ensemble, in [`ModelKind::ALL`] order.
pub fn ensemble(class_count: usize) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(DenseNet::new(class_count)),
        Box::new(DecisionTree::new(class_count)),
        Box::new(BoostedTrees::new(class_count)),
    ]
}

/// Stacks equally-sized sample rows into an `n×d` matrix.
pub(crate) fn to_matrix(rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    ensure!(!rows.is_empty(), "no samples");
    let width = rows[0].len();
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        ensure!(
            row.len() == width,
            "ragged sample matrix: {} vs {} features",
            row.len(),
            width,
        );
        data.extend_from_slice(row);
    }
    Ok(Array2::from_shape_vec((rows.len(), width), data)?)
}

/// Row-wise softmax, in place.
pub(crate) fn softmax_rows(scores: &mut Array2<f32>) {
    for mut row in scores.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

/// Scalar class ids from one-hot target rows.
pub(crate) fn classes_from_one_hot(targets: &[Vec<f32>]) -> Vec<usize> {
    targets.iter().map(|row| crate::metrics::argmax(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(to_matrix(&rows).is_err());
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let mut scores = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, -5.0, 0.0, 5.0]).unwrap();
        softmax_rows(&mut scores);
        for row in scores.rows() {
            let sum: f32 = row.sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        assert!(scores[[0, 2]] > scores[[0, 0]]);
    }
}
