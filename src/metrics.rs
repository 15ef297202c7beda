//! Classification metrics.

use itertools::zip_eq;
use ndarray::Array2;

/// Index of the highest score in a row. Ties go to the earlier class.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }
    best
}

/// A confusion matrix over a fixed set of class ids.
///
/// Rows are ground truth, columns are predictions.
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(class_count: usize) -> Self {
        Self {
            counts: Array2::zeros((class_count, class_count)),
        }
    }

    /// Builds a matrix from ground-truth class ids and per-sample score
    /// vectors (predictions taken by [`argmax`]).
    ///
    /// # Panics
    ///
    /// Panics if the two sequences have different lengths or contain a class
    /// id outside `0..class_count`; both mean the caller fed misaligned
    /// results.
    pub fn from_predictions(truths: &[usize], scores: &[Vec<f32>], class_count: usize) -> Self {
        let mut matrix = Self::new(class_count);
        for (&truth, score) in zip_eq(truths, scores) {
            matrix.record(truth, argmax(score));
        }
        matrix
    }

    pub fn record(&mut self, truth: usize, prediction: usize) {
        self.counts[[truth, prediction]] += 1;
    }

    pub fn count(&self, truth: usize, prediction: usize) -> usize {
        self.counts[[truth, prediction]]
    }

    /// Number of ground-truth instances of `class`.
    pub fn support(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }

    /// Fraction of true `class` instances predicted correctly.
    ///
    /// Returns 0.0 for a class with no ground-truth instances.
    pub fn recall(&self, class: usize) -> f32 {
        let support = self.support(class);
        if support == 0 {
            return 0.0;
        }
        self.counts[[class, class]] as f32 / support as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_breaks_ties_low() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn recall_counts_per_class() {
        let truths = [0, 0, 1, 1, 1, 2];
        let scores = vec![
            vec![0.9, 0.1, 0.0], // 0 correct
            vec![0.1, 0.9, 0.0], // 0 as 1
            vec![0.0, 1.0, 0.0], // 1 correct
            vec![0.0, 0.8, 0.2], // 1 correct
            vec![0.6, 0.2, 0.2], // 1 as 0
            vec![0.0, 0.0, 1.0], // 2 correct
        ];
        let matrix = ConfusionMatrix::from_predictions(&truths, &scores, 3);
        assert_eq!(matrix.recall(0), 0.5);
        assert!((matrix.recall(1) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(matrix.recall(2), 1.0);
        assert_eq!(matrix.support(1), 3);
        assert_eq!(matrix.count(1, 0), 1);
    }

    #[test]
    fn absent_class_has_zero_recall() {
        let matrix = ConfusionMatrix::from_predictions(&[0], &vec![vec![1.0, 0.0]], 2);
        assert_eq!(matrix.recall(1), 0.0);
    }
}
