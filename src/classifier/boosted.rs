//! Gradient-boosted trees classifier.
//!
//! Multiclass boosting on softmax residuals: each round fits one shallow
//! regression tree per class to the current residual `y - p`, and the class
//! scores accumulate the scaled tree outputs.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{classes_from_one_hot, softmax_rows, to_matrix, Classifier, ModelKind};

const ROUNDS: usize = 50;
const LEARNING_RATE: f32 = 0.2;
const MAX_DEPTH: usize = 3;
const MIN_SPLIT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegNode {
    Leaf {
        value: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: Box<RegNode>,
        right: Box<RegNode>,
    },
}

impl RegNode {
    fn eval(&self, sample: &[f32]) -> f32 {
        match self {
            RegNode::Leaf { value } => *value,
            RegNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.eval(sample)
                } else {
                    right.eval(sample)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Params {
    class_count: usize,
    /// `rounds[t][class]` is the regression tree added for `class` in round
    /// `t`.
    rounds: Vec<Vec<RegNode>>,
}

/// Gradient-boosted shallow regression trees with a softmax link.
pub struct BoostedTrees {
    class_count: usize,
    params: Option<Params>,
}

impl BoostedTrees {
    pub fn new(class_count: usize) -> Self {
        Self {
            class_count,
            params: None,
        }
    }

    fn mean(rows: &[usize], residuals: &[f32]) -> f32 {
        if rows.is_empty() {
            return 0.0;
        }
        rows.iter().map(|&row| residuals[row]).sum::<f32>() / rows.len() as f32
    }

    fn sse(rows: &[usize], residuals: &[f32], mean: f32) -> f32 {
        rows.iter()
            .map(|&row| {
                let d = residuals[row] - mean;
                d * d
            })
            .sum()
    }

    fn grow(
        rows: Vec<usize>,
        samples: &Array2<f32>,
        residuals: &[f32],
        depth: usize,
    ) -> RegNode {
        let mean = Self::mean(&rows, residuals);
        if depth >= MAX_DEPTH || rows.len() < MIN_SPLIT {
            return RegNode::Leaf { value: mean };
        }
        let parent_sse = Self::sse(&rows, residuals, mean);

        // Variance-reduction split search over every feature.
        let mut best: Option<(usize, f32, f32)> = None;
        for feature in 0..samples.ncols() {
            let mut ordered: Vec<(f32, f32)> = rows
                .iter()
                .map(|&row| (samples[[row, feature]], residuals[row]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total_sum: f32 = ordered.iter().map(|&(_, r)| r).sum();
            let mut left_sum = 0.0;
            for i in 0..ordered.len() - 1 {
                let (value, residual) = ordered[i];
                left_sum += residual;
                let next_value = ordered[i + 1].0;
                if next_value <= value {
                    continue;
                }
                let left_n = (i + 1) as f32;
                let right_n = (ordered.len() - i - 1) as f32;
                let right_sum = total_sum - left_sum;
                // SSE decomposition: maximizing sum(n * mean²) minimizes SSE.
                let score = left_sum * left_sum / left_n + right_sum * right_sum / right_n;
                if best.map_or(true, |(_, _, s)| score > s) {
                    best = Some((feature, (value + next_value) / 2.0, score));
                }
            }
        }

        let Some((feature, threshold, _)) = best else {
            return RegNode::Leaf { value: mean };
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| samples[[row, feature]] <= threshold);
        if left_rows.is_empty() || right_rows.is_empty() || parent_sse == 0.0 {
            let rows: Vec<usize> = left_rows.into_iter().chain(right_rows).collect();
            return RegNode::Leaf {
                value: Self::mean(&rows, residuals),
            };
        }
        RegNode::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(left_rows, samples, residuals, depth + 1)),
            right: Box::new(Self::grow(right_rows, samples, residuals, depth + 1)),
        }
    }

    fn scores(params: &Params, samples: &[Vec<f32>]) -> Array2<f32> {
        let mut scores = Array2::zeros((samples.len(), params.class_count));
        for round in &params.rounds {
            for (class, tree) in round.iter().enumerate() {
                for (row, sample) in samples.iter().enumerate() {
                    scores[[row, class]] += LEARNING_RATE * tree.eval(sample);
                }
            }
        }
        scores
    }
}

impl Classifier for BoostedTrees {
    fn kind(&self) -> ModelKind {
        ModelKind::BoostedTrees
    }

    fn train(&mut self, samples: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<()> {
        ensure!(
            samples.len() == targets.len(),
            "{} samples but {} targets",
            samples.len(),
            targets.len(),
        );
        let matrix = to_matrix(samples)?;
        let classes = classes_from_one_hot(targets);
        let n = samples.len();

        let mut scores = Array2::<f32>::zeros((n, self.class_count));
        let mut rounds = Vec::with_capacity(ROUNDS);
        for _ in 0..ROUNDS {
            let mut probs = scores.clone();
            softmax_rows(&mut probs);

            let mut round = Vec::with_capacity(self.class_count);
            for class in 0..self.class_count {
                let residuals: Vec<f32> = (0..n)
                    .map(|row| {
                        let target = if classes[row] == class { 1.0 } else { 0.0 };
                        target - probs[[row, class]]
                    })
                    .collect();
                let tree = Self::grow((0..n).collect(), &matrix, &residuals, 0);
                for (row, sample) in samples.iter().enumerate() {
                    scores[[row, class]] += LEARNING_RATE * tree.eval(sample);
                }
                round.push(tree);
            }
            rounds.push(round);
        }

        self.params = Some(Params {
            class_count: self.class_count,
            rounds,
        });
        Ok(())
    }

    fn predict(&self, samples: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let Some(params) = &self.params else {
            bail!("boosted trees used before training or loading");
        };
        let mut scores = Self::scores(params, samples);
        softmax_rows(&mut scores);
        Ok(scores.rows().into_iter().map(|row| row.to_vec()).collect())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let Some(params) = &self.params else {
            bail!("cannot save unfitted boosted trees");
        };
        let path = self.kind().path_in(dir);
        let file = File::create(&path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), params)?;
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let path = self.kind().path_in(dir);
        let file = File::open(&path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        let params: Params = serde_json::from_reader(BufReader::new(file))?;
        ensure!(
            params.class_count == self.class_count,
            "persisted model has {} classes, expected {}",
            params.class_count,
            self.class_count,
        );
        self.params = Some(params);
        Ok(())
    }

    fn delete(&mut self) {
        self.params = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learns_a_threshold_rule() {
        let samples: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32 / 20.0]).collect();
        let targets: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                if i < 10 {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect();
        let mut model = BoostedTrees::new(2);
        model.train(&samples, &targets).unwrap();

        let scores = model.predict(&vec![vec![0.05], vec![0.95]]).unwrap();
        assert!(scores[0][0] > scores[0][1]);
        assert!(scores[1][1] > scores[1][0]);
    }

    #[test]
    fn predict_before_fit_is_fatal() {
        let model = BoostedTrees::new(2);
        assert!(model.predict(&vec![vec![0.0]]).is_err());
    }
}
