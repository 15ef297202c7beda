//! Decision tree classifier (CART, Gini impurity).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use super::{classes_from_one_hot, to_matrix, Classifier, ModelKind};

const MAX_DEPTH: usize = 12;
const MIN_SPLIT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Class distribution of the training samples that reached this leaf.
        scores: Vec<f32>,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn descend(&self, sample: &[f32]) -> &[f32] {
        match self {
            Node::Leaf { scores } => scores,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.descend(sample)
                } else {
                    right.descend(sample)
                }
            }
        }
    }
}

/// A CART classification tree. Leaf scores are training-set class
/// distributions, so `predict` yields probability-like vectors.
pub struct DecisionTree {
    class_count: usize,
    root: Option<Node>,
}

impl DecisionTree {
    pub fn new(class_count: usize) -> Self {
        Self {
            class_count,
            root: None,
        }
    }

    fn leaf(&self, rows: &[usize], classes: &[usize]) -> Node {
        let mut counts = vec![0usize; self.class_count];
        for &row in rows {
            counts[classes[row]] += 1;
        }
        let total = rows.len().max(1) as f32;
        Node::Leaf {
            scores: counts.iter().map(|&c| c as f32 / total).collect(),
        }
    }

    fn gini(counts: &[usize], total: usize) -> f32 {
        if total == 0 {
            return 0.0;
        }
        let total = total as f32;
        1.0 - counts
            .iter()
            .map(|&c| {
                let p = c as f32 / total;
                p * p
            })
            .sum::<f32>()
    }

    fn grow(
        &self,
        rows: Vec<usize>,
        samples: &ndarray::Array2<f32>,
        classes: &[usize],
        depth: usize,
    ) -> Node {
        let mut counts = vec![0usize; self.class_count];
        for &row in &rows {
            counts[classes[row]] += 1;
        }
        let impurity = Self::gini(&counts, rows.len());
        if depth >= MAX_DEPTH || rows.len() < MIN_SPLIT || impurity == 0.0 {
            return self.leaf(&rows, classes);
        }

        // Exhaustive split search: for every feature, scan the sorted value
        // sequence and track the weighted-Gini minimum.
        let mut best: Option<(usize, f32, f32)> = None; // (feature, threshold, score)
        for feature in 0..samples.ncols() {
            let mut ordered: Vec<(f32, usize)> = rows
                .iter()
                .map(|&row| (samples[[row, feature]], classes[row]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_counts = vec![0usize; self.class_count];
            let mut right_counts = counts.clone();
            for i in 0..ordered.len() - 1 {
                let (value, class) = ordered[i];
                left_counts[class] += 1;
                right_counts[class] -= 1;
                let next_value = ordered[i + 1].0;
                if next_value <= value {
                    continue;
                }
                let left_n = i + 1;
                let right_n = ordered.len() - left_n;
                let score = (left_n as f32 * Self::gini(&left_counts, left_n)
                    + right_n as f32 * Self::gini(&right_counts, right_n))
                    / ordered.len() as f32;
                if best.map_or(true, |(_, _, s)| score < s) {
                    best = Some((feature, (value + next_value) / 2.0, score));
                }
            }
        }

        let Some((feature, threshold, score)) = best else {
            return self.leaf(&rows, classes);
        };
        if score >= impurity {
            // No split improves on the node itself.
            return self.leaf(&rows, classes);
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| samples[[row, feature]] <= threshold);
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left_rows, samples, classes, depth + 1)),
            right: Box::new(self.grow(right_rows, samples, classes, depth + 1)),
        }
    }
}

impl Classifier for DecisionTree {
    fn kind(&self) -> ModelKind {
        ModelKind::DecisionTree
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
        let rows = (0..samples.len()).collect();
        self.root = Some(self.grow(rows, &matrix, &classes, 0));
        Ok(())
    }

    fn predict(&self, samples: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let Some(root) = &self.root else {
            bail!("decision tree used before training or loading");
        };
        Ok(samples
            .iter()
            .map(|sample| root.descend(sample).to_vec())
            .collect())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let Some(root) = &self.root else {
            bail!("cannot save an unfitted decision tree");
        };
        let path = self.kind().path_in(dir);
        let file = File::create(&path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), root)?;
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let path = self.kind().path_in(dir);
        let file = File::open(&path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        self.root = Some(serde_json::from_reader(BufReader::new(file))?);
        Ok(())
    }

    fn delete(&mut self) {
        self.root = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_one_dimensional_classes() {
        let samples: Vec<Vec<f32>> = (0..10)
            .map(|i| vec![i as f32, 0.5])
            .collect();
        let targets: Vec<Vec<f32>> = (0..10)
            .map(|i| {
                if i < 5 {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect();
        let mut tree = DecisionTree::new(2);
        tree.train(&samples, &targets).unwrap();

        let scores = tree.predict(&vec![vec![1.0, 0.5], vec![8.0, 0.5]]).unwrap();
        assert_eq!(scores[0], vec![1.0, 0.0]);
        assert_eq!(scores[1], vec![0.0, 1.0]);
    }

    #[test]
    fn pure_node_becomes_a_leaf() {
        let samples = vec![vec![1.0], vec![2.0], vec![3.0]];
        let targets = vec![vec![1.0, 0.0]; 3];
        let mut tree = DecisionTree::new(2);
        tree.train(&samples, &targets).unwrap();
        assert!(matches!(tree.root, Some(Node::Leaf { .. })));
    }

    #[test]
    fn predict_before_fit_is_fatal() {
        let tree = DecisionTree::new(2);
        assert!(tree.predict(&vec![vec![0.0]]).is_err());
    }
}
