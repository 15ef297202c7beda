//! Dense neural network classifier.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{softmax_rows, to_matrix, Classifier, ModelKind};

const HIDDEN_SIZES: [usize; 2] = [64, 32];
const EPOCHS: usize = 400;
const LEARNING_RATE: f32 = 0.1;
const INIT_SEED: u64 = 0x6b6f_726f_6275_0001;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Params {
    /// Per-feature standardization fitted on the training set; velocity
    /// features are in cm/s, raw landmark coordinates in 0..1.
    mean: Array1<f32>,
    std: Array1<f32>,
    layers: Vec<DenseLayer>,
}

impl Params {
    fn standardize(&self, mut x: Array2<f32>) -> Array2<f32> {
        x -= &self.mean;
        x /= &self.std;
        x
    }
}

/// A small fully-connected network: ReLU hidden layers, softmax output,
/// full-batch gradient descent on cross-entropy.
pub struct DenseNet {
    class_count: usize,
    params: Option<Params>,
}

impl DenseNet {
    pub fn new(class_count: usize) -> Self {
        Self {
            class_count,
            params: None,
        }
    }

    fn init_params(&self, x: &Array2<f32>) -> Params {
        let mut rng = fastrand::Rng::with_seed(INIT_SEED);
        let mut dims = vec![x.ncols()];
        dims.extend_from_slice(&HIDDEN_SIZES);
        dims.push(self.class_count);

        let layers = dims
            .windows(2)
            .map(|dim| {
                let (fan_in, fan_out) = (dim[0], dim[1]);
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let weights = Array2::from_shape_fn((fan_in, fan_out), |_| {
                    (rng.f32() * 2.0 - 1.0) * limit
                });
                DenseLayer {
                    weights,
                    biases: Array1::zeros(fan_out),
                }
            })
            .collect();

        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < 1e-6 { 1.0 } else { s });
        Params { mean, std, layers }
    }

    /// Forward pass; returns the input followed by every layer's output
    /// (post-ReLU for hidden layers, raw logits for the last).
    fn forward(params: &Params, input: &Array2<f32>) -> Vec<Array2<f32>> {
        let mut activations = vec![input.clone()];
        for (i, layer) in params.layers.iter().enumerate() {
            let mut z = activations.last().unwrap().dot(&layer.weights) + &layer.biases;
            if i + 1 < params.layers.len() {
                z.mapv_inplace(|v| v.max(0.0));
            }
            activations.push(z);
        }
        activations
    }
}

impl Classifier for DenseNet {
    fn kind(&self) -> ModelKind {
        ModelKind::DenseNet
    }

    fn train(&mut self, samples: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<()> {
        let y = to_matrix(targets)?;
        let x = to_matrix(samples)?;
        let n = x.nrows() as f32;
        let mut params = self.init_params(&x);
        let x = params.standardize(x);

        for epoch in 0..EPOCHS {
            let activations = Self::forward(&params, &x);
            let mut probs = activations.last().unwrap().clone();
            softmax_rows(&mut probs);

            if epoch % 100 == 0 {
                let loss = -(&y * &probs.mapv(|p| (p + 1e-12).ln())).sum() / n;
                log::trace!("dnn epoch {epoch}: loss {loss:.04}");
            }

            // Cross-entropy + softmax gradient, backpropagated layer by layer.
            let mut delta = (&probs - &y) / n;
            for (i, layer) in params.layers.iter_mut().enumerate().rev() {
                let prev = &activations[i];
                let grad_w = prev.t().dot(&delta);
                let grad_b = delta.sum_axis(Axis(0));
                if i > 0 {
                    let mask = prev.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                    delta = delta.dot(&layer.weights.t()) * &mask;
                }
                layer.weights.scaled_add(-LEARNING_RATE, &grad_w);
                layer.biases.scaled_add(-LEARNING_RATE, &grad_b);
            }
        }

        self.params = Some(params);
        Ok(())
    }

    fn predict(&self, samples: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let Some(params) = &self.params else {
            bail!("dense net used before training or loading");
        };
        let x = params.standardize(to_matrix(samples)?);
        let mut probs = Self::forward(params, &x).pop().unwrap();
        softmax_rows(&mut probs);
        Ok(probs.rows().into_iter().map(|row| row.to_vec()).collect())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let Some(params) = &self.params else {
            bail!("cannot save an unfitted dense net");
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
        self.params = Some(serde_json::from_reader(BufReader::new(file))?);
        Ok(())
    }

    fn delete(&mut self) {
        self.params = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        // Two well-separated clusters.
        let mut samples = Vec::new();
        let mut targets = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f32 * 0.01;
            samples.push(vec![0.1 + jitter, 0.1]);
            targets.push(vec![1.0, 0.0]);
            samples.push(vec![0.9 - jitter, 0.9]);
            targets.push(vec![0.0, 1.0]);
        }
        (samples, targets)
    }

    #[test]
    fn learns_separable_clusters() {
        let (samples, targets) = blobs();
        let mut net = DenseNet::new(2);
        net.train(&samples, &targets).unwrap();
        let scores = net.predict(&vec![vec![0.1, 0.1], vec![0.9, 0.9]]).unwrap();
        assert!(scores[0][0] > scores[0][1]);
        assert!(scores[1][1] > scores[1][0]);
    }

    #[test]
    fn predict_before_fit_is_fatal() {
        let net = DenseNet::new(2);
        assert!(net.predict(&vec![vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn save_load_round_trip() {
        let (samples, targets) = blobs();
        let mut net = DenseNet::new(2);
        net.train(&samples, &targets).unwrap();
        let before = net.predict(&samples).unwrap();

        let dir = std::env::temp_dir().join("korobu-dnn-test");
        std::fs::create_dir_all(&dir).unwrap();
        net.save(&dir).unwrap();
        net.delete();
        assert!(net.predict(&samples).is_err());
        net.load(&dir).unwrap();
        assert_eq!(net.predict(&samples).unwrap(), before);
        std::fs::remove_dir_all(&dir).ok();
    }
}
