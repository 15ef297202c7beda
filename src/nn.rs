//! Neural network inference (ONNX via tract).

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Applies the standard sigmoid/logistic function to the input.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// An image-consuming neural network loaded from an ONNX file.
///
/// Input images are sampled to the network's `1×3×h×w` (NCHW) input tensor
/// with sRGB values mapped linearly to the configured color range. No aspect
/// ratio correction is performed; callers crop their region of interest
/// first.
pub struct Cnn {
    model: Model,
    width: u32,
    height: u32,
    color_range: RangeInclusive<f32>,
}

impl Cnn {
    /// Loads an ONNX model from `path`, fixing its input to
    /// `1×3×height×width`.
    pub fn load(
        path: &Path,
        width: u32,
        height: u32,
        color_range: RangeInclusive<f32>,
    ) -> Result<Self> {
        assert!(color_range.end() > color_range.start());
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to load ONNX model `{}`", path.display()))?
            .with_input_fact(
                0,
                f32::fact([1, 3, height as usize, width as usize]).into(),
            )?
            .into_optimized()?
            .into_runnable()?;
        log::debug!(
            "loaded `{}` ({}x{} input)",
            path.display(),
            width,
            height,
        );
        Ok(Self {
            model,
            width,
            height,
            color_range,
        })
    }

    #[inline]
    pub fn input_width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn input_height(&self) -> u32 {
        self.height
    }

    /// Samples `image` down/up to the input resolution and runs inference.
    pub fn estimate(&self, image: &RgbImage) -> Result<Outputs> {
        let tensor = self.image_to_tensor(image);
        let outputs = self.model.run(tvec!(tensor.into()))?;
        Ok(Outputs { outputs })
    }

    fn image_to_tensor(&self, image: &RgbImage) -> Tensor {
        let (w, h) = (self.width as usize, self.height as usize);
        let start = *self.color_range.start();
        let scale = (self.color_range.end() - start) / 255.0;
        let array = tract_ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
            // Nearest-neighbor sampling into the network's resolution.
            let sx = (x as u32 * image.width() / self.width).min(image.width() - 1);
            let sy = (y as u32 * image.height() / self.height).min(image.height() - 1);
            image.get_pixel(sx, sy).0[c] as f32 * scale + start
        });
        array.into()
    }
}

/// The output tensors produced by a [`Cnn`] inference run.
pub struct Outputs {
    outputs: TVec<TValue>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Borrows output `index` as an `f32` array view.
    pub fn get(&self, index: usize) -> Result<tract_ndarray::ArrayViewD<'_, f32>> {
        self.outputs[index].to_array_view::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered_and_bounded() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }
}
