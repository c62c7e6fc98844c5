//! Neural Network inference.
//!
//! Networks are loaded from ONNX files and run on the CPU with [`tract_onnx`]. Tensors are
//! exchanged as [`ndarray`] arrays of `f32`.

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use image::{Rgb, RgbImage};
use ndarray::{Array4, ArrayD};
use ringfit_image::{rect::RotatedRect, sample::sample_region, Resolution};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, Tensor, TypedFact, TypedOp,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input of shape `[1, 3, H, W]` (planar RGB).
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn)?;
        Ok(Self {
            nn,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (w, h) = match &*tensor_shape {
            [1, 3, h, w] => (*w, *h),
            _ => anyhow::bail!("invalid CNN input shape {:?}, expected NCHW", tensor_shape),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `region` of `image`, returning the estimated outputs.
    ///
    /// The region is sampled to create the network's input tensor. If its aspect ratio does not
    /// match the network's input aspect ratio, the image will be stretched.
    pub fn estimate(&self, image: &RgbImage, region: RotatedRect) -> anyhow::Result<Outputs> {
        let input = sample_region(image, region, self.input_res);
        let tensor = image_to_tensor(&input, &self.color_mapper);
        self.nn.estimate(tensor)
    }
}

/// Converts interleaved 8-bit RGB pixels into a planar `[1, 3, H, W]` tensor in the value range
/// of `mapper`.
pub fn image_to_tensor(image: &RgbImage, mapper: &ColorMapper) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        mapper.map(*image.get_pixel(x as u32, y as u32))[c]
    })
}

#[derive(Clone)]
enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps 8-bit color values to the value range a network was trained on.
#[derive(Clone)]
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range. The MediaPipe hand networks expect exactly that.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Rgb<u8>) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                color.0.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

/// Neural network loader.
pub struct Loader {
    model_data: Vec<u8>,
}

impl Loader {

    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &self.model_data[..])?
            .into_optimized()?;
        let outputs = graph.output_outlets()?.to_vec();
        let model = SimplePlan::new_for_outputs(graph, &outputs)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures. Dropping the last
/// handle frees the network.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Loader> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?;
        Ok(Loader { model_data })
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the concrete tensor shape of input `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => anyhow::bail!("network input {} has a symbolic shape", index),
        }
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Array4<f32>) -> anyhow::Result<Outputs> {
        let input = TValue::from_const(Arc::new(Tensor::from(input)));
        let outputs = self.0.run(TVec::from_iter([input]))?;
        let inner = outputs
            .iter()
            .map(|value| Ok(value.to_array_view::<f32>()?.to_owned()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs { inner })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug, Default)]
pub struct Outputs {
    inner: Vec<ArrayD<f32>>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = ArrayD<f32>;

    fn index(&self, index: usize) -> &ArrayD<f32> {
        &self.inner[index]
    }
}

impl FromIterator<ArrayD<f32>> for Outputs {
    fn from_iter<T: IntoIterator<Item = ArrayD<f32>>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let black = Rgb([0, 0, 0]);
        let white = Rgb([255, 255, 255]);

        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(black), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(white), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(black), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(white), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn planar_tensor_layout() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([255, 0, 255]));
        let mapper = ColorMapper::linear(0.0..=1.0);

        let nchw = image_to_tensor(&image, &mapper);
        assert_eq!(nchw.shape(), &[1, 3, 1, 2]);
        assert_eq!(nchw[[0, 0, 0, 1]], 1.0);
        assert_eq!(nchw[[0, 1, 0, 1]], 0.0);
        assert_eq!(nchw[[0, 2, 0, 1]], 1.0);
        assert_eq!(nchw[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn rejects_non_onnx_paths() {
        let err = NeuralNetwork::from_path("model.tflite").err().unwrap();
        assert!(err.to_string().contains("`.onnx` extension"));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let err = NeuralNetwork::from_path("does/not/exist.onnx").err().unwrap();
        assert!(err.to_string().contains("does/not/exist.onnx"));
    }

    #[test]
    fn garbage_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.onnx");
        std::fs::write(&path, b"not an onnx file").unwrap();
        assert!(NeuralNetwork::from_path(&path).unwrap().load().is_err());
    }
}
