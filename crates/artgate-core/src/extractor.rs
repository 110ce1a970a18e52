//! Feature extraction via ONNX Runtime.
//!
//! Runs a pretrained MobileNet-family embedding model over a fixed
//! 224x224 RGB frame and returns the pooled feature vector. The model
//! is a black box: the embedding length is whatever it yields, and
//! length agreement with the reference is enforced at compare time.

use crate::types::Embedding;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

/// Side length of the extractor input, in pixels.
pub const EXTRACTOR_INPUT_SIZE: usize = 224;
/// Symmetric MobileNet normalization: (pixel - 127.5) / 127.5.
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5;
const MODEL_FILE: &str = "mobilenet_v2_embedding.onnx";
const MODEL_VERSION: &str = "mobilenet_v2_224";

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("model file not found: {0} — export the embedding model and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer has wrong size: expected {expected} bytes, got {actual}")]
    BadFrameSize { expected: usize, actual: usize },
    #[error("extractor produced an empty embedding")]
    EmptyEmbedding,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX-backed embedding extractor.
pub struct FeatureExtractor {
    session: Session,
}

impl FeatureExtractor {
    /// Load the embedding model from the given path. Failure here is
    /// fatal for whichever role requested it: neither enrollment nor
    /// verification can proceed without the extractor.
    pub fn load(model_path: &str) -> Result<Self, ExtractorError> {
        if !Path::new(model_path).exists() {
            return Err(ExtractorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session })
    }

    /// Conventional model file path under a model directory.
    pub fn model_file(model_dir: &Path) -> String {
        model_dir.join(MODEL_FILE).to_string_lossy().into_owned()
    }

    /// Extract an embedding from a 224x224 RGB frame (packed RGB24,
    /// `224 * 224 * 3` bytes).
    pub fn extract(&mut self, rgb: &[u8]) -> Result<Embedding, ExtractorError> {
        let input = Self::preprocess(rgb)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractorError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let values: Vec<f32> = raw_data.to_vec();

        if values.is_empty() {
            return Err(ExtractorError::EmptyEmbedding);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractorError::InferenceFailed(
                "embedding contains non-finite values".into(),
            ));
        }

        Ok(Embedding {
            values,
            model_version: Some(MODEL_VERSION.to_string()),
        })
    }

    /// Preprocess a packed RGB24 buffer into a normalized NCHW tensor.
    fn preprocess(rgb: &[u8]) -> Result<Array4<f32>, ExtractorError> {
        let size = EXTRACTOR_INPUT_SIZE;
        let expected = size * size * 3;
        if rgb.len() != expected {
            return Err(ExtractorError::BadFrameSize {
                expected,
                actual: rgb.len(),
            });
        }

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let base = (y * size + x) * 3;
                for c in 0..3 {
                    let pixel = rgb[base + c] as f32;
                    tensor[[0, c, y, x]] = (pixel - PIXEL_MEAN) / PIXEL_STD;
                }
            }
        }
        Ok(tensor)
    }
}
