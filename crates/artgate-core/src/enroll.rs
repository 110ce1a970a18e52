//! Enrollment workflow: load model, extract, persist.
//!
//! Linear with no branching back: model load failure is fatal, image
//! acquisition and extraction errors are reported and the human retries,
//! persistence overwrites any prior record and is terminal.

use crate::extractor::{ExtractorError, FeatureExtractor};
use crate::reference::{ImageSize, ReferenceError, ReferenceRecord};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("extraction failed: {0}")]
    Extractor(#[from] ExtractorError),
    /// The model produced an all-zero vector; such a reference could
    /// never match anything.
    #[error("extracted embedding is degenerate — try a clearer, well-lit image")]
    DegenerateEmbedding,
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// Drives the enrollment workflow. Constructing one is the LoadModel
/// step; each `enroll` call is one ExtractVector attempt.
pub struct Enroller {
    extractor: FeatureExtractor,
}

impl Enroller {
    pub fn new(model_path: &str) -> Result<Self, ExtractorError> {
        Ok(Self {
            extractor: FeatureExtractor::load(model_path)?,
        })
    }

    /// Extract a reference embedding from a 224x224 RGB image and build
    /// a validated record. Does not persist; see [`enroll_to`](Self::enroll_to).
    pub fn enroll(
        &mut self,
        rgb: &[u8],
        note: Option<String>,
        image_size: Option<ImageSize>,
    ) -> Result<ReferenceRecord, EnrollError> {
        let embedding = self.extractor.extract(rgb)?;
        if embedding.is_degenerate() {
            return Err(EnrollError::DegenerateEmbedding);
        }
        tracing::info!(dims = embedding.dims(), "reference embedding extracted");
        Ok(ReferenceRecord::new(embedding.values, note, image_size)?)
    }

    /// Full workflow tail: extract and persist, overwriting any prior
    /// record at `path`.
    pub fn enroll_to(
        &mut self,
        path: &Path,
        rgb: &[u8],
        note: Option<String>,
        image_size: Option<ImageSize>,
    ) -> Result<ReferenceRecord, EnrollError> {
        let record = self.enroll(rgb, note, image_size)?;
        record.save(path)?;
        Ok(record)
    }
}
