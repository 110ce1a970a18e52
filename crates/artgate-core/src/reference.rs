//! Enrolled reference record — the one persisted artifact.
//!
//! JSON wire format shared between the enrollment and verifier roles:
//! `{ "embedding": [..], "generated": "<ISO-8601>", "note"?, "imageSize"? }`.
//! The two roles need not run in the same process or at the same time.

use crate::types::Embedding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("reference record not found: {0} — run `artgate enroll` first")]
    Missing(String),
    #[error("invalid reference record: {0} — re-run enrollment")]
    Invalid(String),
    #[error("reference I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Pixel dimensions of the source image, kept as enrollment metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// The enrollment record: reference embedding plus provenance metadata.
///
/// Written once by enrollment, loaded read-only by the verifier at
/// startup. Re-running enrollment overwrites the prior record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub embedding: Vec<f32>,
    /// When the record was generated.
    pub generated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(
        rename = "imageSize",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_size: Option<ImageSize>,
}

impl ReferenceRecord {
    /// Build a record from a freshly extracted embedding, validating it.
    pub fn new(
        embedding: Vec<f32>,
        note: Option<String>,
        image_size: Option<ImageSize>,
    ) -> Result<Self, ReferenceError> {
        let record = Self {
            embedding,
            generated: Utc::now(),
            note,
            image_size,
        };
        record.validate()?;
        Ok(record)
    }

    /// Number of features in the reference embedding.
    pub fn dims(&self) -> usize {
        self.embedding.len()
    }

    /// Reject records that can never produce a match.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.embedding.is_empty() {
            return Err(ReferenceError::Invalid("embedding is empty".into()));
        }
        if self.embedding.iter().any(|v| !v.is_finite()) {
            return Err(ReferenceError::Invalid(
                "embedding contains non-finite values".into(),
            ));
        }
        if self.embedding.iter().all(|&v| v == 0.0) {
            return Err(ReferenceError::Invalid(
                "embedding has zero magnitude".into(),
            ));
        }
        Ok(())
    }

    /// The reference embedding as an [`Embedding`] for comparison.
    pub fn to_embedding(&self) -> Embedding {
        Embedding {
            values: self.embedding.clone(),
            model_version: None,
        }
    }

    /// Load and validate a record. Malformed JSON is rejected at this
    /// boundary; nothing downstream trusts the shape at use time.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        if !path.exists() {
            return Err(ReferenceError::Missing(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&raw)
            .map_err(|e| ReferenceError::Invalid(e.to_string()))?;
        record.validate()?;
        tracing::info!(
            path = %path.display(),
            dims = record.dims(),
            generated = %record.generated,
            "reference record loaded"
        );
        Ok(record)
    }

    /// Persist the record, overwriting any prior one.
    ///
    /// Writes to a temporary sibling then renames, so a crash mid-write
    /// never leaves a truncated record behind.
    pub fn save(&self, path: &Path) -> Result<(), ReferenceError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReferenceError::Invalid(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), dims = self.dims(), "reference record written");
        Ok(())
    }
}
