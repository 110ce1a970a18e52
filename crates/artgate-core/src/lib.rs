//! artgate-core — Similarity-gated verification of art prints.
//!
//! One reference image is enrolled as a feature vector from a pretrained
//! embedding model; live captures are compared against it by cosine
//! similarity and gated on a fixed threshold.

pub mod enroll;
pub mod extractor;
pub mod reference;
pub mod session;
pub mod types;
pub mod verify;

pub use enroll::{EnrollError, Enroller};
pub use extractor::{ExtractorError, FeatureExtractor, EXTRACTOR_INPUT_SIZE};
pub use reference::{ImageSize, ReferenceError, ReferenceRecord};
pub use session::{GateSession, GateState, ScanStart};
pub use types::{
    cosine_similarity, decide, Decision, Embedding, VerificationAttempt,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use verify::{compare_embeddings, verify_capture, VerifyError};

use std::path::PathBuf;

/// Data directory for artgate (`$XDG_DATA_HOME/artgate` or `~/.local/share/artgate`).
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("artgate")
}

/// Default directory containing the ONNX embedding model.
pub fn default_model_dir() -> PathBuf {
    data_dir().join("models")
}

/// Default location of the enrolled reference record.
pub fn default_reference_path() -> PathBuf {
    data_dir().join("reference-embedding.json")
}
