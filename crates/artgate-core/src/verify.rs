//! The verification pipeline: extract, validate, compare, decide.

use crate::extractor::{ExtractorError, FeatureExtractor};
use crate::reference::ReferenceRecord;
use crate::types::{cosine_similarity, Embedding, VerificationAttempt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    /// Recoverable: retry with a fresh capture.
    #[error("feature extraction failed: {0}")]
    Extraction(#[from] ExtractorError),
    /// Fatal for the session: enrollment and verification used models
    /// with different embedding lengths. Almost certainly a deployment
    /// mismatch; requires re-enrollment, never a silent no-match.
    #[error("reference incompatible: reference has {expected} features, capture produced {actual}")]
    IncompatibleReference { expected: usize, actual: usize },
    /// Recoverable: the extractor output produced a non-finite score.
    #[error("similarity computation produced a non-finite value")]
    InvalidSimilarity,
}

/// Compare a captured embedding against the reference and decide.
///
/// Validation runs before any similarity math: an empty capture is an
/// extraction failure, a length mismatch is a hard error with no
/// similarity computed.
pub fn compare_embeddings(
    captured: &Embedding,
    reference: &ReferenceRecord,
    threshold: f32,
) -> Result<VerificationAttempt, VerifyError> {
    if captured.values.is_empty() {
        return Err(VerifyError::Extraction(ExtractorError::EmptyEmbedding));
    }
    if captured.dims() != reference.dims() {
        tracing::error!(
            captured = captured.dims(),
            reference = reference.dims(),
            "embedding size mismatch"
        );
        return Err(VerifyError::IncompatibleReference {
            expected: reference.dims(),
            actual: captured.dims(),
        });
    }

    let similarity = cosine_similarity(&captured.values, &reference.embedding);
    if !similarity.is_finite() {
        return Err(VerifyError::InvalidSimilarity);
    }

    tracing::debug!(similarity, threshold, "scan compared against reference");
    Ok(VerificationAttempt::from_similarity(similarity, threshold))
}

/// Run one full verification attempt over a captured 224x224 RGB frame.
pub fn verify_capture(
    extractor: &mut FeatureExtractor,
    reference: &ReferenceRecord,
    rgb: &[u8],
    threshold: f32,
) -> Result<VerificationAttempt, VerifyError> {
    let captured = extractor.extract(rgb)?;
    compare_embeddings(&captured, reference, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decision;

    fn reference_of(values: Vec<f32>) -> ReferenceRecord {
        ReferenceRecord::new(values, None, None).unwrap()
    }

    fn embedding_of(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    #[test]
    fn test_length_mismatch_is_hard_error() {
        // Deployment mismatch scenario: 1024-dim reference, 1000-dim capture.
        let reference = reference_of(vec![0.1; 1024]);
        let captured = embedding_of(vec![0.1; 1000]);

        let err = compare_embeddings(&captured, &reference, 0.70).unwrap_err();
        match err {
            VerifyError::IncompatibleReference { expected, actual } => {
                assert_eq!(expected, 1024);
                assert_eq!(actual, 1000);
            }
            other => panic!("expected IncompatibleReference, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_capture_is_extraction_failure() {
        let reference = reference_of(vec![0.1; 8]);
        let captured = embedding_of(vec![]);
        let err = compare_embeddings(&captured, &reference, 0.70).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Extraction(ExtractorError::EmptyEmbedding)
        ));
    }

    #[test]
    fn test_identical_representation_accepts() {
        // Round trip: verifying the exact enrolled representation must
        // clear the threshold.
        let values: Vec<f32> = (0..512).map(|i| (i as f32 * 0.37).sin()).collect();
        let reference = reference_of(values.clone());
        let captured = embedding_of(values);

        let attempt = compare_embeddings(&captured, &reference, 0.70).unwrap();
        assert_eq!(attempt.decision, Decision::Accepted);
        assert!((attempt.similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_near_miss_rejects_with_percent_message() {
        // Orthogonal-ish vectors built to land at a known similarity.
        let reference = reference_of(vec![1.0, 0.0]);
        // cos(theta) = 0.699 when x = 0.699, y = sqrt(1 - 0.699^2)
        let y = (1.0f32 - 0.699 * 0.699).sqrt();
        let captured = embedding_of(vec![0.699, y]);

        let attempt = compare_embeddings(&captured, &reference, 0.70).unwrap();
        assert_eq!(attempt.decision, Decision::Rejected);
        assert!(
            attempt.message.contains("69.9% match"),
            "message was: {}",
            attempt.message
        );
    }

    #[test]
    fn test_just_above_threshold_accepts() {
        let reference = reference_of(vec![1.0, 0.0]);
        let y = (1.0f32 - 0.705 * 0.705).sqrt();
        let captured = embedding_of(vec![0.705, y]);

        let attempt = compare_embeddings(&captured, &reference, 0.70).unwrap();
        assert_eq!(attempt.decision, Decision::Accepted);
    }

    #[test]
    fn test_non_finite_similarity_is_invalid() {
        // Huge magnitudes overflow the dot product to inf; inf/inf is
        // NaN and must be caught before the decision policy runs.
        let reference = reference_of(vec![f32::MAX; 4]);
        let captured = embedding_of(vec![f32::MAX; 4]);

        let err = compare_embeddings(&captured, &reference, 0.70).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSimilarity));
    }

    #[test]
    fn test_zero_capture_degrades_to_rejection() {
        // Zero-magnitude capture: sentinel 0 similarity, rejected, no panic.
        let reference = reference_of(vec![0.5; 4]);
        let captured = embedding_of(vec![0.0; 4]);

        let attempt = compare_embeddings(&captured, &reference, 0.70).unwrap();
        assert_eq!(attempt.similarity, 0.0);
        assert_eq!(attempt.decision, Decision::Rejected);
    }
}
