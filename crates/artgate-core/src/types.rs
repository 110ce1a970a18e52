use serde::{Deserialize, Serialize};

/// Default cosine similarity threshold for accepting a scan.
///
/// Tunable via `ARTGATE_SIMILARITY_THRESHOLD`; never derived at runtime.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.70;

/// Feature vector produced by the embedding model.
///
/// Length is model-defined and fixed for a given model; enrollment and
/// verification must use the same model for lengths to agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "mobilenet_v2_224").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Number of features in this embedding.
    pub fn dims(&self) -> usize {
        self.values.len()
    }

    /// True if the vector can never match anything: empty, non-finite,
    /// or zero magnitude.
    pub fn is_degenerate(&self) -> bool {
        self.values.is_empty()
            || self.values.iter().any(|v| !v.is_finite())
            || self.values.iter().all(|&v| v == 0.0)
    }

    /// Cosine similarity against another embedding. See [`cosine_similarity`].
    pub fn similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.values, &other.values)
    }
}

/// Cosine similarity of two vectors: dot(a,b) / (‖a‖·‖b‖), in [-1, 1].
///
/// Degrades instead of failing: empty inputs, mismatched lengths, and
/// zero-magnitude vectors all return the sentinel 0.0 ("no match") so
/// callers never divide by zero or crash mid-scan.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        tracing::warn!(a_len = a.len(), b_len = b.len(), "invalid vectors for similarity");
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        tracing::warn!("zero magnitude vector in similarity");
        0.0
    }
}

/// Outcome of the decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected,
}

/// Threshold decision: strictly greater than the threshold accepts.
///
/// Boundary equality rejects. Assumes a well-formed float; NaN is
/// filtered upstream in the verification pipeline.
pub fn decide(similarity: f32, threshold: f32) -> Decision {
    if similarity > threshold {
        Decision::Accepted
    } else {
        Decision::Rejected
    }
}

/// One verification attempt. Transient: created per scan, never persisted.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    /// Cosine similarity against the reference, in [-1, 1].
    pub similarity: f32,
    pub decision: Decision,
    /// Short status string surfaced to the user.
    pub message: String,
}

impl VerificationAttempt {
    /// Apply the decision policy and build the user-facing message.
    ///
    /// Rejections report the percent match to one decimal so retries
    /// are informed.
    pub fn from_similarity(similarity: f32, threshold: f32) -> Self {
        let decision = decide(similarity, threshold);
        let message = match decision {
            Decision::Accepted => "Art print verified".to_string(),
            Decision::Rejected => format!(
                "Not recognized ({:.1}% match). Try again.",
                similarity * 100.0
            ),
        };
        Self {
            similarity,
            decision,
            message,
        }
    }

    pub fn accepted(&self) -> bool {
        self.decision == Decision::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.3, -1.2, 4.5, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let v = vec![1.0, -2.0, 0.5];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&v, &neg) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-4.0, 0.5, 2.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_empty_returns_sentinel() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths_returns_sentinel() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_zero_magnitude_returns_sentinel() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_decide_strictly_above_accepts() {
        assert_eq!(decide(0.705, 0.70), Decision::Accepted);
    }

    #[test]
    fn test_decide_below_rejects() {
        assert_eq!(decide(0.699, 0.70), Decision::Rejected);
    }

    #[test]
    fn test_decide_boundary_rejects() {
        assert_eq!(decide(0.70, 0.70), Decision::Rejected);
    }

    #[test]
    fn test_attempt_rejection_message_reports_percent() {
        let attempt = VerificationAttempt::from_similarity(0.699, 0.70);
        assert_eq!(attempt.decision, Decision::Rejected);
        assert!(
            attempt.message.contains("69.9% match"),
            "message was: {}",
            attempt.message
        );
    }

    #[test]
    fn test_attempt_acceptance_message() {
        let attempt = VerificationAttempt::from_similarity(0.705, 0.70);
        assert!(attempt.accepted());
        assert_eq!(attempt.message, "Art print verified");
    }

    #[test]
    fn test_embedding_degenerate() {
        let zero = Embedding { values: vec![0.0; 8], model_version: None };
        assert!(zero.is_degenerate());
        let empty = Embedding { values: vec![], model_version: None };
        assert!(empty.is_degenerate());
        let nan = Embedding { values: vec![1.0, f32::NAN], model_version: None };
        assert!(nan.is_degenerate());
        let ok = Embedding { values: vec![0.0, 0.1], model_version: None };
        assert!(!ok.is_degenerate());
    }
}
