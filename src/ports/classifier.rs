//! Classifier port: Trait for the frozen scoring model.
//!
//! This trait abstracts the model implementation (the dense network loaded
//! from `model.json`) from the risk predictor, so tests can substitute a
//! model with known outputs.

use std::path::PathBuf;

/// Errors from loading or running the frozen model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Artifact not found: {0:?}")]
    ArtifactMissing(PathBuf),

    #[error("Artifact unreadable: {0}")]
    ArtifactUnreadable(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Artifact digest mismatch for {0}")]
    DigestMismatch(String),

    #[error("Input dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite output")]
    NonFiniteOutput,

    #[error("Model probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),
}

/// Trait for a frozen binary classifier.
///
/// Implementations are immutable after loading and safe to share across
/// request handlers without locking.
pub trait Classifier: Send + Sync {
    /// Number of inputs the model expects.
    fn input_dim(&self) -> usize;

    /// Run a forward pass and return the positive-class probability.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` if `features` has the wrong
    /// width, or `ModelError::NonFiniteOutput` if the pass diverges.
    fn forward(&self, features: &[f64]) -> Result<f64, ModelError>;
}
