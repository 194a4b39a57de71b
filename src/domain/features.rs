//! Frozen preprocessing parameters and the encoded feature vector.
//!
//! `FeatureSchema` is produced once by the training pipeline and written to
//! `preprocessing.json`. It holds the label-encoder classes for the two
//! categorical inputs and the standard scaler fitted over all eight columns.

use serde::{Deserialize, Serialize};

use crate::domain::patient::FIELD_NAMES;

/// Number of model inputs.
pub const FEATURE_COUNT: usize = FIELD_NAMES.len();

/// Preprocessing parameters exported by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,

    /// Column order; must equal [`FIELD_NAMES`].
    pub feature_names: Vec<String>,

    /// Label-encoder classes for `gender`, sorted.
    pub gender_classes: Vec<String>,

    /// Label-encoder classes for `smoking_history`, sorted.
    pub smoking_classes: Vec<String>,

    /// Per-column mean of the standard scaler
    pub scaler_mean: Vec<f64>,

    /// Per-column standard deviation of the standard scaler
    pub scaler_scale: Vec<f64>,
}

impl FeatureSchema {
    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names.iter().map(String::as_str).ne(FIELD_NAMES) {
            return Err(format!(
                "feature_names {:?} do not match expected order {:?}",
                self.feature_names, FIELD_NAMES
            ));
        }
        if self.scaler_mean.len() != FEATURE_COUNT || self.scaler_scale.len() != FEATURE_COUNT {
            return Err(format!(
                "scaler parameters must have {FEATURE_COUNT} entries (mean={}, scale={})",
                self.scaler_mean.len(),
                self.scaler_scale.len()
            ));
        }
        if self.scaler_mean.iter().any(|m| !m.is_finite()) {
            return Err("scaler_mean contains non-finite values".into());
        }
        if self.scaler_scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("scaler_scale must be finite and positive".into());
        }
        check_classes("gender_classes", &self.gender_classes)?;
        check_classes("smoking_classes", &self.smoking_classes)?;
        Ok(())
    }

    /// Trained code for a gender value.
    #[must_use]
    pub fn gender_code(&self, value: &str) -> Option<usize> {
        self.gender_classes.iter().position(|c| c == value)
    }

    /// Trained code for a smoking-history value.
    #[must_use]
    pub fn smoking_code(&self, value: &str) -> Option<usize> {
        self.smoking_classes.iter().position(|c| c == value)
    }
}

fn check_classes(name: &str, classes: &[String]) -> Result<(), String> {
    if classes.is_empty() {
        return Err(format!("{name} must not be empty"));
    }
    // Label encoders emit sorted, unique classes; codes depend on it.
    if classes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(format!("{name} must be sorted and unique"));
    }
    Ok(())
}

/// Standardized model input.
///
/// Always [`FEATURE_COUNT`] wide when produced by the encoder, and every
/// element is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector(Vec<f64>);

impl EncodedFeatureVector {
    /// Wrap raw values. Returns `None` if any value is non-finite.
    #[must_use]
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        values.iter().all(|v| v.is_finite()).then_some(Self(values))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
