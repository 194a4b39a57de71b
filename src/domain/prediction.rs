//! Prediction result types.
//!
//! Represents the output of the frozen diabetes classifier after the
//! probability has been turned into a risk label.

use serde::{Deserialize, Serialize};

/// Default decision threshold on the predicted probability.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Binary risk classification for diabetes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    High,
}

impl RiskLabel {
    /// Human-readable headline shown with a result.
    #[must_use]
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Low => "Low Diabetes Risk",
            Self::High => "High Diabetes Risk Detected",
        }
    }

    /// Machine-readable result category.
    #[must_use]
    pub fn result_type(&self) -> &'static str {
        match self {
            Self::Low => "not_diabetic",
            Self::High => "diabetic",
        }
    }

    /// Parse the stored form produced by `Display`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Self::Low),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Probability cut-off separating `Low` from `High`.
///
/// The boundary is inclusive: a probability equal to the threshold is `High`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThreshold(f64);

impl DecisionThreshold {
    /// Create a threshold.
    ///
    /// # Errors
    /// Returns error if the value is not within [0, 1].
    pub fn new(value: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("threshold {value} must be within [0, 1]"));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn label_for(&self, probability: f64) -> RiskLabel {
        if probability >= self.0 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        }
    }
}

impl Default for DecisionThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

/// Result of one model prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted probability of diabetes (0.0 to 1.0)
    pub probability: f64,

    pub risk_label: RiskLabel,
}

impl PredictionResult {
    /// Label a probability with the given threshold.
    #[must_use]
    pub fn from_probability(probability: f64, threshold: DecisionThreshold) -> Self {
        Self {
            probability,
            risk_label: threshold.label_for(probability),
        }
    }

    /// Probability as a percentage rounded to one decimal place.
    #[must_use]
    pub fn percent(&self) -> f64 {
        (self.probability * 1000.0).round() / 10.0
    }
}
