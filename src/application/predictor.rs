//! Risk predictor: frozen classifier plus decision threshold.

use std::sync::Arc;

use crate::domain::{DecisionThreshold, EncodedFeatureVector, PredictionResult};
use crate::ports::{Classifier, ModelError};

pub struct RiskPredictor<C: Classifier> {
    classifier: Arc<C>,
    threshold: DecisionThreshold,
}

impl<C: Classifier> RiskPredictor<C> {
    #[must_use]
    pub fn new(classifier: Arc<C>, threshold: DecisionThreshold) -> Self {
        Self {
            classifier,
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> DecisionThreshold {
        self.threshold
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.classifier.input_dim()
    }

    /// Score an encoded vector.
    ///
    /// # Errors
    /// Returns `ModelError` if the classifier rejects the vector or yields
    /// something that is not a probability.
    pub fn predict(&self, vector: &EncodedFeatureVector) -> Result<PredictionResult, ModelError> {
        let probability = self.classifier.forward(vector.as_slice())?;

        if !probability.is_finite() {
            return Err(ModelError::NonFiniteOutput);
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::ProbabilityOutOfRange(probability));
        }

        Ok(PredictionResult::from_probability(probability, self.threshold))
    }
}
