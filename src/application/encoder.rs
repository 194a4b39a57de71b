//! Feature encoder: validated patient record to standardized model input.

use crate::domain::{
    EncodedFeatureVector, FeatureSchema, PatientRecord, ValidationError, FEATURE_COUNT,
};

/// Maps patient records onto the frozen training feature space.
///
/// Holds only read-only preprocessing parameters, so one encoder can be
/// shared by every request handler.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
}

impl FeatureEncoder {
    /// Create an encoder over a validated schema.
    ///
    /// # Errors
    /// Returns a description of the problem if the schema is inconsistent.
    pub fn new(schema: FeatureSchema) -> Result<Self, String> {
        schema.validate()?;
        Ok(Self { schema })
    }

    /// Width of every vector this encoder produces.
    #[must_use]
    pub fn dimension(&self) -> usize {
        FEATURE_COUNT
    }

    /// Validate a record without encoding it.
    ///
    /// # Errors
    /// Returns the first categorical or numeric field that fails.
    pub fn validate(&self, record: &PatientRecord) -> Result<(), ValidationError> {
        self.category_codes(record)?;
        record.validate_ranges()
    }

    /// Encode a record.
    ///
    /// Categories become their label-encoder codes, then every column is
    /// standardized with the frozen scaler. Column order follows
    /// `FIELD_NAMES`.
    ///
    /// # Errors
    /// Returns `ValidationError` if any field is outside its vocabulary or
    /// range; no vector is produced in that case.
    pub fn encode(&self, record: &PatientRecord) -> Result<EncodedFeatureVector, ValidationError> {
        let (gender, smoking) = self.category_codes(record)?;
        record.validate_ranges()?;

        let raw = [
            gender as f64,
            record.age,
            f64::from(record.hypertension),
            f64::from(record.heart_disease),
            smoking as f64,
            record.bmi,
            record.hba1c_level,
            record.blood_glucose_level,
        ];

        let scaled: Vec<f64> = raw
            .iter()
            .zip(&self.schema.scaler_mean)
            .zip(&self.schema.scaler_scale)
            .map(|((x, mean), scale)| (x - mean) / scale)
            .collect();

        // Inputs are range-checked and the scale is positive, so this only
        // fails on a corrupted schema.
        EncodedFeatureVector::from_values(scaled).ok_or_else(|| ValidationError::OutOfRange {
            field: "features",
            reason: "encoded to a non-finite value".to_string(),
        })
    }

    fn category_codes(&self, record: &PatientRecord) -> Result<(usize, usize), ValidationError> {
        let gender = self.schema.gender_code(&record.gender).ok_or_else(|| {
            ValidationError::UnknownCategory {
                field: "gender",
                value: record.gender.clone(),
            }
        })?;
        let smoking = self
            .schema
            .smoking_code(&record.smoking_history)
            .ok_or_else(|| ValidationError::UnknownCategory {
                field: "smoking_history",
                value: record.smoking_history.clone(),
            })?;
        Ok((gender, smoking))
    }
}
