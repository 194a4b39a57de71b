//! Patient record types for diabetes risk prediction.
//!
//! Field names follow the training dataset columns (`HbA1c_level`,
//! `blood_glucose_level`, ...) so JSON and form input can use them verbatim.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Input field names, in the column order the model was trained on.
pub const FIELD_NAMES: [&str; 8] = [
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "smoking_history",
    "bmi",
    "HbA1c_level",
    "blood_glucose_level",
];

/// Errors raised while validating raw patient input.
///
/// Every variant names the offending field so callers can show it next to
/// the input that caused it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Unknown {field} value {value:?}")]
    UnknownCategory { field: &'static str, value: String },

    #[error("{field} {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl ValidationError {
    /// The field this error is attributed to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field }
            | Self::InvalidValue { field, .. }
            | Self::UnknownCategory { field, .. }
            | Self::OutOfRange { field, .. } => field,
        }
    }
}

/// Clinical attributes submitted for one risk assessment.
///
/// Categorical values are kept as submitted; they are checked against the
/// trained vocabularies by the feature encoder, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub gender: String,

    /// Age in years
    pub age: f64,

    /// 0 = no, 1 = yes
    pub hypertension: u8,

    /// 0 = no, 1 = yes
    pub heart_disease: u8,

    pub smoking_history: String,

    /// Body mass index in kg/m²
    pub bmi: f64,

    /// Glycated haemoglobin in %
    #[serde(rename = "HbA1c_level")]
    pub hba1c_level: f64,

    /// Blood glucose in mg/dL
    pub blood_glucose_level: f64,
}

impl PatientRecord {
    /// Build a record from submitted form fields.
    ///
    /// Values are trimmed before parsing. Categorical values are taken as-is.
    ///
    /// # Errors
    /// `MissingField` if a key is absent, `InvalidValue` if a numeric field
    /// does not parse.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        Ok(Self {
            gender: required(form, "gender")?.to_string(),
            age: parse_field(form, "age")?,
            hypertension: parse_field(form, "hypertension")?,
            heart_disease: parse_field(form, "heart_disease")?,
            smoking_history: required(form, "smoking_history")?.to_string(),
            bmi: parse_field(form, "bmi")?,
            hba1c_level: parse_field(form, "HbA1c_level")?,
            blood_glucose_level: parse_field(form, "blood_glucose_level")?,
        })
    }

    /// Check numeric fields against their clinical domains.
    ///
    /// # Errors
    /// Returns the first field that is non-finite or outside its range.
    pub fn validate_ranges(&self) -> Result<(), ValidationError> {
        check_range("age", self.age, 0.0, 120.0)?;
        check_flag("hypertension", self.hypertension)?;
        check_flag("heart_disease", self.heart_disease)?;
        check_range("bmi", self.bmi, 0.0, 100.0)?;
        check_range("HbA1c_level", self.hba1c_level, 0.0, 20.0)?;
        check_range("blood_glucose_level", self.blood_glucose_level, 0.0, 1000.0)?;
        Ok(())
    }
}

fn required<'a>(
    form: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    form.get(field)
        .map(|v| v.trim())
        .ok_or(ValidationError::MissingField { field })
}

fn parse_field<T: FromStr>(
    form: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, ValidationError> {
    let raw = required(form, field)?;
    raw.parse().map_err(|_| ValidationError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}

/// Lower bound exclusive, upper bound inclusive.
fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "must be a finite number".to_string(),
        });
    }
    if value <= min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            reason: format!("{value} out of range ({min}, {max}]"),
        });
    }
    Ok(())
}

fn check_flag(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if value > 1 {
        return Err(ValidationError::OutOfRange {
            field,
            reason: format!("{value} must be 0 or 1"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_form() -> HashMap<String, String> {
        form(&[
            ("gender", "Female"),
            ("age", "45"),
            ("hypertension", "0"),
            ("heart_disease", "0"),
            ("smoking_history", "never"),
            ("bmi", "27.3"),
            ("HbA1c_level", "6.1"),
            ("blood_glucose_level", " 140 "),
        ])
    }

    #[test]
    fn test_from_form_parses_all_fields() {
        let record = PatientRecord::from_form(&full_form()).expect("Should parse");
        assert_eq!(record.gender, "Female");
        assert!((record.age - 45.0).abs() < f64::EPSILON);
        assert_eq!(record.hypertension, 0);
        assert_eq!(record.smoking_history, "never");
        assert!((record.blood_glucose_level - 140.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_form_missing_field() {
        let mut f = full_form();
        f.remove("bmi");
        let err = PatientRecord::from_form(&f).expect_err("Should fail");
        assert_eq!(err, ValidationError::MissingField { field: "bmi" });
    }

    #[test]
    fn test_from_form_invalid_number() {
        let mut f = full_form();
        f.insert("age".into(), "forty".into());
        let err = PatientRecord::from_form(&f).expect_err("Should fail");
        assert_eq!(err.field(), "age");
        assert!(matches!(err, ValidationError::InvalidValue { .. }));

        // Flags are parsed as u8, so negatives are rejected at parse time
        let mut f = full_form();
        f.insert("hypertension".into(), "-1".into());
        assert!(PatientRecord::from_form(&f).is_err());
    }

    #[test]
    fn test_json_uses_dataset_column_names() {
        let json = r#"{"gender":"Male","age":61,"hypertension":1,"heart_disease":0,
            "smoking_history":"former","bmi":31.2,"HbA1c_level":7.4,"blood_glucose_level":220}"#;
        let record: PatientRecord = serde_json::from_str(json).expect("Should deserialize");
        assert!((record.hba1c_level - 7.4).abs() < f64::EPSILON);

        let back = serde_json::to_value(&record).expect("Should serialize");
        assert!(back.get("HbA1c_level").is_some());
    }

    #[test]
    fn test_validate_ranges() {
        let valid = PatientRecord::from_form(&full_form()).expect("Should parse");
        assert!(valid.validate_ranges().is_ok());

        let zero_age = PatientRecord { age: 0.0, ..valid.clone() };
        assert_eq!(zero_age.validate_ranges().unwrap_err().field(), "age");

        let nan_bmi = PatientRecord { bmi: f64::NAN, ..valid.clone() };
        assert_eq!(nan_bmi.validate_ranges().unwrap_err().field(), "bmi");

        let bad_flag = PatientRecord { heart_disease: 2, ..valid };
        assert_eq!(bad_flag.validate_ranges().unwrap_err().field(), "heart_disease");
    }
}
