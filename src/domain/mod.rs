//! Domain layer: Core business types and logic.
//!
//! Plain data types with validation. Nothing here performs I/O.

mod features;
mod history;
mod patient;
mod prediction;

pub use features::{EncodedFeatureVector, FeatureSchema, FEATURE_COUNT};
pub use history::{HistoryEntry, Identity, UserId, GUEST};
pub use patient::{PatientRecord, ValidationError, FIELD_NAMES};
pub use prediction::{DecisionThreshold, PredictionResult, RiskLabel, DEFAULT_THRESHOLD};

#[cfg(test)]
pub(crate) use features::tests::sample_schema;
