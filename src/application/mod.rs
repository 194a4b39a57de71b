//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the scoring request and history use cases.

mod boot;
mod deadline;
pub(crate) mod encoder;
mod predictor;
mod scoring;

pub use boot::{assemble, boot, DefaultScoringService};
pub use deadline::Deadline;
pub use encoder::FeatureEncoder;
pub use predictor::RiskPredictor;
pub use scoring::{
    ErrorBody, RequestStage, ScoreResponse, ScoringPolicy, ScoringService, GENERIC_ERROR_MESSAGE,
};
