//! # MediPulse
//!
//! Diabetes risk scoring with a frozen neural network.
//!
//! This crate provides:
//! - Validation and encoding of patient attributes into the model's feature space
//! - Inference with a frozen dense network loaded once at startup
//! - A bounded, per-user history of results (oldest evicted first)
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (PatientRecord, PredictionResult, HistoryEntry)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (dense network, SQLite, in-memory)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Layered configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ScoreResponse, ScoringService};
pub use domain::{PatientRecord, PredictionResult, RiskLabel};

/// Result type for MediPulse operations
pub type Result<T> = std::result::Result<T, MedipulseError>;

/// Main error type for MediPulse
#[derive(Debug, thiserror::Error)]
pub enum MedipulseError {
    #[error("Invalid patient data: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Request exceeded its {budget_ms} ms budget before {stage}")]
    Timeout { stage: &'static str, budget_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
