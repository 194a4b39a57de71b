//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model, storage, identity).

mod auth;
mod classifier;
mod history_store;

pub use auth::AuthGateway;
pub use classifier::{Classifier, ModelError};
pub use history_store::{AppendOutcome, HistoryStore, DEFAULT_HISTORY_CAPACITY};
