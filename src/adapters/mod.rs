//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `ann`: frozen dense network and preprocessing artifacts (serde_json, sha2)
//! - `sqlite`: SQLite history store
//! - `memory`: in-process history store
//! - `auth`: static identity gateway for the CLI
//! - `sanitize`: PII filtering for logs

pub mod ann;
pub mod auth;
pub mod memory;
pub mod sanitize;
pub mod sqlite;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;
