//! Auth gateway port: where the caller's identity comes from.
//!
//! Credentials, sessions and account seeding live outside this crate; the
//! scoring service only asks who the current caller is.

use crate::domain::Identity;

pub trait AuthGateway: Send + Sync {
    /// The identity of the current caller, or `Identity::Guest`.
    fn current_identity(&self) -> Identity;
}
