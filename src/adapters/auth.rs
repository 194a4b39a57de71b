//! Static auth gateway: identity fixed when the gateway is built.
//!
//! Used by the command-line front end, where the caller's identity comes
//! from a flag or environment variable rather than a session.

use crate::domain::Identity;
use crate::ports::AuthGateway;

/// Environment variable naming the current user.
pub const IDENTITY_ENV: &str = "MEDIPULSE_IDENTITY";

#[derive(Debug, Clone)]
pub struct StaticAuthGateway {
    identity: Identity,
}

impl StaticAuthGateway {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Identity from an explicit value, falling back to `MEDIPULSE_IDENTITY`,
    /// then to guest.
    #[must_use]
    pub fn resolve(explicit: Option<&str>) -> Self {
        let raw = explicit
            .map(str::to_string)
            .or_else(|| std::env::var(IDENTITY_ENV).ok())
            .unwrap_or_default();
        Self::new(Identity::parse(&raw))
    }
}

impl AuthGateway for StaticAuthGateway {
    fn current_identity(&self) -> Identity {
        self.identity.clone()
    }
}
