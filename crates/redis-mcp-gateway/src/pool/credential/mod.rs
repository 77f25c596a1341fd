//! Credential providers
//!
//! The pool only sees the [`CredentialProvider`] capability: "give me a valid
//! token" plus "when should this token be replaced". Everything Azure-specific
//! (token endpoints, managed identity discovery) lives behind it.
//!
//! - `token` - AccessToken + caching TokenManager
//! - `sources` - Entra ID token endpoints over reqwest
//! - `factory` - config → provider construction

mod factory;
mod sources;
mod token;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use factory::{CredentialProviderFactory, EntraIdProviderFactory};
pub use sources::{
    DefaultCredentialSource, ManagedIdentityEndpoint, ManagedIdentitySource,
    ServicePrincipalSource,
};
pub use token::{refresh_point, AccessToken, TokenManager, TokenSource, FALLBACK_USERNAME};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Unusable settings; never retried
    #[error("{0}")]
    Configuration(String),

    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Token request timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Refreshable source of Redis credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token valid for at least the configured lower bound
    async fn acquire_token(&self) -> Result<AccessToken, CredentialError>;

    /// When `token` should be replaced
    fn refresh_at(&self, token: &AccessToken) -> DateTime<Utc>;

    /// Pause before retrying after a failed background refresh
    fn retry_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}
