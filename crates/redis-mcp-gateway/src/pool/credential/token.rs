//! Access tokens and the caching token manager
//!
//! `TokenManager` wraps a raw [`TokenSource`] with:
//! - a cache, so every `add` and refresh through one manager shares a token
//! - a refresh point at `received + ratio * lifetime`, capped at
//!   `expiry - lower_bound`
//! - a per-request timeout and a fixed-delay retry policy

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use redis_mcp_core::TokenLifecycle;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{CredentialError, CredentialProvider};

/// AUTH username used when the token carries no `oid` claim
pub const FALLBACK_USERNAME: &str = "default";

/// A bearer token and its validity window
#[derive(Clone)]
pub struct AccessToken {
    value: Zeroizing<String>,
    received_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            received_at: Utc::now(),
            expires_at,
        }
    }

    /// Construct with an explicit receive time (token endpoints, tests)
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn secret(&self) -> &str {
        self.value.as_str()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Redis AUTH username: the `oid` claim of the JWT payload
    pub fn username(&self) -> String {
        self.claim("oid")
            .unwrap_or_else(|| FALLBACK_USERNAME.to_string())
    }

    fn claim(&self, name: &str) -> Option<String> {
        let payload = self.value.split('.').nth(1)?;
        let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
        claims.get(name)?.as_str().map(str::to_string)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("received_at", &self.received_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can mint a fresh token (an Azure endpoint, a test double)
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken, CredentialError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Compute when a token should be replaced.
///
/// Any step that leaves the representable date range collapses the refresh
/// point to `received_at`, i.e. refresh immediately.
pub fn refresh_point(token: &AccessToken, lifecycle: &TokenLifecycle) -> DateTime<Utc> {
    let lifetime_ms = (token.expires_at - token.received_at).num_milliseconds().max(0);
    let by_ratio = chrono::Duration::try_milliseconds(
        (lifetime_ms as f64 * lifecycle.expiration_refresh_ratio) as i64,
    )
    .and_then(|delta| token.received_at.checked_add_signed(delta));
    let lower_bound = i64::try_from(lifecycle.lower_refresh_bound_millis)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|delta| token.expires_at.checked_sub_signed(delta));

    match (by_ratio, lower_bound) {
        (Some(by_ratio), Some(lower_bound)) => by_ratio.min(lower_bound).max(token.received_at),
        _ => token.received_at,
    }
}

/// Caching credential provider over a [`TokenSource`]
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    lifecycle: TokenLifecycle,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>, lifecycle: TokenLifecycle) -> Self {
        Self {
            source,
            lifecycle,
            cached: Mutex::new(None),
        }
    }

    async fn fetch_with_retry(&self) -> Result<AccessToken, CredentialError> {
        let attempts = self.lifecycle.retry_max_attempts.max(1);
        let timeout = Duration::from_millis(self.lifecycle.token_request_execution_timeout_ms);
        let delay = Duration::from_millis(self.lifecycle.retry_delay_ms);
        let mut last_error = CredentialError::Request("no attempt made".to_string());

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, self.source.fetch()).await {
                Ok(Ok(token)) => {
                    debug!(
                        source = self.source.name(),
                        attempt,
                        expires_at = %token.expires_at(),
                        "[TokenManager] Token acquired"
                    );
                    return Ok(token);
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => {
                    last_error = CredentialError::Timeout(
                        self.lifecycle.token_request_execution_timeout_ms,
                    )
                }
            }

            warn!(
                source = self.source.name(),
                attempt,
                max_attempts = attempts,
                error = %last_error,
                "[TokenManager] Token request failed"
            );
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl CredentialProvider for TokenManager {
    async fn acquire_token(&self) -> Result<AccessToken, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < refresh_point(token, &self.lifecycle) {
                return Ok(token.clone());
            }
        }

        let token = self.fetch_with_retry().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    fn refresh_at(&self, token: &AccessToken) -> DateTime<Utc> {
        refresh_point(token, &self.lifecycle)
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.lifecycle.retry_delay_ms)
    }
}
