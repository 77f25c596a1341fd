//! Entra ID authentication settings
//!
//! Describes which Azure credential flow (if any) supplies Redis tokens and
//! how the resulting tokens are refreshed. Validation reports problems as a
//! message and never panics; turning the settings into a live credential is
//! the gateway's job.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroizing;

/// Scope requested when none is configured
pub const DEFAULT_SCOPE: &str = "https://redis.azure.com/.default";

/// Managed-identity resource requested when none is configured
pub const DEFAULT_RESOURCE: &str = "https://redis.azure.com/";

/// Supported credential flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    ServicePrincipal,
    ManagedIdentity,
    DefaultCredential,
}

impl AuthFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServicePrincipal => "service_principal",
            Self::ManagedIdentity => "managed_identity",
            Self::DefaultCredential => "default_credential",
        }
    }
}

impl FromStr for AuthFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service_principal" => Ok(Self::ServicePrincipal),
            "managed_identity" => Ok(Self::ManagedIdentity),
            "default_credential" => Ok(Self::DefaultCredential),
            other => Err(format!(
                "Invalid auth flow '{}'. Use service_principal, managed_identity or default_credential",
                other
            )),
        }
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Managed identity flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityType {
    SystemAssigned,
    UserAssigned,
}

impl FromStr for IdentityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system_assigned" => Ok(Self::SystemAssigned),
            "user_assigned" => Ok(Self::UserAssigned),
            other => Err(format!(
                "Invalid identity type '{}'. Use system_assigned or user_assigned",
                other
            )),
        }
    }
}

/// Largest accepted `lower_refresh_bound_millis` (one day)
pub const MAX_LOWER_REFRESH_BOUND_MILLIS: u64 = 86_400_000;

/// Token refresh and retry tuning
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLifecycle {
    /// Fraction of the token lifetime after which a refresh is due
    pub expiration_refresh_ratio: f64,
    /// Refresh no later than this many milliseconds before expiry
    pub lower_refresh_bound_millis: u64,
    pub token_request_execution_timeout_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for TokenLifecycle {
    fn default() -> Self {
        Self {
            expiration_refresh_ratio: 0.9,
            lower_refresh_bound_millis: 30_000,
            token_request_execution_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Entra ID configuration as loaded from the environment
#[derive(Clone, PartialEq)]
pub struct EntraIdConfig {
    /// Raw flow name; empty or absent disables Entra ID auth
    pub auth_flow: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Zeroizing<String>>,
    pub tenant_id: Option<String>,
    pub identity_type: String,
    pub user_assigned_identity_client_id: Option<String>,
    /// Comma-separated scopes
    pub scopes: String,
    pub resource: String,
    pub lifecycle: TokenLifecycle,
}

impl Default for EntraIdConfig {
    fn default() -> Self {
        Self {
            auth_flow: None,
            client_id: None,
            client_secret: None,
            tenant_id: None,
            identity_type: "system_assigned".to_string(),
            user_assigned_identity_client_id: None,
            scopes: DEFAULT_SCOPE.to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            lifecycle: TokenLifecycle::default(),
        }
    }
}

impl EntraIdConfig {
    /// Whether a credential flow has been selected
    pub fn is_enabled(&self) -> bool {
        self.auth_flow
            .as_deref()
            .map(|flow| !flow.trim().is_empty())
            .unwrap_or(false)
    }

    /// Parsed flow, `Ok(None)` when disabled
    pub fn flow(&self) -> Result<Option<AuthFlow>, String> {
        if !self.is_enabled() {
            return Ok(None);
        }
        self.auth_flow.as_deref().unwrap_or_default().parse().map(Some)
    }

    pub fn identity(&self) -> Result<IdentityType, String> {
        self.identity_type.parse()
    }

    /// Scopes split on commas, falling back to the Redis default scope
    pub fn scope_list(&self) -> Vec<String> {
        let scopes: Vec<String> = self
            .scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if scopes.is_empty() {
            vec![DEFAULT_SCOPE.to_string()]
        } else {
            scopes
        }
    }

    /// Check that the selected flow has everything it needs.
    ///
    /// Disabled configurations are always valid.
    pub fn validate(&self) -> Result<(), String> {
        let Some(flow) = self.flow()? else {
            return Ok(());
        };

        let mut missing = Vec::new();
        match flow {
            AuthFlow::ServicePrincipal => {
                if is_blank(self.client_id.as_deref()) {
                    missing.push("client_id");
                }
                if is_blank(self.client_secret.as_ref().map(|s| s.as_str())) {
                    missing.push("client_secret");
                }
                if is_blank(self.tenant_id.as_deref()) {
                    missing.push("tenant_id");
                }
            }
            AuthFlow::ManagedIdentity => {
                if self.identity()? == IdentityType::UserAssigned
                    && is_blank(self.user_assigned_identity_client_id.as_deref())
                {
                    missing.push("user_assigned_identity_client_id");
                }
            }
            AuthFlow::DefaultCredential => {}
        }

        if !missing.is_empty() {
            return Err(format!(
                "{} authentication requires: {}",
                flow,
                missing.join(", ")
            ));
        }

        let ratio = self.lifecycle.expiration_refresh_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(format!(
                "token_expiration_refresh_ratio must be in (0, 1], got {}",
                ratio
            ));
        }
        if self.lifecycle.lower_refresh_bound_millis > MAX_LOWER_REFRESH_BOUND_MILLIS {
            return Err(format!(
                "lower_refresh_bound_millis must be at most {}, got {}",
                MAX_LOWER_REFRESH_BOUND_MILLIS, self.lifecycle.lower_refresh_bound_millis
            ));
        }
        if self.lifecycle.retry_max_attempts == 0 {
            return Err("retry_max_attempts must be at least 1".to_string());
        }

        Ok(())
    }
}

impl fmt::Debug for EntraIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntraIdConfig")
            .field("auth_flow", &self.auth_flow)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("tenant_id", &self.tenant_id)
            .field("identity_type", &self.identity_type)
            .field(
                "user_assigned_identity_client_id",
                &self.user_assigned_identity_client_id,
            )
            .field("scopes", &self.scopes)
            .field("resource", &self.resource)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
