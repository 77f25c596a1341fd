//! Entra ID token sources
//!
//! Each source performs one token request per `fetch`; caching and retries
//! are the TokenManager's job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use super::token::{AccessToken, TokenSource};
use super::CredentialError;

/// Public-cloud authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Azure Instance Metadata Service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

// ============================================================================
// Service principal (client credentials grant)
// ============================================================================

pub struct ServicePrincipalSource {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    scopes: Vec<String>,
}

impl ServicePrincipalSource {
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Zeroizing<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            http,
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
            scopes,
        }
    }

    /// Use a different authority host (sovereign clouds, test servers)
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority,
            urlencoding::encode(&self.tenant_id)
        )
    }
}

#[async_trait]
impl TokenSource for ServicePrincipalSource {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let scope = self.scopes.join(" ");
        let mut params = HashMap::new();
        params.insert("grant_type", "client_credentials");
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("scope", scope.as_str());

        let response = self
            .http
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        parse_response(response).await
    }

    fn name(&self) -> &'static str {
        "service_principal"
    }
}

// ============================================================================
// Managed identity (IMDS or App Service)
// ============================================================================

/// Where managed-identity tokens come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedIdentityEndpoint {
    Imds { url: String },
    AppService { url: String, header: String },
}

impl ManagedIdentityEndpoint {
    /// App Service when `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` are set, IMDS otherwise
    pub fn detect() -> Self {
        match (
            std::env::var("IDENTITY_ENDPOINT").ok(),
            std::env::var("IDENTITY_HEADER").ok(),
        ) {
            (Some(url), Some(header)) if !url.is_empty() => Self::AppService { url, header },
            _ => Self::Imds {
                url: IMDS_ENDPOINT.to_string(),
            },
        }
    }
}

pub struct ManagedIdentitySource {
    http: reqwest::Client,
    endpoint: ManagedIdentityEndpoint,
    resource: String,
    /// Set for user-assigned identities
    client_id: Option<String>,
}

impl ManagedIdentitySource {
    pub fn new(http: reqwest::Client, resource: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: ManagedIdentityEndpoint::detect(),
            resource: resource.into(),
            client_id,
        }
    }

    pub fn with_endpoint(mut self, endpoint: ManagedIdentityEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl TokenSource for ManagedIdentitySource {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let mut query: Vec<(&str, &str)> = vec![("resource", self.resource.as_str())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match &self.endpoint {
            ManagedIdentityEndpoint::Imds { url } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http.get(url).header("Metadata", "true").query(&query)
            }
            ManagedIdentityEndpoint::AppService { url, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(url)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        parse_response(response).await
    }

    fn name(&self) -> &'static str {
        "managed_identity"
    }
}

// ============================================================================
// Default credential chain
// ============================================================================

/// Tries each source in order and returns the first token obtained
pub struct DefaultCredentialSource {
    chain: Vec<Arc<dyn TokenSource>>,
}

impl DefaultCredentialSource {
    pub fn new(chain: Vec<Arc<dyn TokenSource>>) -> Self {
        Self { chain }
    }

    /// Environment service principal (`AZURE_*`) if present, then managed identity
    pub fn from_environment(http: reqwest::Client, scopes: Vec<String>) -> Self {
        let mut chain: Vec<Arc<dyn TokenSource>> = Vec::new();

        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        if let (Some(tenant), Some(client), Some(secret)) = (
            env("AZURE_TENANT_ID"),
            env("AZURE_CLIENT_ID"),
            env("AZURE_CLIENT_SECRET"),
        ) {
            let mut source =
                ServicePrincipalSource::new(http.clone(), tenant, client, Zeroizing::new(secret), scopes.clone());
            if let Some(authority) = env("AZURE_AUTHORITY_HOST") {
                source = source.with_authority(authority);
            }
            chain.push(Arc::new(source));
        }

        let resource = scopes
            .first()
            .map(|s| resource_from_scope(s))
            .unwrap_or_else(|| redis_mcp_core::entra::DEFAULT_RESOURCE.to_string());
        chain.push(Arc::new(ManagedIdentitySource::new(
            http,
            resource,
            env("AZURE_CLIENT_ID"),
        )));

        Self { chain }
    }
}

#[async_trait]
impl TokenSource for DefaultCredentialSource {
    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        let mut failures = Vec::new();
        for source in &self.chain {
            match source.fetch().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    debug!(source = source.name(), error = %e, "[DefaultCredential] Source unavailable");
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }
        Err(CredentialError::Request(format!(
            "no credential source succeeded ({})",
            failures.join("; ")
        )))
    }

    fn name(&self) -> &'static str {
        "default_credential"
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// `https://redis.azure.com/.default` → `https://redis.azure.com/`
fn resource_from_scope(scope: &str) -> String {
    let trimmed = scope.trim_end_matches(".default");
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

async fn parse_response(response: reqwest::Response) -> Result<AccessToken, CredentialError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Request(format!("HTTP {} - {}", status, body)));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
    token_from_json(&body, Utc::now())
}

/// Build a token from an OAuth2/managed-identity JSON body.
///
/// Accepts `expires_in` (seconds from now) or `expires_on` (epoch seconds),
/// as numbers or numeric strings.
pub(crate) fn token_from_json(body: &Value, now: DateTime<Utc>) -> Result<AccessToken, CredentialError> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| CredentialError::InvalidResponse("missing access_token".to_string()))?;

    let expires_at = if let Some(secs) = body.get("expires_in").and_then(as_i64) {
        chrono::Duration::try_seconds(secs)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| CredentialError::InvalidResponse(format!("bad expires_in {}", secs)))?
    } else if let Some(epoch) = body.get("expires_on").and_then(as_i64) {
        Utc.timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| CredentialError::InvalidResponse(format!("bad expires_on {}", epoch)))?
    } else {
        return Err(CredentialError::InvalidResponse(
            "missing expires_in/expires_on".to_string(),
        ));
    };

    Ok(AccessToken::new(access_token, expires_at).with_received_at(now))
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
