//! Credential provider factory
//!
//! Turns an [`EntraIdConfig`] into a live [`CredentialProvider`]. The pool
//! depends on the trait so tests can substitute a provider that never leaves
//! the process.

use std::sync::Arc;

use redis_mcp_core::{AuthFlow, EntraIdConfig, IdentityType};
use tracing::info;

use super::sources::{DefaultCredentialSource, ManagedIdentitySource, ServicePrincipalSource};
use super::token::{TokenManager, TokenSource};
use super::{CredentialError, CredentialProvider};

pub trait CredentialProviderFactory: Send + Sync {
    fn create(&self, config: &EntraIdConfig)
        -> Result<Arc<dyn CredentialProvider>, CredentialError>;
}

/// Builds token managers over the Entra ID endpoints
pub struct EntraIdProviderFactory {
    http: reqwest::Client,
}

impl EntraIdProviderFactory {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn source_for(
        &self,
        flow: AuthFlow,
        config: &EntraIdConfig,
    ) -> Result<Arc<dyn TokenSource>, CredentialError> {
        let source: Arc<dyn TokenSource> = match flow {
            AuthFlow::ServicePrincipal => {
                // validate() guarantees these are present
                let missing = || CredentialError::Configuration("incomplete service principal".into());
                Arc::new(ServicePrincipalSource::new(
                    self.http.clone(),
                    config.tenant_id.clone().ok_or_else(missing)?,
                    config.client_id.clone().ok_or_else(missing)?,
                    config.client_secret.clone().ok_or_else(missing)?,
                    config.scope_list(),
                ))
            }
            AuthFlow::ManagedIdentity => {
                let identity = config.identity().map_err(CredentialError::Configuration)?;
                let client_id = match identity {
                    IdentityType::SystemAssigned => None,
                    IdentityType::UserAssigned => config.user_assigned_identity_client_id.clone(),
                };
                Arc::new(ManagedIdentitySource::new(
                    self.http.clone(),
                    config.resource.clone(),
                    client_id,
                ))
            }
            AuthFlow::DefaultCredential => Arc::new(DefaultCredentialSource::from_environment(
                self.http.clone(),
                config.scope_list(),
            )),
        };
        Ok(source)
    }
}

impl Default for EntraIdProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProviderFactory for EntraIdProviderFactory {
    fn create(
        &self,
        config: &EntraIdConfig,
    ) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
        config.validate().map_err(CredentialError::Configuration)?;
        let flow = config
            .flow()
            .map_err(CredentialError::Configuration)?
            .ok_or_else(|| {
                CredentialError::Configuration("Entra ID authentication is not enabled".into())
            })?;

        let source = self.source_for(flow, config)?;
        info!(flow = %flow, "[CredentialFactory] Created Entra ID credential provider");

        Ok(Arc::new(TokenManager::new(source, config.lifecycle.clone())))
    }
}
