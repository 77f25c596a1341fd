//! Entra ID settings from the environment

use pretty_assertions::assert_eq;
use redis_mcp_core::settings::entra_config_from_lookup;
use redis_mcp_core::{AuthFlow, IdentityType};

fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

#[test]
fn test_unset_flow_disables_entra_id() {
    let config = entra_config_from_lookup(lookup(&[]));

    assert!(!config.is_enabled());
    assert_eq!(config.flow(), Ok(None));
    assert!(config.validate().is_ok());
}

#[test]
fn test_service_principal_missing_fields_are_named() {
    let config = entra_config_from_lookup(lookup(&[
        ("REDIS_ENTRAID_AUTH_FLOW", "service_principal"),
        ("REDIS_ENTRAID_CLIENT_ID", "app-id"),
    ]));

    assert_eq!(config.flow(), Ok(Some(AuthFlow::ServicePrincipal)));
    let err = config.validate().unwrap_err();
    assert!(err.contains("client_secret"));
    assert!(err.contains("tenant_id"));
}

#[test]
fn test_user_assigned_identity_from_environment() {
    let config = entra_config_from_lookup(lookup(&[
        ("REDIS_ENTRAID_AUTH_FLOW", "managed_identity"),
        ("REDIS_ENTRAID_IDENTITY_TYPE", "user_assigned"),
        ("REDIS_ENTRAID_USER_ASSIGNED_CLIENT_ID", "mi-client"),
    ]));

    assert_eq!(config.identity(), Ok(IdentityType::UserAssigned));
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_flow_is_invalid() {
    let config = entra_config_from_lookup(lookup(&[("REDIS_ENTRAID_AUTH_FLOW", "password")]));

    assert!(config.is_enabled());
    assert!(config.validate().is_err());
}

#[test]
fn test_lifecycle_overrides() {
    let config = entra_config_from_lookup(lookup(&[
        ("REDIS_ENTRAID_AUTH_FLOW", "default_credential"),
        ("REDIS_ENTRAID_TOKEN_EXPIRATION_REFRESH_RATIO", "0.5"),
        ("REDIS_ENTRAID_RETRY_MAX_ATTEMPTS", "5"),
    ]));

    assert_eq!(config.lifecycle.expiration_refresh_ratio, 0.5);
    assert_eq!(config.lifecycle.retry_max_attempts, 5);
    assert!(config.validate().is_ok());
}
