//! Environment settings
//!
//! Reads `REDIS_*` and `REDIS_ENTRAID_*` variables. Loading goes through a
//! lookup function so callers (and tests) can supply something other than the
//! process environment.

use std::str::FromStr;

use tracing::warn;
use zeroize::Zeroizing;

use crate::entra::{EntraIdConfig, TokenLifecycle, DEFAULT_RESOURCE, DEFAULT_SCOPE};
use crate::resolver::ConnectionParams;

/// Connection parameters from the process environment
pub fn connection_params_from_env() -> ConnectionParams {
    connection_params_from_lookup(|key| std::env::var(key).ok())
}

/// Entra ID settings from the process environment
pub fn entra_config_from_env() -> EntraIdConfig {
    entra_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn connection_params_from_lookup<F>(lookup: F) -> ConnectionParams
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    ConnectionParams {
        url: get("REDIS_URL"),
        host: get("REDIS_HOST"),
        port: get("REDIS_PORT").and_then(|v| parse_or_warn("REDIS_PORT", &v)),
        db: get("REDIS_DB").and_then(|v| parse_or_warn("REDIS_DB", &v)),
        username: get("REDIS_USERNAME"),
        password: get("REDIS_PWD"),
        ssl: get("REDIS_SSL").map(|v| parse_flag(&v)),
        ssl_ca_path: get("REDIS_SSL_CA_PATH"),
        ssl_keyfile: get("REDIS_SSL_KEYFILE"),
        ssl_certfile: get("REDIS_SSL_CERTFILE"),
        ssl_cert_reqs: get("REDIS_SSL_CERT_REQS"),
        ssl_ca_certs: get("REDIS_SSL_CA_CERTS"),
        cluster_mode: get("REDIS_CLUSTER_MODE").map(|v| parse_flag(&v)),
        host_id: None,
    }
}

pub fn entra_config_from_lookup<F>(lookup: F) -> EntraIdConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let defaults = TokenLifecycle::default();

    let lifecycle = TokenLifecycle {
        expiration_refresh_ratio: numeric_or_default(
            &get,
            "REDIS_ENTRAID_TOKEN_EXPIRATION_REFRESH_RATIO",
            defaults.expiration_refresh_ratio,
        ),
        lower_refresh_bound_millis: numeric_or_default(
            &get,
            "REDIS_ENTRAID_LOWER_REFRESH_BOUND_MILLIS",
            defaults.lower_refresh_bound_millis,
        ),
        token_request_execution_timeout_ms: numeric_or_default(
            &get,
            "REDIS_ENTRAID_TOKEN_REQUEST_EXECUTION_TIMEOUT_MS",
            defaults.token_request_execution_timeout_ms,
        ),
        retry_max_attempts: numeric_or_default(
            &get,
            "REDIS_ENTRAID_RETRY_MAX_ATTEMPTS",
            defaults.retry_max_attempts,
        ),
        retry_delay_ms: numeric_or_default(&get, "REDIS_ENTRAID_RETRY_DELAY_MS", defaults.retry_delay_ms),
    };

    EntraIdConfig {
        auth_flow: get("REDIS_ENTRAID_AUTH_FLOW"),
        client_id: get("REDIS_ENTRAID_CLIENT_ID"),
        client_secret: get("REDIS_ENTRAID_CLIENT_SECRET").map(Zeroizing::new),
        tenant_id: get("REDIS_ENTRAID_TENANT_ID"),
        identity_type: get("REDIS_ENTRAID_IDENTITY_TYPE")
            .unwrap_or_else(|| "system_assigned".to_string()),
        user_assigned_identity_client_id: get("REDIS_ENTRAID_USER_ASSIGNED_CLIENT_ID"),
        scopes: get("REDIS_ENTRAID_SCOPES").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        resource: get("REDIS_ENTRAID_RESOURCE").unwrap_or_else(|| DEFAULT_RESOURCE.to_string()),
        lifecycle,
    }
}

/// `true`, `1`, `t`, `yes` (any case) are truthy
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "t" | "yes" | "y" | "on"
    )
}

fn parse_or_warn<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key = %key, value = %value, "[Settings] Ignoring malformed number");
            None
        }
    }
}

fn numeric_or_default<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .and_then(|v| parse_or_warn(key, &v))
        .unwrap_or(default)
}
