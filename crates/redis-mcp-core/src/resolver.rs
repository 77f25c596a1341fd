//! Configuration Resolver
//!
//! Turns a connection URI and/or discrete parameters into a normalized
//! [`ConnectionDescriptor`] plus the host identifier it will be pooled under.
//!
//! Rules:
//! - `redis://` selects plain TCP, `rediss://` selects TLS, anything else fails
//! - the URI supplies the base, explicitly provided parameters win field by field
//! - with a URI present, the conventional defaults (`127.0.0.1`, `6379`, db `0`)
//!   passed as parameters are not treated as overrides
//! - an explicit `cluster_mode=true` removes the database index
//! - malformed integers fall back to defaults instead of failing

use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::descriptor::{
    CertRequirement, ClusterMode, ConnectionDescriptor, TlsOptions, DEFAULT_DB, DEFAULT_HOST,
    DEFAULT_PORT,
};
use crate::error::ConfigurationError;

/// Connection parameters as supplied by a caller (tool arguments, CLI, env).
///
/// Every field is optional so that "not provided" is distinguishable from
/// "provided with the default value".
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionParams {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl: Option<bool>,
    pub ssl_ca_path: Option<String>,
    pub ssl_keyfile: Option<String>,
    pub ssl_certfile: Option<String>,
    pub ssl_cert_reqs: Option<String>,
    pub ssl_ca_certs: Option<String>,
    pub cluster_mode: Option<bool>,
    pub host_id: Option<String>,
}

impl ConnectionParams {
    /// Layer `overrides` on top of `self`, field by field
    pub fn overlay(self, overrides: ConnectionParams) -> ConnectionParams {
        ConnectionParams {
            url: overrides.url.or(self.url),
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            db: overrides.db.or(self.db),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            ssl: overrides.ssl.or(self.ssl),
            ssl_ca_path: overrides.ssl_ca_path.or(self.ssl_ca_path),
            ssl_keyfile: overrides.ssl_keyfile.or(self.ssl_keyfile),
            ssl_certfile: overrides.ssl_certfile.or(self.ssl_certfile),
            ssl_cert_reqs: overrides.ssl_cert_reqs.or(self.ssl_cert_reqs),
            ssl_ca_certs: overrides.ssl_ca_certs.or(self.ssl_ca_certs),
            cluster_mode: overrides.cluster_mode.or(self.cluster_mode),
            host_id: overrides.host_id.or(self.host_id),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("url", &self.url.as_deref().map(redact_uri))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl", &self.ssl)
            .field("ssl_cert_reqs", &self.ssl_cert_reqs)
            .field("cluster_mode", &self.cluster_mode)
            .field("host_id", &self.host_id)
            .finish_non_exhaustive()
    }
}

/// Result of resolution: the descriptor and the key it is pooled under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub host_id: String,
    pub descriptor: ConnectionDescriptor,
}

/// Resolve caller parameters into a descriptor and host identifier
pub fn resolve(params: &ConnectionParams) -> Result<ResolvedConnection, ConfigurationError> {
    let uri = params.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

    let (mut descriptor, uri_address) = match uri {
        Some(uri) => {
            let descriptor = parse_redis_uri(uri)?;
            let address = descriptor.address();
            (descriptor, Some(address))
        }
        None => (ConnectionDescriptor::default(), None),
    };
    let from_uri = uri_address.is_some();

    if let Some(host) = params.host.as_deref() {
        if !from_uri || host != DEFAULT_HOST {
            descriptor.host = host.to_string();
        }
    }
    if let Some(port) = params.port {
        if !from_uri || port != DEFAULT_PORT {
            descriptor.port = port;
        }
    }
    if let Some(db) = params.db {
        if !from_uri || db != DEFAULT_DB {
            descriptor.db = Some(db);
        }
    }
    if let Some(username) = &params.username {
        descriptor.username = Some(username.clone());
    }
    if let Some(password) = &params.password {
        descriptor.password = Some(Zeroizing::new(password.clone()));
    }
    if let Some(ssl) = params.ssl {
        descriptor.tls.enabled = ssl;
    }
    if let Some(path) = &params.ssl_ca_path {
        descriptor.tls.ca_path = Some(path.clone());
    }
    if let Some(path) = &params.ssl_keyfile {
        descriptor.tls.keyfile = Some(path.clone());
    }
    if let Some(path) = &params.ssl_certfile {
        descriptor.tls.certfile = Some(path.clone());
    }
    if let Some(reqs) = &params.ssl_cert_reqs {
        descriptor.tls.cert_reqs = reqs.parse()?;
    }
    if let Some(path) = &params.ssl_ca_certs {
        descriptor.tls.ca_certs = Some(path.clone());
    }

    let descriptor = descriptor.with_cluster_mode(ClusterMode::from_flag(params.cluster_mode));

    let host_id = match params.host_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uri_address.unwrap_or_else(|| descriptor.address()),
    };

    debug!(
        host_id = %host_id,
        host = %descriptor.host,
        port = descriptor.port,
        tls = descriptor.tls.enabled,
        cluster_mode = ?descriptor.cluster_mode,
        "[Resolver] Resolved connection parameters"
    );

    Ok(ResolvedConnection {
        host_id,
        descriptor,
    })
}

/// Parse a `redis://` or `rediss://` URI into a descriptor
pub fn parse_redis_uri(uri: &str) -> Result<ConnectionDescriptor, ConfigurationError> {
    let parsed = match Url::parse(uri) {
        Ok(parsed) => parsed,
        Err(url::ParseError::InvalidPort) => {
            warn!("[Resolver] Invalid port in Redis URI, using {}", DEFAULT_PORT);
            Url::parse(&strip_authority_port(uri)).map_err(|e| invalid_uri(uri, e))?
        }
        Err(e) => return Err(invalid_uri(uri, e)),
    };

    let mut descriptor = ConnectionDescriptor::default();
    descriptor.tls.enabled = match parsed.scheme() {
        "rediss" => true,
        "redis" => false,
        other => return Err(ConfigurationError::UnsupportedScheme(other.to_string())),
    };

    descriptor.host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    descriptor.port = parsed.port().unwrap_or(DEFAULT_PORT);

    let path = parsed.path().trim_start_matches('/');
    descriptor.db = Some(if path.is_empty() {
        DEFAULT_DB
    } else {
        path.parse().unwrap_or_else(|_| {
            warn!(path = %path, "[Resolver] Non-numeric database in Redis URI, using 0");
            DEFAULT_DB
        })
    });

    if !parsed.username().is_empty() {
        descriptor.username = Some(percent_decode(parsed.username()));
    }
    if let Some(password) = parsed.password().filter(|p| !p.is_empty()) {
        descriptor.password = Some(Zeroizing::new(percent_decode(password)));
    }

    let mut tls = TlsOptions {
        enabled: descriptor.tls.enabled,
        ..Default::default()
    };
    let mut cert_reqs: Option<CertRequirement> = None;
    let mut query_db: Option<String> = None;

    // First occurrence of each key wins
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "ssl_cert_reqs" if cert_reqs.is_none() => cert_reqs = Some(value.parse()?),
            "ssl_ca_certs" if tls.ca_certs.is_none() => tls.ca_certs = Some(value.into_owned()),
            "ssl_ca_path" if tls.ca_path.is_none() => tls.ca_path = Some(value.into_owned()),
            "ssl_keyfile" if tls.keyfile.is_none() => tls.keyfile = Some(value.into_owned()),
            "ssl_certfile" if tls.certfile.is_none() => tls.certfile = Some(value.into_owned()),
            "db" if query_db.is_none() => query_db = Some(value.into_owned()),
            _ => {}
        }
    }
    tls.cert_reqs = cert_reqs.unwrap_or_default();
    descriptor.tls = tls;

    if let Some(raw) = query_db {
        match raw.parse() {
            Ok(db) => descriptor.db = Some(db),
            Err(_) => warn!(db = %raw, "[Resolver] Ignoring non-numeric db query parameter"),
        }
    }

    Ok(descriptor)
}

/// Render a URI with its password masked, for logs
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable uri>".to_string(),
    }
}

fn invalid_uri(uri: &str, e: url::ParseError) -> ConfigurationError {
    ConfigurationError::InvalidUri {
        uri: redact_uri(uri),
        reason: e.to_string(),
    }
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Drop the `:port` part of the authority, leaving everything else intact
fn strip_authority_port(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &uri[authority_start..];
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];

    let host_start = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host_part = &authority[host_start..];
    let search_from = host_part.rfind(']').unwrap_or(0);
    match host_part[search_from..].rfind(':') {
        Some(colon) => {
            let cut = authority_start + host_start + search_from + colon;
            format!("{}{}", &uri[..cut], &uri[authority_start + authority_len..])
        }
        None => uri.to_string(),
    }
}
