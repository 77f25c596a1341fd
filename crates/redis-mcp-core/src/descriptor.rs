//! Connection descriptor - normalized target configuration
//!
//! A `ConnectionDescriptor` is what the pool actually connects with. It is
//! produced by the resolver and never mutated afterwards, except for the
//! one-way cluster-mode resolution done by the pool before connecting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::ConfigurationError;

/// Host used when neither URI nor parameters name one
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Standard Redis port
pub const DEFAULT_PORT: u16 = 6379;

/// Logical database selected when none is given
pub const DEFAULT_DB: i64 = 0;

/// Ceiling of in-flight commands per connection handle
pub const MAX_CONNECTIONS_PER_HANDLE: usize = 10;

/// How strictly the server certificate is verified on TLS connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertRequirement {
    #[default]
    Required,
    Optional,
    None,
}

impl CertRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::None => "none",
        }
    }

    /// Whether certificate verification must be skipped entirely
    pub fn skips_verification(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl FromStr for CertRequirement {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" | "cert_required" => Ok(Self::Required),
            "optional" | "cert_optional" => Ok(Self::Optional),
            "none" | "cert_none" => Ok(Self::None),
            _ => Err(ConfigurationError::InvalidCertRequirement(s.to_string())),
        }
    }
}

impl fmt::Display for CertRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster topology of a target.
///
/// `Unknown` only exists between resolution and `add`; the pool replaces it
/// with the detected value before a descriptor is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterMode {
    #[default]
    Unknown,
    Clustered,
    Standalone,
}

impl ClusterMode {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Clustered,
            Some(false) => Self::Standalone,
            None => Self::Unknown,
        }
    }

    pub fn is_clustered(&self) -> bool {
        matches!(self, Self::Clustered)
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// TLS toggle and material locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub enabled: bool,
    pub ca_path: Option<String>,
    pub ca_certs: Option<String>,
    pub keyfile: Option<String>,
    pub certfile: Option<String>,
    pub cert_reqs: CertRequirement,
}

impl TlsOptions {
    /// True when a client certificate pair is configured
    pub fn has_client_identity(&self) -> bool {
        self.keyfile.is_some() && self.certfile.is_some()
    }

    /// True when a custom root store must be loaded
    pub fn has_custom_roots(&self) -> bool {
        self.ca_path.is_some() || self.ca_certs.is_some()
    }
}

/// Normalized configuration for one logical backend target
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    /// Absent whenever `cluster_mode` is `Clustered`
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    pub tls: TlsOptions,
    pub cluster_mode: ClusterMode,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: Some(DEFAULT_DB),
            username: None,
            password: None,
            tls: TlsOptions::default(),
            cluster_mode: ClusterMode::Unknown,
        }
    }
}

impl ConnectionDescriptor {
    /// `host:port`, the shape used for derived host identifiers
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fix the cluster mode, dropping the database index for clusters
    pub fn with_cluster_mode(mut self, mode: ClusterMode) -> Self {
        self.cluster_mode = mode;
        if mode.is_clustered() {
            self.db = None;
        }
        self
    }

    /// Database index to SELECT, never set for clusters
    pub fn effective_db(&self) -> i64 {
        if self.cluster_mode.is_clustered() {
            return DEFAULT_DB;
        }
        self.db.unwrap_or(DEFAULT_DB)
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .field("cluster_mode", &self.cluster_mode)
            .finish()
    }
}
