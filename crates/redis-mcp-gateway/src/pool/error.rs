//! Pool errors and backend failure classification

use std::fmt;

use redis::{ErrorKind, RedisError};
use redis_mcp_core::ConfigurationError;
use thiserror::Error;

use super::credential::CredentialError;

/// Coarse category of a backend failure, used in messages and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    ConnectionRefused,
    AuthenticationFailed,
    Timeout,
    Protocol,
    Cluster,
    Credential,
    Backend,
}

impl FailureCategory {
    /// Classify a `redis` error
    pub fn of(err: &RedisError) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_connection_refusal() {
            return Self::ConnectionRefused;
        }
        if matches!(err.code(), Some("WRONGPASS") | Some("NOAUTH") | Some("NOPERM")) {
            return Self::AuthenticationFailed;
        }
        if err.is_cluster_error() {
            return Self::Cluster;
        }
        match err.kind() {
            ErrorKind::AuthenticationFailed => Self::AuthenticationFailed,
            ErrorKind::ResponseError | ErrorKind::ParseError | ErrorKind::TypeError => {
                Self::Protocol
            }
            ErrorKind::CrossSlot | ErrorKind::MasterDown => Self::Cluster,
            _ => Self::Backend,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection refused",
            Self::AuthenticationFailed => "authentication failed",
            Self::Timeout => "timeout",
            Self::Protocol => "protocol error",
            Self::Cluster => "cluster error",
            Self::Credential => "credential error",
            Self::Backend => "redis error",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure to open a command channel
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{category}: {message}")]
    Backend {
        category: FailureCategory,
        message: String,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ConnectError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Backend { category, .. } => *category,
            Self::Configuration(_) => FailureCategory::Backend,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Backend {
            category: FailureCategory::Timeout,
            message: message.into(),
        }
    }
}

impl From<RedisError> for ConnectError {
    fn from(err: RedisError) -> Self {
        Self::Backend {
            category: FailureCategory::of(&err),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by [`ConnectionPool`](super::ConnectionPool) operations
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to connect to '{host_id}' ({category}): {message}")]
    Connectivity {
        host_id: String,
        category: FailureCategory,
        message: String,
    },

    #[error("Connection pool inconsistency for '{host_id}': {message}")]
    Consistency { host_id: String, message: String },

    #[error("Connection '{host_id}' not found. Available connections: {available:?}")]
    NotFound {
        host_id: String,
        available: Vec<String>,
    },

    #[error("No Redis connections available. Use the connect tool to add one")]
    NoConnections,
}

impl PoolError {
    pub fn connectivity(host_id: &str, err: ConnectError) -> Self {
        match err {
            ConnectError::Configuration(e) => Self::Configuration(e),
            ConnectError::Backend { category, message } => Self::Connectivity {
                host_id: host_id.to_string(),
                category,
                message,
            },
        }
    }

    pub fn credential(host_id: &str, err: CredentialError) -> Self {
        match err {
            CredentialError::Configuration(message) => {
                Self::Configuration(ConfigurationError::InvalidEntraId(message))
            }
            other => Self::Connectivity {
                host_id: host_id.to_string(),
                category: FailureCategory::Credential,
                message: other.to_string(),
            },
        }
    }
}
