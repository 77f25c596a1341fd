//! Configuration errors
//!
//! Raised while turning user input (URIs, CLI flags, environment) into a
//! connection descriptor. These are never retried.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unsupported scheme: {0}. Use 'redis' or 'rediss'")]
    UnsupportedScheme(String),

    #[error("Invalid Redis URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid ssl_cert_reqs value '{0}'. Use 'required', 'optional' or 'none'")]
    InvalidCertRequirement(String),

    #[error("Invalid Entra ID configuration: {0}")]
    InvalidEntraId(String),

    #[error("Failed to read TLS material '{path}': {reason}")]
    TlsMaterial { path: String, reason: String },
}
