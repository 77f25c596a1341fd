//! # Redis MCP Core Library
//!
//! Configuration model shared by the gateway and the server binary.
//!
//! ## Modules
//!
//! - `branding` - Product naming constants
//! - `descriptor` - Normalized connection descriptor and defaults
//! - `resolver` - URI + parameter resolution into descriptors
//! - `entra` - Entra ID credential-flow settings and validation
//! - `settings` - Environment variable loading
//! - `error` - Configuration errors

pub mod branding;
pub mod descriptor;
pub mod entra;
pub mod error;
pub mod resolver;
pub mod settings;

pub use descriptor::{
    CertRequirement, ClusterMode, ConnectionDescriptor, TlsOptions, DEFAULT_DB, DEFAULT_HOST,
    DEFAULT_PORT, MAX_CONNECTIONS_PER_HANDLE,
};
pub use entra::{
    AuthFlow, EntraIdConfig, IdentityType, TokenLifecycle, MAX_LOWER_REFRESH_BOUND_MILLIS,
};
pub use error::ConfigurationError;
pub use resolver::{parse_redis_uri, redact_uri, resolve, ConnectionParams, ResolvedConnection};
