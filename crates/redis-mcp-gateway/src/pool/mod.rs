//! Connection Pool - named Redis connections shared by every tool
//!
//! - **ConnectionPool**: registry of host identifiers, default host tracking
//! - **Connector / CommandChannel**: seams over the `redis` crate
//! - **TopologyDetector**: cluster auto-detection
//! - **CredentialProvider**: Entra ID tokens with background refresh
//! - **RedisHandle**: decoding and raw views of one host

mod connector;
pub mod credential;
mod error;
mod handle;
mod refresh;
mod service;
mod tls;
mod topology;

pub use connector::{
    closed_error, connection_info, CommandChannel, ConnectRequest, Connector, RedisConnector,
    DEFAULT_CONNECT_TIMEOUT,
};
pub use credential::{
    AccessToken, CredentialError, CredentialProvider, CredentialProviderFactory,
    EntraIdProviderFactory,
};
pub use error::{ConnectError, FailureCategory, PoolError};
pub use handle::{RedisHandle, Reply, ReplyMode};
pub use refresh::RefreshTask;
pub use service::{
    info_field, info_text, release_best_effort, ConnectionDescription, ConnectionDetails,
    ConnectionEntry, ConnectionPool, DbSlot, CLUSTER_DB_PLACEHOLDER,
};
pub use tls::load_certificates;
pub use topology::{cluster_enabled, TopologyDetector};
