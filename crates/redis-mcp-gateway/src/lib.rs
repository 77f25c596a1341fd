//! Redis MCP Gateway
//!
//! MCP server for Redis that provides:
//! - A pool of named Redis connections (standalone and cluster)
//! - Cluster auto-detection
//! - Entra ID token authentication with background refresh
//! - Data tools dispatched by name over the pool
//! - stdio and Streamable HTTP transports

pub mod logging;
pub mod mcp;
pub mod pool;
pub mod server;
pub mod tools;

pub use mcp::RedisMcpHandler;
pub use pool::{
    AccessToken, CommandChannel, ConnectError, ConnectRequest, ConnectionDescription,
    ConnectionDetails, ConnectionPool, Connector, CredentialError, CredentialProvider,
    CredentialProviderFactory, DbSlot, EntraIdProviderFactory, FailureCategory, PoolError,
    RedisConnector, RedisHandle, Reply, ReplyMode, TopologyDetector,
};
pub use server::{McpServer, ServerConfig, Transport, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT};
pub use tools::{ToolError, ToolRegistry};
