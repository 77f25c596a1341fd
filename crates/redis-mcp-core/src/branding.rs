//! Centralized branding constants
//!
//! All product naming comes from this module.

/// Human-readable product name
pub const DISPLAY_NAME: &str = "Redis MCP Server";

/// Name reported in the MCP `serverInfo` block
pub const SERVER_NAME: &str = "redis-mcp-server";

/// Log file prefix (e.g. `redis-mcp.2026-01-22.log`)
pub const LOG_PREFIX: &str = "redis-mcp";

/// Environment variable carrying the log level
pub const LOG_LEVEL_ENV: &str = "MCP_REDIS_LOG_LEVEL";

/// Client name announced to Redis via `CLIENT SETINFO LIB-NAME`
pub fn lib_name() -> String {
    format!("redis-rs(mcp-server_v{})", env!("CARGO_PKG_VERSION"))
}
