//! MCP protocol surface (rmcp-based implementation)

mod handler;

pub use handler::RedisMcpHandler;
