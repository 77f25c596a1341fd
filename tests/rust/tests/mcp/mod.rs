//! MCP Surface Integration Tests
//!
//! - Tool dispatch through the registry against the fake backend
//! - Full Streamable HTTP sessions with an rmcp client

mod streamable_http;
mod tools;
