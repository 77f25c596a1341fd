//! Redis MCP Handler
//!
//! Implements the MCP ServerHandler trait over the tool registry. Tool
//! results are always text; only unknown tools and malformed arguments are
//! reported as protocol errors.

use std::sync::Arc;

use redis_mcp_core::branding;
use rmcp::{
    model::*, service::RequestContext, ErrorData as McpError, RoleServer, ServerHandler,
};
use tracing::{debug, Instrument};

use crate::logging::{ToolSpan, TraceContext};
use crate::pool::ConnectionPool;
use crate::tools::{ToolError, ToolRegistry};

const INSTRUCTIONS: &str = "Redis MCP server. Manage connections with connect, list_connections, \
     switch_default_connection, get_connection and disconnect. Every data tool accepts an \
     optional host_id; the default connection is used when it is omitted.";

#[derive(Clone)]
pub struct RedisMcpHandler {
    registry: Arc<ToolRegistry>,
}

impl RedisMcpHandler {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            registry: Arc::new(ToolRegistry::new(pool)),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one tool inside a `tool_call` span
    pub async fn dispatch(&self, name: &str, arguments: JsonObject) -> Result<String, ToolError> {
        let host_id = arguments
            .get("host_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let ctx = TraceContext::new(name).with_host(host_id);
        let span = ToolSpan::enter(&ctx);

        async {
            ToolSpan::log_entry(&ctx);
            let result = self.registry.call(name, arguments).await;
            match &result {
                Ok(text) => ToolSpan::log_exit(&ctx, &format!("ok({}c)", text.len())),
                Err(e) => ToolSpan::log_exit(&ctx, &format!("rejected: {}", e)),
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl ServerHandler for RedisMcpHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools_with(ToolsCapability {
                    list_changed: Some(false),
                })
                .build(),
            server_info: Implementation {
                name: branding::SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.registry.tools().to_vec();
        debug!(count = tools.len(), "list_tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = params.arguments.unwrap_or_default();
        let text = self
            .dispatch(&params.name, arguments)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
