//! MCP Server transports
//!
//! - stdio: one MCP session over the process's stdin/stdout
//! - Streamable HTTP: `/mcp` (rmcp `StreamableHttpService`) plus `/health`

mod handlers;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::mcp::RedisMcpHandler;
use crate::pool::ConnectionPool;

pub use handlers::HealthResponse;

/// Default bind host for the HTTP transport
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default port for the HTTP transport
pub const DEFAULT_HTTP_PORT: u16 = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Stdio,
    StreamableHttp,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "streamable-http" | "http" => Ok(Self::StreamableHttp),
            other => Err(format!(
                "unknown transport '{}' (expected stdio or streamable-http)",
                other
            )),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    /// Host to bind to (HTTP only)
    pub host: String,
    /// Port to listen on (HTTP only)
    pub port: u16,
    /// Enable CORS for browser access (HTTP only)
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Redis MCP server bound to one connection pool
pub struct McpServer {
    config: ServerConfig,
    pool: Arc<ConnectionPool>,
    handler: RedisMcpHandler,
}

impl McpServer {
    pub fn new(config: ServerConfig, pool: Arc<ConnectionPool>) -> Self {
        let handler = RedisMcpHandler::new(pool.clone());
        Self {
            config,
            pool,
            handler,
        }
    }

    pub fn handler(&self) -> &RedisMcpHandler {
        &self.handler
    }

    /// HTTP router: `/mcp` and `/health`
    pub fn build_router(&self, cancel: &CancellationToken) -> Router {
        let handler = self.handler.clone();
        let mcp_service = StreamableHttpService::new(
            move || {
                debug!("[Server] Creating handler instance for MCP session");
                Ok(handler.clone())
            },
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: Some(Duration::from_secs(30)),
                sse_retry: Some(Duration::from_secs(3)),
                cancellation_token: cancel.child_token(),
            },
        );

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .with_state(self.pool.clone())
            .nest_service("/mcp", mcp_service)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Run the configured transport until the client goes away (stdio) or
    /// `cancel` fires (HTTP). Pooled connections are released on exit.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let result = match self.config.transport {
            Transport::Stdio => self.run_stdio(cancel).await,
            Transport::StreamableHttp => self.run_http(cancel).await,
        };
        self.pool.close_all().await;
        result
    }

    async fn run_stdio(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!("[Server] Serving MCP over stdio");
        let service = self
            .handler
            .clone()
            .serve(rmcp::transport::stdio())
            .await
            .context("failed to start stdio MCP session")?;

        tokio::select! {
            reason = service.waiting() => {
                info!(reason = ?reason, "[Server] stdio session ended");
            }
            _ = cancel.cancelled() => {
                info!("[Server] Shutdown requested");
            }
        }
        Ok(())
    }

    async fn run_http(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let addr = self.config.addr()?;
        let router = self.build_router(&cancel);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("[Server] Serving MCP over Streamable HTTP at http://{}/mcp", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled_owned().await })
            .await?;
        Ok(())
    }
}
