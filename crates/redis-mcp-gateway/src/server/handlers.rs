//! HTTP handlers outside the MCP endpoint

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;

use crate::pool::ConnectionPool;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
    pub default_connection: Option<String>,
}

/// Health check endpoint
pub async fn health(State(pool): State<Arc<ConnectionPool>>) -> Json<HealthResponse> {
    debug!("[Server] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: pool.len(),
        default_connection: pool.default_host(),
    })
}
