//! Test: Redis MCP server over stateful Streamable HTTP
//!
//! Validates that:
//! 1. An rmcp client can initialize a session and list the tool catalogue
//! 2. Tool calls reach the pool and return text content
//! 3. Unknown tools surface as protocol errors
//! 4. `/health` reports pool state

use std::sync::Arc;

use redis_mcp_gateway::{ConnectionPool, McpServer, ServerConfig, Transport};
use rmcp::{
    model::*,
    service::RunningService,
    transport::StreamableHttpClientTransport,
    RoleClient, ServiceExt,
};
use serde_json::json;
use tests::fixtures::fake_pool;
use tests::FakeConnector;
use tokio_util::sync::CancellationToken;

/// Serve the router on a random port; returns the base URL
async fn start_test_server(pool: Arc<ConnectionPool>) -> (String, CancellationToken) {
    let ct = CancellationToken::new();
    let config = ServerConfig {
        transport: Transport::StreamableHttp,
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_cors: false,
    };
    let router = McpServer::new(config, pool).build_router(&ct);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { ct_clone.cancelled().await })
            .await
            .unwrap();
    });

    // Give server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base, ct)
}

async fn connect_client(base: &str) -> RunningService<RoleClient, ClientInfo> {
    let transport = StreamableHttpClientTransport::from_uri(format!("{}/mcp", base));
    ClientInfo {
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
    .serve(transport)
    .await
    .expect("client should connect")
}

fn call(name: &str, arguments: serde_json::Value) -> CallToolRequestParams {
    CallToolRequestParams {
        name: name.to_string().into(),
        arguments: arguments.as_object().cloned(),
        task: None,
        meta: None,
    }
}

fn first_text(result: &CallToolResult) -> String {
    result
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_lists_tools() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    let (base, ct) = start_test_server(pool).await;
    let client = connect_client(&base).await;

    let server_info = client.peer_info().expect("server info after initialize");
    assert_eq!(server_info.server_info.name, "redis-mcp-server");
    assert!(server_info.instructions.is_some());

    let tools = client
        .list_tools(Default::default())
        .await
        .expect("list_tools should work");
    let names: Vec<&str> = tools.tools.iter().map(|t| t.name.as_ref()).collect();
    assert!(names.contains(&"connect"));
    assert!(names.contains(&"vector_search_hash"));

    // Cleanup
    client.cancel().await.ok();
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_calls_reach_the_pool() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    let (base, ct) = start_test_server(pool.clone()).await;
    let client = connect_client(&base).await;

    let connected = client
        .call_tool(call("connect", json!({"host": "10.0.0.1", "host_id": "primary"})))
        .await
        .expect("connect should succeed");
    assert!(first_text(&connected).contains("Host identifier: 'primary'"));
    assert_eq!(pool.default_host().as_deref(), Some("primary"));

    client
        .call_tool(call("set", json!({"key": "k", "value": "v"})))
        .await
        .expect("set should succeed");
    let fetched = client
        .call_tool(call("get", json!({"key": "k"})))
        .await
        .expect("get should succeed");
    assert_eq!(first_text(&fetched), "v");
    assert_ne!(fetched.is_error, Some(true));

    client.cancel().await.ok();
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_tool_is_protocol_error() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    let (base, ct) = start_test_server(pool).await;
    let client = connect_client(&base).await;

    let result = client.call_tool(call("flushall", json!({}))).await;

    assert!(result.is_err());

    client.cancel().await.ok();
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_reports_pool_state() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add(
        "primary",
        tests::fixtures::standalone_descriptor("10.0.0.1", 6379),
    )
    .await
    .unwrap();
    let (base, ct) = start_test_server(pool).await;

    let body: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["default_connection"], "primary");

    ct.cancel();
}
