//! Redis MCP Server
//!
//! Composition root:
//! 1. Load `.env`, parse the CLI, install tracing
//! 2. Resolve the startup connection from environment + CLI overrides
//! 3. Build the connection pool (with Entra ID credentials when configured)
//! 4. Connect the startup target in the background
//! 5. Serve MCP over the selected transport

mod cli;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use redis_mcp_core::{resolve, settings, EntraIdConfig, ResolvedConnection};
use redis_mcp_gateway::{
    ConnectionPool, EntraIdProviderFactory, McpServer, RedisConnector, ServerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guards = match logging::init_tracing(cli.log_dir.as_deref()) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[Main] {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "[Main] Starting the Redis MCP Server");

    // Fatal: an unusable startup target (e.g. unsupported URI scheme)
    let params = settings::connection_params_from_env().overlay(cli.connection_params());
    let startup = resolve(&params)?;

    let entra = settings::entra_config_from_env();
    let pool = Arc::new(build_pool(entra)?);

    spawn_startup_connection(pool.clone(), startup);

    let config = ServerConfig {
        transport: cli.transport,
        host: cli.http_host.clone(),
        port: cli.http_port,
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    McpServer::new(config, pool).run(cancel).await
}

fn build_pool(entra: EntraIdConfig) -> anyhow::Result<ConnectionPool> {
    let pool = ConnectionPool::new(Arc::new(RedisConnector::new()));
    if !entra.is_enabled() {
        return Ok(pool);
    }

    entra
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid Entra ID configuration: {}", e))?;
    info!(
        auth_flow = entra.auth_flow.as_deref().unwrap_or(""),
        "[Main] Entra ID authentication enabled"
    );
    Ok(pool.with_credentials(entra, Arc::new(EntraIdProviderFactory::new())))
}

/// Connect the configured target without blocking startup; failures are
/// logged and `connect` remains available.
fn spawn_startup_connection(pool: Arc<ConnectionPool>, startup: ResolvedConnection) {
    tokio::spawn(async move {
        let ResolvedConnection {
            host_id,
            descriptor,
        } = startup;
        match pool.add(&host_id, descriptor).await {
            Ok(message) => info!(host_id = %host_id, "[Main] {}", message),
            Err(e) => warn!(
                host_id = %host_id,
                error = %e,
                "[Main] Startup connection failed; use the connect tool to retry"
            ),
        }
    });
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[Main] Ctrl-C received, shutting down");
            cancel.cancel();
        }
    });
}
