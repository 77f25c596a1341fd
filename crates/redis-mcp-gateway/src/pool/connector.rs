//! Connector - opens command channels to Redis
//!
//! Two seams:
//! - [`Connector`] opens a channel for a resolved descriptor and topology
//! - [`CommandChannel`] executes commands on it, re-authenticates with fresh
//!   tokens and closes
//!
//! [`RedisConnector`] is the production implementation over the `redis`
//! crate's multiplexed (standalone) and cluster connections.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection as AsyncClusterConnection;
use redis::{
    Client, Cmd, ConnectionAddr, ConnectionInfo, ErrorKind, RedisConnectionInfo, RedisError,
    RedisResult, Value,
};
use redis_mcp_core::{branding, ConnectionDescriptor};
use tracing::debug;

use super::credential::AccessToken;
use super::error::ConnectError;
use super::tls;

/// Default time allowed for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to open one channel
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub descriptor: ConnectionDescriptor,
    pub clustered: bool,
    /// Replaces descriptor credentials when Entra ID auth is active
    pub token: Option<AccessToken>,
}

impl ConnectRequest {
    pub fn new(descriptor: ConnectionDescriptor, clustered: bool) -> Self {
        Self {
            descriptor,
            clustered,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<AccessToken>) -> Self {
        self.token = token;
        self
    }

    /// Credentials in effect: the token when present, else the descriptor's
    fn credentials(&self) -> (Option<String>, Option<String>) {
        match &self.token {
            Some(token) => (Some(token.username()), Some(token.secret().to_string())),
            None => (
                self.descriptor.username.clone(),
                self.descriptor.password().map(str::to_string),
            ),
        }
    }
}

/// A live, multiplexed path to one Redis target
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value>;

    /// Swap in fresh credentials without dropping the channel
    async fn reauthenticate(&self, token: &AccessToken) -> RedisResult<()>;

    /// Release the underlying connection; later commands fail
    async fn close(&self) -> RedisResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, request: &ConnectRequest) -> Result<Arc<dyn CommandChannel>, ConnectError>;
}

/// Error returned by channels after `close`
pub fn closed_error() -> RedisError {
    RedisError::from((ErrorKind::ClientError, "Connection closed"))
}

// ============================================================================
// Production connector
// ============================================================================

pub struct RedisConnector {
    connect_timeout: Duration,
}

impl RedisConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for RedisConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn open(&self, request: &ConnectRequest) -> Result<Arc<dyn CommandChannel>, ConnectError> {
        debug!(
            address = %request.descriptor.address(),
            clustered = request.clustered,
            tls = request.descriptor.tls.enabled,
            "[RedisConnector] Opening channel"
        );

        if request.clustered {
            let channel = ClusterChannel::open(request.clone(), self.connect_timeout).await?;
            Ok(Arc::new(channel))
        } else {
            let channel = StandaloneChannel::open(request, self.connect_timeout).await?;
            Ok(Arc::new(channel))
        }
    }
}

/// Map a descriptor (plus optional credentials) onto `redis` connection info
pub fn connection_info(
    descriptor: &ConnectionDescriptor,
    username: Option<String>,
    password: Option<String>,
) -> ConnectionInfo {
    let addr = if descriptor.tls.enabled {
        ConnectionAddr::TcpTls {
            host: descriptor.host.clone(),
            port: descriptor.port,
            insecure: descriptor.tls.cert_reqs.skips_verification(),
            tls_params: None,
        }
    } else {
        ConnectionAddr::Tcp(descriptor.host.clone(), descriptor.port)
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: descriptor.effective_db(),
            username,
            password,
            ..Default::default()
        },
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    future: impl std::future::Future<Output = RedisResult<T>>,
) -> Result<T, ConnectError> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(ConnectError::from),
        Err(_) => Err(ConnectError::timeout(format!(
            "connection not established within {}ms",
            timeout.as_millis()
        ))),
    }
}

// ============================================================================
// Standalone
// ============================================================================

struct StandaloneChannel {
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl StandaloneChannel {
    async fn open(request: &ConnectRequest, timeout: Duration) -> Result<Self, ConnectError> {
        let (username, password) = request.credentials();
        let info = connection_info(&request.descriptor, username, password);
        let client = match tls::load_certificates(&request.descriptor.tls)? {
            Some(certs) => Client::build_with_tls(info, certs)?,
            None => Client::open(info)?,
        };

        let mut conn = with_timeout(timeout, client.get_multiplexed_async_connection()).await?;
        announce_client(&mut conn).await;

        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    fn connection(&self) -> RedisResult<MultiplexedConnection> {
        self.conn.read().clone().ok_or_else(closed_error)
    }
}

#[async_trait]
impl CommandChannel for StandaloneChannel {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        let mut conn = self.connection()?;
        cmd.query_async(&mut conn).await
    }

    async fn reauthenticate(&self, token: &AccessToken) -> RedisResult<()> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("AUTH")
            .arg(token.username())
            .arg(token.secret())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn close(&self) -> RedisResult<()> {
        self.conn.write().take();
        Ok(())
    }
}

/// Best-effort `CLIENT SETINFO`, unsupported before Redis 7.2
async fn announce_client(conn: &mut MultiplexedConnection) {
    let result: RedisResult<()> = redis::cmd("CLIENT")
        .arg("SETINFO")
        .arg("LIB-NAME")
        .arg(branding::lib_name())
        .query_async(conn)
        .await;
    if let Err(e) = result {
        debug!(error = %e, "[RedisConnector] CLIENT SETINFO not accepted");
    }
}

// ============================================================================
// Cluster
// ============================================================================

/// Cluster channel; re-authentication rebuilds the client and swaps the
/// connection because credentials are fixed per cluster client.
struct ClusterChannel {
    request: ConnectRequest,
    timeout: Duration,
    conn: RwLock<Option<AsyncClusterConnection>>,
}

impl ClusterChannel {
    async fn open(request: ConnectRequest, timeout: Duration) -> Result<Self, ConnectError> {
        let (username, password) = request.credentials();
        let conn = Self::connect(&request, username, password, timeout).await?;
        Ok(Self {
            request,
            timeout,
            conn: RwLock::new(Some(conn)),
        })
    }

    async fn connect(
        request: &ConnectRequest,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<AsyncClusterConnection, ConnectError> {
        let info = connection_info(&request.descriptor, username.clone(), password.clone());
        let mut builder = ClusterClientBuilder::new(vec![info]);
        if let Some(username) = username {
            builder = builder.username(username);
        }
        if let Some(password) = password {
            builder = builder.password(password);
        }
        if let Some(certs) = tls::load_certificates(&request.descriptor.tls)? {
            builder = builder.certs(certs);
        }
        let client = builder.build()?;

        with_timeout(timeout, client.get_async_connection()).await
    }

    fn connection(&self) -> RedisResult<AsyncClusterConnection> {
        self.conn.read().clone().ok_or_else(closed_error)
    }
}

#[async_trait]
impl CommandChannel for ClusterChannel {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        let mut conn = self.connection()?;
        cmd.query_async(&mut conn).await
    }

    async fn reauthenticate(&self, token: &AccessToken) -> RedisResult<()> {
        if self.conn.read().is_none() {
            return Err(closed_error());
        }
        let fresh = Self::connect(
            &self.request,
            Some(token.username()),
            Some(token.secret().to_string()),
            self.timeout,
        )
        .await
        .map_err(|e| {
            RedisError::from((
                ErrorKind::AuthenticationFailed,
                "cluster re-authentication failed",
                e.to_string(),
            ))
        })?;

        let mut slot = self.conn.write();
        if slot.is_some() {
            *slot = Some(fresh);
        }
        Ok(())
    }

    async fn close(&self) -> RedisResult<()> {
        self.conn.write().take();
        Ok(())
    }
}
