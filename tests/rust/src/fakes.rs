//! In-process Redis and Entra ID stand-ins
//!
//! `FakeConnector` hands out `FakeChannel`s that answer the handful of
//! commands the pool and the MCP tests issue, backed by one shared keyspace.
//! Every opened channel is recorded so tests can assert on handle reuse,
//! release and re-authentication.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use redis::{Arg, Cmd, ErrorKind, RedisError, RedisResult, Value};
use redis_mcp_core::EntraIdConfig;
use redis_mcp_gateway::pool::{
    closed_error, AccessToken, CommandChannel, ConnectError, ConnectRequest, Connector,
    CredentialError, CredentialProvider, CredentialProviderFactory, FailureCategory,
};

/// Version reported by `INFO server`
pub const FAKE_REDIS_VERSION: &str = "7.2.4";

/// How the fake answers `INFO cluster`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterReply {
    #[default]
    Disabled,
    Enabled,
    /// Servers built without cluster support reject the section outright
    SupportDisabled,
}

type Keyspace = Arc<Mutex<HashMap<String, Vec<u8>>>>;

// ============================================================================
// FakeChannel
// ============================================================================

pub struct FakeChannel {
    pub id: usize,
    cluster: ClusterReply,
    fail_ping: bool,
    keyspace: Keyspace,
    closed: AtomicBool,
    commands: Mutex<Vec<Vec<String>>>,
    reauth_tokens: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every command executed, as words
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    /// Secrets of the tokens this channel re-authenticated with
    pub fn reauth_tokens(&self) -> Vec<String> {
        self.reauth_tokens.lock().clone()
    }

    fn reply(&self, words: &[String]) -> RedisResult<Value> {
        let name = words.first().map(|w| w.to_ascii_uppercase()).unwrap_or_default();
        let arg = |i: usize| words.get(i).cloned().unwrap_or_default();

        match name.as_str() {
            "PING" if self.fail_ping => Err(RedisError::from((
                ErrorKind::AuthenticationFailed,
                "WRONGPASS invalid username-password pair",
            ))),
            "PING" => Ok(Value::SimpleString("PONG".to_string())),
            "INFO" if arg(1).eq_ignore_ascii_case("cluster") => match self.cluster {
                ClusterReply::Enabled => Ok(bulk("# Cluster\r\ncluster_enabled:1\r\n")),
                ClusterReply::Disabled => Ok(bulk("# Cluster\r\ncluster_enabled:0\r\n")),
                ClusterReply::SupportDisabled => Err(RedisError::from((
                    ErrorKind::ResponseError,
                    "ERR This instance has cluster support disabled",
                ))),
            },
            "INFO" => Ok(bulk(&format!(
                "# Server\r\nredis_version:{}\r\nredis_mode:standalone\r\n",
                FAKE_REDIS_VERSION
            ))),
            "SET" => {
                self.keyspace.lock().insert(arg(1), arg(2).into_bytes());
                Ok(Value::Okay)
            }
            "GET" => Ok(self
                .keyspace
                .lock()
                .get(&arg(1))
                .map(|v| Value::BulkString(v.clone()))
                .unwrap_or(Value::Nil)),
            "DEL" => {
                let mut keyspace = self.keyspace.lock();
                let removed = words[1..]
                    .iter()
                    .filter(|key| keyspace.remove(key.as_str()).is_some())
                    .count();
                Ok(Value::Int(removed as i64))
            }
            "DBSIZE" => Ok(Value::Int(self.keyspace.lock().len() as i64)),
            "EXPIRE" | "CLIENT" | "SELECT" => Ok(Value::Okay),
            _ => Err(RedisError::from((ErrorKind::ResponseError, "ERR unknown command"))),
        }
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let words = words(cmd);
        self.commands.lock().push(words.clone());
        self.reply(&words)
    }

    async fn reauthenticate(&self, token: &AccessToken) -> RedisResult<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.reauth_tokens.lock().push(token.secret().to_string());
        Ok(())
    }

    async fn close(&self) -> RedisResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn bulk(text: &str) -> Value {
    Value::BulkString(text.as_bytes().to_vec())
}

/// Command words as UTF-8 (lossy) strings
pub fn words(cmd: &Cmd) -> Vec<String> {
    cmd.args_iter()
        .map(|arg| match arg {
            Arg::Simple(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Arg::Cursor => "0".to_string(),
        })
        .collect()
}

// ============================================================================
// FakeConnector
// ============================================================================

#[derive(Default)]
pub struct FakeConnector {
    cluster: ClusterReply,
    /// Opens allowed before every further open fails
    open_limit: Option<usize>,
    /// Channel ids (1-based, in open order) whose PING fails
    failing_pings: Vec<usize>,
    refuse: AtomicBool,
    opened: AtomicUsize,
    keyspace: Keyspace,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
    requests: Mutex<Vec<ConnectRequest>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, cluster: ClusterReply) -> Self {
        self.cluster = cluster;
        self
    }

    /// Refuse every open after the first `opens`
    pub fn with_open_limit(mut self, opens: usize) -> Self {
        self.open_limit = Some(opens);
        self
    }

    pub fn with_failing_ping(mut self, channel_id: usize) -> Self {
        self.failing_pings.push(channel_id);
        self
    }

    /// Toggle refusing every open (a server that went away)
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> Vec<Arc<FakeChannel>> {
        self.channels.lock().clone()
    }

    pub fn channel(&self, id: usize) -> Option<Arc<FakeChannel>> {
        self.channels.lock().iter().find(|c| c.id == id).cloned()
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().clone()
    }

    /// Channels still open
    pub fn live_channels(&self) -> usize {
        self.channels.lock().iter().filter(|c| !c.is_closed()).count()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, request: &ConnectRequest) -> Result<Arc<dyn CommandChannel>, ConnectError> {
        self.requests.lock().push(request.clone());

        let exhausted = self
            .open_limit
            .map(|limit| self.opened() >= limit)
            .unwrap_or(false);
        if exhausted || self.refuse.load(Ordering::SeqCst) {
            return Err(ConnectError::Backend {
                category: FailureCategory::ConnectionRefused,
                message: format!("Connection refused ({})", request.descriptor.address()),
            });
        }

        let id = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let channel = Arc::new(FakeChannel {
            id,
            cluster: self.cluster,
            fail_ping: self.failing_pings.contains(&id),
            keyspace: self.keyspace.clone(),
            closed: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            reauth_tokens: Mutex::new(Vec::new()),
        });
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Issues `token-1`, `token-2`, ... without leaving the process
pub struct FakeCredentialProvider {
    issued: AtomicUsize,
    lifetime: chrono::Duration,
    refresh_after: chrono::Duration,
    fail: bool,
}

#[async_trait]
impl CredentialProvider for FakeCredentialProvider {
    async fn acquire_token(&self) -> Result<AccessToken, CredentialError> {
        if self.fail {
            return Err(CredentialError::Request("HTTP 401 - invalid_client".to_string()));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(format!("token-{}", n), Utc::now() + self.lifetime))
    }

    fn refresh_at(&self, token: &AccessToken) -> DateTime<Utc> {
        token.received_at() + self.refresh_after
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(10)
    }
}

pub struct FakeCredentialFactory {
    refresh_after: chrono::Duration,
    fail: bool,
    created: AtomicUsize,
}

impl FakeCredentialFactory {
    /// Tokens valid for an hour, refreshed after `refresh_after`
    pub fn new(refresh_after: chrono::Duration) -> Self {
        Self {
            refresh_after,
            fail: false,
            created: AtomicUsize::new(0),
        }
    }

    /// Every token request is rejected
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(chrono::Duration::hours(1))
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl CredentialProviderFactory for FakeCredentialFactory {
    fn create(&self, config: &EntraIdConfig) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
        config.validate().map_err(CredentialError::Configuration)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeCredentialProvider {
            issued: AtomicUsize::new(0),
            lifetime: chrono::Duration::hours(1),
            refresh_after: self.refresh_after,
            fail: self.fail,
        }))
    }
}
