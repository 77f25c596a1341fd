//! Connection handles
//!
//! A [`RedisHandle`] wraps one command channel with a reply mode and an
//! in-flight ceiling. The pool keeps two per host:
//! - `Decoded`: bulk strings come back as text
//! - `Raw`: bulk strings come back as bytes (vectors, binary blobs)

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use redis::{Cmd, FromRedisValue, RedisResult, Value};
use redis_mcp_core::MAX_CONNECTIONS_PER_HANDLE;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;

use super::connector::{closed_error, CommandChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    Decoded,
    Raw,
}

impl ReplyMode {
    pub const ALL: [ReplyMode; 2] = [ReplyMode::Decoded, ReplyMode::Raw];
}

/// Backend reply normalized for the tool layer
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Ok,
    Int(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Reply>),
    Map(Vec<(Reply, Reply)>),
}

impl Reply {
    pub fn from_value(value: Value, mode: ReplyMode) -> Reply {
        match value {
            Value::Nil => Reply::Nil,
            Value::Okay => Reply::Ok,
            Value::Int(i) => Reply::Int(i),
            Value::Double(d) => Reply::Double(d),
            Value::Boolean(b) => Reply::Bool(b),
            Value::SimpleString(s) => Reply::Text(s),
            Value::VerbatimString { text, .. } => Reply::Text(text),
            Value::BulkString(bytes) => match mode {
                ReplyMode::Decoded => Reply::Text(String::from_utf8_lossy(&bytes).into_owned()),
                ReplyMode::Raw => Reply::Bytes(bytes),
            },
            Value::Array(items) | Value::Set(items) => Reply::Array(
                items
                    .into_iter()
                    .map(|item| Reply::from_value(item, mode))
                    .collect(),
            ),
            Value::Map(pairs) => Reply::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Reply::from_value(k, mode), Reply::from_value(v, mode)))
                    .collect(),
            ),
            other => Reply::Text(format!("{:?}", other)),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(s) => Some(s),
            Reply::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(i) => Some(*i),
            Reply::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Key/value pairs of a map reply, or of a flat `[k, v, k, v]` array
    pub fn pairs(&self) -> Vec<(&Reply, &Reply)> {
        match self {
            Reply::Map(pairs) => pairs.iter().map(|(k, v)| (k, v)).collect(),
            Reply::Array(items) => items.chunks_exact(2).map(|c| (&c[0], &c[1])).collect(),
            _ => Vec::new(),
        }
    }

    /// Textual form used for JSON object keys
    pub fn key_string(&self) -> String {
        match self {
            Reply::Text(s) => s.clone(),
            Reply::Int(i) => i.to_string(),
            Reply::Double(d) => d.to_string(),
            Reply::Bool(b) => b.to_string(),
            Reply::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            other => other.to_json().to_string(),
        }
    }

    /// JSON rendering; non-UTF-8 bytes become base64 strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Reply::Nil => serde_json::Value::Null,
            Reply::Ok => json!("OK"),
            Reply::Int(i) => json!(i),
            Reply::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Reply::Bool(b) => json!(b),
            Reply::Text(s) => json!(s),
            Reply::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => json!(s),
                Err(_) => json!(STANDARD.encode(b)),
            },
            Reply::Array(items) => {
                serde_json::Value::Array(items.iter().map(Reply::to_json).collect())
            }
            Reply::Map(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.key_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// One decoding or raw handle onto a pooled host
pub struct RedisHandle {
    host_id: String,
    mode: ReplyMode,
    channel: Arc<dyn CommandChannel>,
    permits: Semaphore,
}

impl RedisHandle {
    pub fn new(host_id: impl Into<String>, mode: ReplyMode, channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            host_id: host_id.into(),
            mode,
            channel,
            permits: Semaphore::new(MAX_CONNECTIONS_PER_HANDLE),
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        &self.channel
    }

    /// Execute with the in-flight ceiling applied
    pub async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        let _permit = self.permits.acquire().await.map_err(|_| closed_error())?;
        self.channel.execute(cmd).await
    }

    /// Execute and normalize according to this handle's mode
    pub async fn query(&self, cmd: &Cmd) -> RedisResult<Reply> {
        let value = self.execute(cmd).await?;
        Ok(Reply::from_value(value, self.mode))
    }

    /// Execute and convert with the `redis` crate's typed conversions
    pub async fn query_as<T: FromRedisValue>(&self, cmd: &Cmd) -> RedisResult<T> {
        let value = self.execute(cmd).await?;
        redis::from_redis_value(&value)
    }

    pub async fn ping(&self) -> RedisResult<()> {
        self.execute(&redis::cmd("PING")).await.map(|_| ())
    }

    /// Stop accepting commands and close the channel
    pub async fn close(&self) -> RedisResult<()> {
        self.permits.close();
        self.channel.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

impl std::fmt::Debug for RedisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisHandle")
            .field("host_id", &self.host_id)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}
