//! Tool Dispatch - MCP tools over the connection pool
//!
//! Every tool is described by a raw JSON definition (name, description,
//! input schema) and dispatched by name to its family module. Tools are
//! thin: they parse arguments, pick a handle from the pool and translate
//! one or two Redis commands.
//!
//! Error policy:
//! - malformed arguments -> [`ToolError::InvalidArguments`] (protocol error)
//! - pool and backend failures -> plain text result

mod connection;
mod hash;
mod json;
mod list;
mod misc;
mod pubsub;
mod search;
mod server;
mod set;
mod sorted_set;
mod stream;
mod string;

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use rmcp::model::{JsonObject, Tool};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::pool::{ConnectionPool, RedisHandle, ReplyMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Text produced by a tool; `Err` carries a failure message that is still
/// delivered to the caller as a normal result.
pub(crate) type Outcome = Result<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Connection,
    Server,
    Misc,
    String,
    Hash,
    List,
    Set,
    SortedSet,
    Stream,
    Json,
    PubSub,
    Search,
}

impl Family {
    const ALL: [Family; 12] = [
        Family::Connection,
        Family::Server,
        Family::Misc,
        Family::String,
        Family::Hash,
        Family::List,
        Family::Set,
        Family::SortedSet,
        Family::Stream,
        Family::Json,
        Family::PubSub,
        Family::Search,
    ];

    fn definitions(self) -> Vec<Value> {
        match self {
            Family::Connection => connection::definitions(),
            Family::Server => server::definitions(),
            Family::Misc => misc::definitions(),
            Family::String => string::definitions(),
            Family::Hash => hash::definitions(),
            Family::List => list::definitions(),
            Family::Set => set::definitions(),
            Family::SortedSet => sorted_set::definitions(),
            Family::Stream => stream::definitions(),
            Family::Json => json::definitions(),
            Family::PubSub => pubsub::definitions(),
            Family::Search => search::definitions(),
        }
    }
}

/// Tool catalog bound to one pool
pub struct ToolRegistry {
    pool: Arc<ConnectionPool>,
    tools: Vec<Tool>,
    families: HashMap<String, Family>,
}

impl ToolRegistry {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        let mut tools = Vec::new();
        let mut families = HashMap::new();

        for family in Family::ALL {
            for definition in family.definitions() {
                match serde_json::from_value::<Tool>(definition) {
                    Ok(tool) => {
                        families.insert(tool.name.to_string(), family);
                        tools.push(tool);
                    }
                    Err(e) => warn!(error = %e, "[ToolRegistry] Skipping malformed tool definition"),
                }
            }
        }

        Self {
            pool,
            tools,
            families,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    /// Run `name` with `arguments`, returning the text result
    pub async fn call(&self, name: &str, arguments: JsonObject) -> Result<String, ToolError> {
        let family = self
            .families
            .get(name)
            .copied()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let pool = self.pool.as_ref();

        let outcome = match family {
            Family::Connection => connection::call(pool, name, arguments).await?,
            Family::Server => server::call(pool, name, arguments).await?,
            Family::Misc => misc::call(pool, name, arguments).await?,
            Family::String => string::call(pool, name, arguments).await?,
            Family::Hash => hash::call(pool, name, arguments).await?,
            Family::List => list::call(pool, name, arguments).await?,
            Family::Set => set::call(pool, name, arguments).await?,
            Family::SortedSet => sorted_set::call(pool, name, arguments).await?,
            Family::Stream => stream::call(pool, name, arguments).await?,
            Family::Json => json::call(pool, name, arguments).await?,
            Family::PubSub => pubsub::call(pool, name, arguments).await?,
            Family::Search => search::call(pool, name, arguments).await?,
        };

        Ok(outcome.unwrap_or_else(|failure| failure))
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Deserialize tool arguments into a typed struct
pub(crate) fn parse<T: DeserializeOwned>(arguments: JsonObject) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Raw tool definition
pub(crate) fn definition(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Definition of a data tool; adds the optional `host_id` property
pub(crate) fn data_definition(
    name: &str,
    description: &str,
    mut properties: Value,
    required: &[&str],
) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "host_id".to_string(),
            json!({
                "type": "string",
                "description": "Redis connection identifier. Uses the default connection when omitted."
            }),
        );
    }
    definition(name, description, properties, required)
}

/// Pool handle for a data tool, with pool failures rendered as text
pub(crate) fn handle(
    pool: &ConnectionPool,
    host_id: Option<&str>,
    mode: ReplyMode,
) -> Result<Arc<RedisHandle>, String> {
    pool.get(host_id, mode).map_err(|e| e.to_string())
}

/// `"{context}: {error}"` failure text
pub(crate) fn failure(context: impl Display, error: impl Display) -> String {
    format!("{}: {}", context, error)
}

/// Compact JSON text for structured results
pub(crate) fn json_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Scalar argument as the text sent to Redis: strings verbatim, everything
/// else in JSON form
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `" Expires in N seconds."` suffix used by write tools
pub(crate) fn expiry_suffix(seconds: Option<i64>) -> String {
    match seconds {
        Some(s) if s > 0 => format!(" Expires in {} seconds.", s),
        _ => String::new(),
    }
}

/// Apply EXPIRE after a write when requested
pub(crate) async fn apply_expiry(
    handle: &RedisHandle,
    key: &str,
    seconds: Option<i64>,
) -> redis::RedisResult<()> {
    if let Some(seconds) = seconds.filter(|s| *s > 0) {
        handle.execute(redis::cmd("EXPIRE").arg(key).arg(seconds)).await?;
    }
    Ok(())
}

/// Float32 little-endian blob
pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]; trailing partial floats are dropped
pub(crate) fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
