//! String tools: set, get

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{data_definition, failure, handle, parse, scalar_text, Outcome, ToolError};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "set",
            "Set a Redis string value with an optional expiration time. Objects are stored as JSON text.",
            json!({
                "key": {"type": "string"},
                "value": {"description": "Value to store (string, number or object)"},
                "expiration": {"type": "integer", "description": "Expiration in seconds"}
            }),
            &["key", "value"],
        ),
        data_definition(
            "get",
            "Get a Redis string value.",
            json!({"key": {"type": "string"}}),
            &["key"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct SetArgs {
    key: String,
    value: Value,
    #[serde(default)]
    expiration: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetArgs {
    key: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "set" => Ok(set(pool, parse(arguments)?).await),
        "get" => Ok(get(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn set(pool: &ConnectionPool, args: SetArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let value = scalar_text(&args.value);
    let expiration = args.expiration.filter(|s| *s > 0);

    let mut cmd = redis::cmd("SET");
    cmd.arg(&args.key).arg(value);
    if let Some(seconds) = expiration {
        cmd.arg("EX").arg(seconds);
    }
    conn.execute(&cmd)
        .await
        .map_err(|e| failure(format!("Error setting key {}", args.key), e))?;

    Ok(match expiration {
        Some(seconds) => format!(
            "Successfully set {} with expiration {} seconds",
            args.key, seconds
        ),
        None => format!("Successfully set {}", args.key),
    })
}

/// Reads through the raw handle so binary values survive (rendered base64)
async fn get(pool: &ConnectionPool, args: GetArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Raw)?;
    let reply = conn
        .query(redis::cmd("GET").arg(&args.key))
        .await
        .map_err(|e| failure(format!("Error retrieving key {}", args.key), e))?;

    Ok(match reply {
        Reply::Nil => format!("Key {} does not exist", args.key),
        other => match other.to_json() {
            Value::String(text) => text,
            value => value.to_string(),
        },
    })
}
