//! Stream tools

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    apply_expiry, data_definition, failure, handle, json_text, parse, scalar_text, Outcome,
    ToolError,
};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "xadd",
            "Add an entry to a Redis stream with an optional expiration time.",
            json!({
                "key": {"type": "string"},
                "fields": {"type": "object", "description": "Field/value pairs of the entry"},
                "expiration": {"type": "integer", "description": "Expiration in seconds"}
            }),
            &["key", "fields"],
        ),
        data_definition(
            "xrange",
            "Read entries from a Redis stream, oldest first.",
            json!({
                "key": {"type": "string"},
                "count": {"type": "integer", "default": 1}
            }),
            &["key"],
        ),
        data_definition(
            "xdel",
            "Delete an entry from a Redis stream.",
            json!({
                "key": {"type": "string"},
                "entry_id": {"type": "string"}
            }),
            &["key", "entry_id"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct XaddArgs {
    key: String,
    fields: Map<String, Value>,
    #[serde(default)]
    expiration: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

fn default_count() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
struct XrangeArgs {
    key: String,
    #[serde(default = "default_count")]
    count: u64,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XdelArgs {
    key: String,
    entry_id: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "xadd" => Ok(xadd(pool, parse(arguments)?).await),
        "xrange" => Ok(xrange(pool, parse(arguments)?).await),
        "xdel" => Ok(xdel(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn xadd(pool: &ConnectionPool, args: XaddArgs) -> Outcome {
    if args.fields.is_empty() {
        return Err(format!("Error adding to stream {}: no fields given", args.key));
    }
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let context = || format!("Error adding to stream {}", args.key);

    let mut cmd = redis::cmd("XADD");
    cmd.arg(&args.key).arg("*");
    for (field, value) in &args.fields {
        cmd.arg(field).arg(scalar_text(value));
    }
    let entry_id: String = conn.query_as(&cmd).await.map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.key, args.expiration)
        .await
        .map_err(|e| failure(context(), e))?;

    let mut message = format!("Successfully added entry {} to {}", entry_id, args.key);
    if let Some(seconds) = args.expiration.filter(|s| *s > 0) {
        message.push_str(&format!(" with expiration {} seconds", seconds));
    }
    Ok(message)
}

async fn xrange(pool: &ConnectionPool, args: XrangeArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(
            redis::cmd("XRANGE")
                .arg(&args.key)
                .arg("-")
                .arg("+")
                .arg("COUNT")
                .arg(args.count),
        )
        .await
        .map_err(|e| failure(format!("Error reading from stream {}", args.key), e))?;

    let entries = stream_entries(&reply);
    if entries.is_empty() {
        return Ok(format!("Stream {} is empty or does not exist", args.key));
    }
    Ok(json_text(&Value::Array(entries)))
}

/// `[[id, [f, v, ...]], ...]` into `[{"id": .., "fields": {..}}, ...]`
fn stream_entries(reply: &Reply) -> Vec<Value> {
    let Reply::Array(items) = reply else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Reply::Array(parts) if parts.len() == 2 => {
                let fields: Map<String, Value> = parts[1]
                    .pairs()
                    .into_iter()
                    .map(|(k, v)| (k.key_string(), v.to_json()))
                    .collect();
                Some(json!({"id": parts[0].key_string(), "fields": fields}))
            }
            _ => None,
        })
        .collect()
}

async fn xdel(pool: &ConnectionPool, args: XdelArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let deleted: i64 = conn
        .query_as(redis::cmd("XDEL").arg(&args.key).arg(&args.entry_id))
        .await
        .map_err(|e| failure(format!("Error deleting from stream {}", args.key), e))?;

    Ok(if deleted > 0 {
        format!("Successfully deleted entry {} from {}", args.entry_id, args.key)
    } else {
        format!("Entry {} not found in {}", args.entry_id, args.key)
    })
}
