//! RedisJSON tools: json_set, json_get, json_del

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{apply_expiry, data_definition, expiry_suffix, failure, handle, parse, Outcome, ToolError};
use crate::pool::{ConnectionPool, ReplyMode};

fn default_path() -> String {
    "$".to_string()
}

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "json_set",
            "Set a JSON value in Redis at a given path with an optional expiration time. \
             String values that parse as JSON are stored as JSON, anything else as a JSON string.",
            json!({
                "name": {"type": "string", "description": "Key of the JSON document"},
                "path": {"type": "string", "description": "JSONPath, e.g. $ or $.field"},
                "value": {"description": "JSON value to store"},
                "expire_seconds": {"type": "integer"}
            }),
            &["name", "path", "value"],
        ),
        data_definition(
            "json_get",
            "Retrieve a JSON value from Redis at a given path.",
            json!({
                "name": {"type": "string"},
                "path": {"type": "string", "default": "$"}
            }),
            &["name"],
        ),
        data_definition(
            "json_del",
            "Delete a JSON value from Redis at a given path.",
            json!({
                "name": {"type": "string"},
                "path": {"type": "string", "default": "$"}
            }),
            &["name"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct JsonSetArgs {
    name: String,
    path: String,
    value: Value,
    #[serde(default)]
    expire_seconds: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonPathArgs {
    name: String,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "json_set" => Ok(json_set(pool, parse(arguments)?).await),
        "json_get" => Ok(json_get(pool, parse(arguments)?).await),
        "json_del" => Ok(json_del(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

/// Document text for JSON.SET. A string argument holding valid JSON is
/// taken as that JSON; any other string is stored as a JSON string.
pub(crate) fn document_text(value: &Value) -> String {
    match value {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => value.to_string(),
        },
        other => other.to_string(),
    }
}

async fn json_set(pool: &ConnectionPool, args: JsonSetArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let context = || format!("Error setting JSON value at path '{}' in '{}'", args.path, args.name);

    conn.execute(
        redis::cmd("JSON.SET")
            .arg(&args.name)
            .arg(&args.path)
            .arg(document_text(&args.value)),
    )
    .await
    .map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.name, args.expire_seconds)
        .await
        .map_err(|e| failure(context(), e))?;

    Ok(format!(
        "JSON value set at path '{}' in '{}'.{}",
        args.path,
        args.name,
        expiry_suffix(args.expire_seconds)
    ))
}

async fn json_get(pool: &ConnectionPool, args: JsonPathArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let raw: Option<String> = conn
        .query_as(redis::cmd("JSON.GET").arg(&args.name).arg(&args.path))
        .await
        .map_err(|e| failure(format!("Error retrieving JSON value at path '{}' in '{}'", args.path, args.name), e))?;

    let not_found = || format!("No data found at path '{}' in '{}'.", args.path, args.name);
    let Some(raw) = raw else {
        return Ok(not_found());
    };

    match serde_json::from_str::<Value>(&raw) {
        // JSONPath replies wrap matches in an array
        Ok(Value::Array(matches)) if args.path.starts_with('$') => match matches.len() {
            0 => Ok(not_found()),
            1 => Ok(pretty(&matches[0])),
            _ => Ok(pretty(&Value::Array(matches))),
        },
        Ok(value) => Ok(pretty(&value)),
        Err(_) => Ok(raw),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

async fn json_del(pool: &ConnectionPool, args: JsonPathArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let deleted: i64 = conn
        .query_as(redis::cmd("JSON.DEL").arg(&args.name).arg(&args.path))
        .await
        .map_err(|e| failure(format!("Error deleting JSON value at path '{}' in '{}'", args.path, args.name), e))?;

    Ok(if deleted > 0 {
        format!("Deleted JSON value at path '{}' in '{}'.", args.path, args.name)
    } else {
        format!("No JSON value found at path '{}' in '{}'.", args.path, args.name)
    })
}
