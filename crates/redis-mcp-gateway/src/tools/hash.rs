//! Hash tools, including float32 vector storage in hash fields

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    apply_expiry, data_definition, decode_vector, encode_vector, expiry_suffix, failure, handle,
    json_text, parse, scalar_text, Outcome, ToolError,
};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

const DEFAULT_VECTOR_FIELD: &str = "vector";

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "hset",
            "Set a field in a hash stored at key with an optional expiration time.",
            json!({
                "name": {"type": "string", "description": "Hash key"},
                "key": {"type": "string", "description": "Field name"},
                "value": {"description": "Field value (string or number)"},
                "expire_seconds": {"type": "integer"}
            }),
            &["name", "key", "value"],
        ),
        data_definition(
            "hget",
            "Get the value of a field in a Redis hash.",
            json!({
                "name": {"type": "string"},
                "key": {"type": "string"}
            }),
            &["name", "key"],
        ),
        data_definition(
            "hdel",
            "Delete a field from a Redis hash.",
            json!({
                "name": {"type": "string"},
                "key": {"type": "string"}
            }),
            &["name", "key"],
        ),
        data_definition(
            "hgetall",
            "Get all fields and values from a Redis hash.",
            json!({"name": {"type": "string"}}),
            &["name"],
        ),
        data_definition(
            "hexists",
            "Check if a field exists in a Redis hash.",
            json!({
                "name": {"type": "string"},
                "key": {"type": "string"}
            }),
            &["name", "key"],
        ),
        data_definition(
            "set_vector_in_hash",
            "Store a vector as a float32 binary field in a Redis hash.",
            json!({
                "name": {"type": "string"},
                "vector": {"type": "array", "items": {"type": "number"}},
                "vector_field": {"type": "string", "default": DEFAULT_VECTOR_FIELD}
            }),
            &["name", "vector"],
        ),
        data_definition(
            "get_vector_from_hash",
            "Retrieve a float32 vector stored in a Redis hash field.",
            json!({
                "name": {"type": "string"},
                "vector_field": {"type": "string", "default": DEFAULT_VECTOR_FIELD}
            }),
            &["name"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct HsetArgs {
    name: String,
    key: String,
    value: Value,
    #[serde(default)]
    expire_seconds: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FieldArgs {
    name: String,
    key: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HashArgs {
    name: String,
    #[serde(default)]
    host_id: Option<String>,
}

fn default_vector_field() -> String {
    DEFAULT_VECTOR_FIELD.to_string()
}

#[derive(Debug, Deserialize)]
struct SetVectorArgs {
    name: String,
    vector: Vec<f32>,
    #[serde(default = "default_vector_field")]
    vector_field: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetVectorArgs {
    name: String,
    #[serde(default = "default_vector_field")]
    vector_field: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "hset" => Ok(hset(pool, parse(arguments)?).await),
        "hget" => Ok(hget(pool, parse(arguments)?).await),
        "hdel" => Ok(hdel(pool, parse(arguments)?).await),
        "hgetall" => Ok(hgetall(pool, parse(arguments)?).await),
        "hexists" => Ok(hexists(pool, parse(arguments)?).await),
        "set_vector_in_hash" => Ok(set_vector(pool, parse(arguments)?).await),
        "get_vector_from_hash" => Ok(get_vector(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn hset(pool: &ConnectionPool, args: HsetArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let context = || format!("Error setting field '{}' in hash '{}'", args.key, args.name);

    conn.execute(
        redis::cmd("HSET")
            .arg(&args.name)
            .arg(&args.key)
            .arg(scalar_text(&args.value)),
    )
    .await
    .map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.name, args.expire_seconds)
        .await
        .map_err(|e| failure(context(), e))?;

    Ok(format!(
        "Field '{}' set successfully in hash '{}'.{}",
        args.key,
        args.name,
        expiry_suffix(args.expire_seconds)
    ))
}

async fn hget(pool: &ConnectionPool, args: FieldArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let value: Option<String> = conn
        .query_as(redis::cmd("HGET").arg(&args.name).arg(&args.key))
        .await
        .map_err(|e| failure(format!("Error getting field '{}' from hash '{}'", args.key, args.name), e))?;

    Ok(value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("Field '{}' not found in hash '{}'.", args.key, args.name)))
}

async fn hdel(pool: &ConnectionPool, args: FieldArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let deleted: i64 = conn
        .query_as(redis::cmd("HDEL").arg(&args.name).arg(&args.key))
        .await
        .map_err(|e| failure(format!("Error deleting field '{}' from hash '{}'", args.key, args.name), e))?;

    Ok(if deleted > 0 {
        format!("Field '{}' deleted from hash '{}'.", args.key, args.name)
    } else {
        format!("Field '{}' not found in hash '{}'.", args.key, args.name)
    })
}

async fn hgetall(pool: &ConnectionPool, args: HashArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(redis::cmd("HGETALL").arg(&args.name))
        .await
        .map_err(|e| failure(format!("Error getting all fields from hash '{}'", args.name), e))?;

    let pairs = reply.pairs();
    if pairs.is_empty() {
        return Ok(format!("Hash '{}' is empty or does not exist.", args.name));
    }
    let object: serde_json::Map<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k.key_string(), v.to_json()))
        .collect();
    Ok(json_text(&Value::Object(object)))
}

async fn hexists(pool: &ConnectionPool, args: FieldArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let exists: bool = conn
        .query_as(redis::cmd("HEXISTS").arg(&args.name).arg(&args.key))
        .await
        .map_err(|e| {
            failure(
                format!("Error checking existence of field '{}' in hash '{}'", args.key, args.name),
                e,
            )
        })?;
    Ok(exists.to_string())
}

async fn set_vector(pool: &ConnectionPool, args: SetVectorArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Raw)?;
    conn.execute(
        redis::cmd("HSET")
            .arg(&args.name)
            .arg(&args.vector_field)
            .arg(encode_vector(&args.vector)),
    )
    .await
    .map_err(|e| {
        failure(
            format!(
                "Error storing vector in hash '{}' with field '{}'",
                args.name, args.vector_field
            ),
            e,
        )
    })?;
    Ok("true".to_string())
}

async fn get_vector(pool: &ConnectionPool, args: GetVectorArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Raw)?;
    let reply = conn
        .query(redis::cmd("HGET").arg(&args.name).arg(&args.vector_field))
        .await
        .map_err(|e| {
            failure(
                format!(
                    "Error retrieving vector field '{}' from hash '{}'",
                    args.vector_field, args.name
                ),
                e,
            )
        })?;

    match reply {
        Reply::Bytes(blob) if !blob.is_empty() => Ok(json_text(&json!(decode_vector(&blob)))),
        _ => Ok(format!(
            "Field '{}' not found in hash '{}'.",
            args.vector_field, args.name
        )),
    }
}
