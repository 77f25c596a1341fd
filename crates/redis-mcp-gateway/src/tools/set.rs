//! Set tools

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    apply_expiry, data_definition, expiry_suffix, failure, handle, json_text, parse, scalar_text,
    Outcome, ToolError,
};
use crate::pool::{ConnectionPool, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "sadd",
            "Add a value to a Redis set with an optional expiration time.",
            json!({
                "name": {"type": "string"},
                "value": {"description": "Member to add"},
                "expire_seconds": {"type": "integer"}
            }),
            &["name", "value"],
        ),
        data_definition(
            "srem",
            "Remove a value from a Redis set.",
            json!({
                "name": {"type": "string"},
                "value": {"description": "Member to remove"}
            }),
            &["name", "value"],
        ),
        data_definition(
            "smembers",
            "Get all members of a Redis set.",
            json!({"name": {"type": "string"}}),
            &["name"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct MemberArgs {
    name: String,
    value: Value,
    #[serde(default)]
    expire_seconds: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetArgs {
    name: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "sadd" => Ok(sadd(pool, parse(arguments)?).await),
        "srem" => Ok(srem(pool, parse(arguments)?).await),
        "smembers" => Ok(smembers(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn sadd(pool: &ConnectionPool, args: MemberArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let value = scalar_text(&args.value);
    let context = || format!("Error adding value '{}' to set '{}'", value, args.name);

    conn.execute(redis::cmd("SADD").arg(&args.name).arg(&value))
        .await
        .map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.name, args.expire_seconds)
        .await
        .map_err(|e| failure(context(), e))?;

    Ok(format!(
        "Value '{}' added successfully to set '{}'.{}",
        value,
        args.name,
        expiry_suffix(args.expire_seconds)
    ))
}

async fn srem(pool: &ConnectionPool, args: MemberArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let value = scalar_text(&args.value);
    let removed: i64 = conn
        .query_as(redis::cmd("SREM").arg(&args.name).arg(&value))
        .await
        .map_err(|e| failure(format!("Error removing value '{}' from set '{}'", value, args.name), e))?;

    Ok(if removed > 0 {
        format!("Value '{}' removed from set '{}'.", value, args.name)
    } else {
        format!("Value '{}' not found in set '{}'.", value, args.name)
    })
}

async fn smembers(pool: &ConnectionPool, args: SetArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let mut members: Vec<String> = conn
        .query_as(redis::cmd("SMEMBERS").arg(&args.name))
        .await
        .map_err(|e| failure(format!("Error retrieving members of set '{}'", args.name), e))?;

    if members.is_empty() {
        return Ok(format!("Set '{}' is empty or does not exist.", args.name));
    }
    members.sort();
    Ok(json_text(&json!(members)))
}
