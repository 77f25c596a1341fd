//! List tools

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    apply_expiry, data_definition, failure, handle, json_text, parse, scalar_text, Outcome,
    ToolError,
};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    let push_schema = json!({
        "name": {"type": "string"},
        "value": {"description": "Element to push (string or number)"},
        "expire": {"type": "integer", "description": "Expiration in seconds"}
    });
    vec![
        data_definition(
            "lpush",
            "Push a value onto the left of a Redis list and optionally set an expiration time.",
            push_schema.clone(),
            &["name", "value"],
        ),
        data_definition(
            "rpush",
            "Push a value onto the right of a Redis list and optionally set an expiration time.",
            push_schema,
            &["name", "value"],
        ),
        data_definition(
            "lpop",
            "Remove and return the first element from a Redis list.",
            json!({"name": {"type": "string"}}),
            &["name"],
        ),
        data_definition(
            "rpop",
            "Remove and return the last element from a Redis list.",
            json!({"name": {"type": "string"}}),
            &["name"],
        ),
        data_definition(
            "lrange",
            "Get elements from a Redis list within a range (inclusive, negative indexes count from the end).",
            json!({
                "name": {"type": "string"},
                "start": {"type": "integer"},
                "stop": {"type": "integer"}
            }),
            &["name", "start", "stop"],
        ),
        data_definition(
            "llen",
            "Get the length of a Redis list.",
            json!({"name": {"type": "string"}}),
            &["name"],
        ),
        data_definition(
            "lrem",
            "Remove elements from a Redis list. count=0 removes all, positive from head, negative from tail.",
            json!({
                "name": {"type": "string"},
                "count": {"type": "integer"},
                "element": {"description": "Element value to remove"}
            }),
            &["name", "count", "element"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct PushArgs {
    name: String,
    value: Value,
    #[serde(default)]
    expire: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    name: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeArgs {
    name: String,
    start: i64,
    stop: i64,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoveArgs {
    name: String,
    count: i64,
    element: Value,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "lpush" => Ok(push(pool, Side::Left, parse(arguments)?).await),
        "rpush" => Ok(push(pool, Side::Right, parse(arguments)?).await),
        "lpop" => Ok(pop(pool, Side::Left, parse(arguments)?).await),
        "rpop" => Ok(pop(pool, Side::Right, parse(arguments)?).await),
        "lrange" => Ok(lrange(pool, parse(arguments)?).await),
        "llen" => Ok(llen(pool, parse(arguments)?).await),
        "lrem" => Ok(lrem(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn push(pool: &ConnectionPool, side: Side, args: PushArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let value = scalar_text(&args.value);
    let command = match side {
        Side::Left => "LPUSH",
        Side::Right => "RPUSH",
    };
    let context = || format!("Error pushing value to list '{}'", args.name);

    conn.execute(redis::cmd(command).arg(&args.name).arg(&value))
        .await
        .map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.name, args.expire)
        .await
        .map_err(|e| failure(context(), e))?;

    Ok(format!(
        "Value '{}' pushed to the {} of list '{}'.",
        value,
        side.label(),
        args.name
    ))
}

async fn pop(pool: &ConnectionPool, side: Side, args: ListArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let command = match side {
        Side::Left => "LPOP",
        Side::Right => "RPOP",
    };
    let value: Option<String> = conn
        .query_as(redis::cmd(command).arg(&args.name))
        .await
        .map_err(|e| failure(format!("Error popping value from list '{}'", args.name), e))?;

    Ok(value.unwrap_or_else(|| format!("List '{}' is empty or does not exist.", args.name)))
}

async fn lrange(pool: &ConnectionPool, args: RangeArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(redis::cmd("LRANGE").arg(&args.name).arg(args.start).arg(args.stop))
        .await
        .map_err(|e| failure(format!("Error retrieving values from list '{}'", args.name), e))?;

    match reply {
        Reply::Array(items) if !items.is_empty() => Ok(json_text(&Value::Array(
            items.iter().map(Reply::to_json).collect(),
        ))),
        _ => Ok(format!("List '{}' is empty or does not exist.", args.name)),
    }
}

async fn llen(pool: &ConnectionPool, args: ListArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let len: i64 = conn
        .query_as(redis::cmd("LLEN").arg(&args.name))
        .await
        .map_err(|e| failure(format!("Error retrieving length of list '{}'", args.name), e))?;
    Ok(len.to_string())
}

async fn lrem(pool: &ConnectionPool, args: RemoveArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let element = scalar_text(&args.element);
    let removed: i64 = conn
        .query_as(redis::cmd("LREM").arg(&args.name).arg(args.count).arg(&element))
        .await
        .map_err(|e| failure(format!("Error removing element from list '{}'", args.name), e))?;

    Ok(if removed == 0 {
        format!(
            "Element '{}' not found in list '{}' or list does not exist.",
            element, args.name
        )
    } else {
        format!(
            "Removed {} occurrence(s) of '{}' from list '{}'.",
            removed, element, args.name
        )
    })
}
