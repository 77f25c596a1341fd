//! Sorted set tools

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{apply_expiry, data_definition, failure, handle, json_text, parse, Outcome, ToolError};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "zadd",
            "Add a member to a Redis sorted set with a score and an optional expiration time.",
            json!({
                "key": {"type": "string"},
                "score": {"type": "number"},
                "member": {"type": "string"},
                "expiration": {"type": "integer", "description": "Expiration in seconds"}
            }),
            &["key", "score", "member"],
        ),
        data_definition(
            "zrange",
            "Get members of a Redis sorted set by rank range, optionally with scores.",
            json!({
                "key": {"type": "string"},
                "start": {"type": "integer"},
                "end": {"type": "integer"},
                "with_scores": {"type": "boolean", "default": false}
            }),
            &["key", "start", "end"],
        ),
        data_definition(
            "zrem",
            "Remove a member from a Redis sorted set.",
            json!({
                "key": {"type": "string"},
                "member": {"type": "string"}
            }),
            &["key", "member"],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct ZaddArgs {
    key: String,
    score: f64,
    member: String,
    #[serde(default)]
    expiration: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZrangeArgs {
    key: String,
    start: i64,
    end: i64,
    #[serde(default)]
    with_scores: bool,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZremArgs {
    key: String,
    member: String,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "zadd" => Ok(zadd(pool, parse(arguments)?).await),
        "zrange" => Ok(zrange(pool, parse(arguments)?).await),
        "zrem" => Ok(zrem(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn zadd(pool: &ConnectionPool, args: ZaddArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let context = || format!("Error adding to sorted set {}", args.key);

    conn.execute(redis::cmd("ZADD").arg(&args.key).arg(args.score).arg(&args.member))
        .await
        .map_err(|e| failure(context(), e))?;
    apply_expiry(&conn, &args.key, args.expiration)
        .await
        .map_err(|e| failure(context(), e))?;

    let mut message = format!(
        "Successfully added {} to {} with score {}",
        args.member, args.key, args.score
    );
    if let Some(seconds) = args.expiration.filter(|s| *s > 0) {
        message.push_str(&format!(" and expiration {} seconds", seconds));
    }
    Ok(message)
}

async fn zrange(pool: &ConnectionPool, args: ZrangeArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let mut cmd = redis::cmd("ZRANGE");
    cmd.arg(&args.key).arg(args.start).arg(args.end);
    if args.with_scores {
        cmd.arg("WITHSCORES");
    }
    let reply = conn
        .query(&cmd)
        .await
        .map_err(|e| failure(format!("Error retrieving sorted set {}", args.key), e))?;

    let members = match &reply {
        Reply::Array(items) if items.is_empty() => {
            return Ok(format!("Sorted set {} is empty or does not exist", args.key))
        }
        Reply::Array(items) if args.with_scores => Value::Array(score_pairs(items)),
        other => other.to_json(),
    };
    Ok(json_text(&members))
}

/// `[member, score, ...]` (RESP2) or `[[member, score], ...]` (RESP3) into
/// `[[member, score], ...]` with numeric scores
fn score_pairs(items: &[Reply]) -> Vec<Value> {
    let nested = items.iter().all(|i| matches!(i, Reply::Array(_)));
    let pair = |member: &Reply, score: &Reply| {
        let score = match score {
            Reply::Double(d) => json!(d),
            other => other
                .as_text()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|d| json!(d))
                .unwrap_or_else(|| other.to_json()),
        };
        json!([member.to_json(), score])
    };

    if nested {
        items
            .iter()
            .filter_map(|item| match item {
                Reply::Array(p) if p.len() == 2 => Some(pair(&p[0], &p[1])),
                _ => None,
            })
            .collect()
    } else {
        items.chunks_exact(2).map(|c| pair(&c[0], &c[1])).collect()
    }
}

async fn zrem(pool: &ConnectionPool, args: ZremArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let removed: i64 = conn
        .query_as(redis::cmd("ZREM").arg(&args.key).arg(&args.member))
        .await
        .map_err(|e| failure(format!("Error removing from sorted set {}", args.key), e))?;

    Ok(if removed > 0 {
        format!("Successfully removed {} from {}", args.member, args.key)
    } else {
        format!("Member {} not found in {}", args.member, args.key)
    })
}
