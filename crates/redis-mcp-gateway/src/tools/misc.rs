//! Key tools: delete, type, expire, rename, scan_keys, scan_all_keys

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{data_definition, failure, handle, json_text, parse, Outcome, ToolError};
use crate::pool::{ConnectionPool, ReplyMode};

/// Keys returned by `scan_all_keys` before it stops early
const SCAN_ALL_LIMIT: usize = 10_000;

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "delete",
            "Delete a Redis key.",
            json!({"key": {"type": "string"}}),
            &["key"],
        ),
        data_definition(
            "type",
            "Return the type of the value stored at key, with its TTL.",
            json!({"key": {"type": "string"}}),
            &["key"],
        ),
        data_definition(
            "expire",
            "Set an expiration time for a Redis key.",
            json!({
                "name": {"type": "string"},
                "expire_seconds": {"type": "integer", "description": "Seconds until the key expires"}
            }),
            &["name", "expire_seconds"],
        ),
        data_definition(
            "rename",
            "Rename a Redis key.",
            json!({
                "old_key": {"type": "string"},
                "new_key": {"type": "string"}
            }),
            &["old_key", "new_key"],
        ),
        data_definition(
            "scan_keys",
            "Scan keys matching a pattern, one SCAN page at a time. Pass the returned cursor to continue; 0 means the scan is complete.",
            json!({
                "pattern": {"type": "string", "default": "*"},
                "count": {"type": "integer", "default": 100, "description": "Hint for keys per page"},
                "cursor": {"type": "integer", "default": 0}
            }),
            &[],
        ),
        data_definition(
            "scan_all_keys",
            "Scan and return every key matching a pattern by iterating SCAN to completion.",
            json!({
                "pattern": {"type": "string", "default": "*"},
                "batch_size": {"type": "integer", "default": 100}
            }),
            &[],
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct KeyArgs {
    key: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpireArgs {
    name: String,
    expire_seconds: i64,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenameArgs {
    old_key: String,
    new_key: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScanArgs {
    pattern: String,
    count: u64,
    cursor: u64,
    batch_size: u64,
    host_id: Option<String>,
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            count: 100,
            cursor: 0,
            batch_size: 100,
            host_id: None,
        }
    }
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "delete" => Ok(delete(pool, parse(arguments)?).await),
        "type" => Ok(key_type(pool, parse(arguments)?).await),
        "expire" => Ok(expire(pool, parse(arguments)?).await),
        "rename" => Ok(rename(pool, parse(arguments)?).await),
        "scan_keys" => Ok(scan_keys(pool, parse(arguments)?).await),
        "scan_all_keys" => Ok(scan_all_keys(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn delete(pool: &ConnectionPool, args: KeyArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let deleted: i64 = conn
        .query_as(redis::cmd("DEL").arg(&args.key))
        .await
        .map_err(|e| failure(format!("Error deleting key {}", args.key), e))?;
    Ok(if deleted > 0 {
        format!("Successfully deleted {}", args.key)
    } else {
        format!("Key {} not found", args.key)
    })
}

async fn key_type(pool: &ConnectionPool, args: KeyArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let result: redis::RedisResult<(String, i64)> = async {
        let kind: String = conn.query_as(redis::cmd("TYPE").arg(&args.key)).await?;
        let ttl: i64 = conn.query_as(redis::cmd("TTL").arg(&args.key)).await?;
        Ok((kind, ttl))
    }
    .await;

    let body = match result {
        Ok((kind, ttl)) => json!({"key": args.key, "type": kind, "ttl": ttl}),
        Err(e) => json!({"error": e.to_string()}),
    };
    Ok(json_text(&body))
}

async fn expire(pool: &ConnectionPool, args: ExpireArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let applied: bool = conn
        .query_as(redis::cmd("EXPIRE").arg(&args.name).arg(args.expire_seconds))
        .await
        .map_err(|e| failure(format!("Error setting expiration for key '{}'", args.name), e))?;
    Ok(if applied {
        format!(
            "Expiration set to {} seconds for '{}'.",
            args.expire_seconds, args.name
        )
    } else {
        format!("Key '{}' does not exist.", args.name)
    })
}

async fn rename(pool: &ConnectionPool, args: RenameArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let result: redis::RedisResult<bool> = async {
        let exists: bool = conn.query_as(redis::cmd("EXISTS").arg(&args.old_key)).await?;
        if exists {
            conn.execute(redis::cmd("RENAME").arg(&args.old_key).arg(&args.new_key))
                .await?;
        }
        Ok(exists)
    }
    .await;

    let body = match result {
        Ok(true) => json!({
            "status": "success",
            "message": format!("Renamed key '{}' to '{}'", args.old_key, args.new_key),
        }),
        Ok(false) => json!({"error": format!("Key '{}' does not exist.", args.old_key)}),
        Err(e) => json!({"error": e.to_string()}),
    };
    Ok(json_text(&body))
}

async fn scan_page(
    conn: &crate::pool::RedisHandle,
    cursor: u64,
    pattern: &str,
    count: u64,
) -> redis::RedisResult<(u64, Vec<String>)> {
    conn.query_as(
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count),
    )
    .await
}

async fn scan_keys(pool: &ConnectionPool, args: ScanArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let (next_cursor, keys) = scan_page(&conn, args.cursor, &args.pattern, args.count)
        .await
        .map_err(|e| failure(format!("Error scanning keys with pattern '{}'", args.pattern), e))?;

    Ok(json_text(&json!({
        "cursor": next_cursor,
        "keys": keys,
        "total_scanned": keys.len(),
        "scan_complete": next_cursor == 0,
    })))
}

async fn scan_all_keys(pool: &ConnectionPool, args: ScanArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let mut keys = Vec::new();
    let mut cursor = 0;

    loop {
        let (next_cursor, page) = scan_page(&conn, cursor, &args.pattern, args.batch_size)
            .await
            .map_err(|e| failure(format!("Error scanning keys with pattern '{}'", args.pattern), e))?;
        keys.extend(page);
        cursor = next_cursor;
        if cursor == 0 || keys.len() >= SCAN_ALL_LIMIT {
            break;
        }
    }

    Ok(json_text(&json!(keys)))
}
