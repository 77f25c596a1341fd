//! Server tools: dbsize, info, client_list

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{data_definition, failure, handle, json_text, parse, Outcome, ToolError};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "dbsize",
            "Get the number of keys stored in the Redis database.",
            json!({}),
            &[],
        ),
        data_definition(
            "info",
            "Get Redis server information and statistics.",
            json!({
                "section": {
                    "type": "string",
                    "description": "INFO section (default, memory, cpu, keyspace, ...)",
                    "default": "default"
                }
            }),
            &[],
        ),
        data_definition(
            "client_list",
            "Get a list of clients connected to the Redis server.",
            json!({}),
            &[],
        ),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostArgs {
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoArgs {
    #[serde(default = "default_section")]
    section: String,
    #[serde(default)]
    host_id: Option<String>,
}

fn default_section() -> String {
    "default".to_string()
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "dbsize" => Ok(dbsize(pool, parse(arguments)?).await),
        "info" => Ok(info(pool, parse(arguments)?).await),
        "client_list" => Ok(client_list(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn dbsize(pool: &ConnectionPool, args: HostArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let size: i64 = conn
        .query_as(&redis::cmd("DBSIZE"))
        .await
        .map_err(|e| failure("Error getting database size", e))?;
    Ok(size.to_string())
}

async fn info(pool: &ConnectionPool, args: InfoArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(redis::cmd("INFO").arg(&args.section))
        .await
        .map_err(|e| failure("Error retrieving Redis info", e))?;

    let parsed = match &reply {
        // Cluster: one payload per node
        Reply::Map(nodes) => Value::Object(
            nodes
                .iter()
                .map(|(node, payload)| {
                    (
                        node.key_string(),
                        payload.as_text().map(parse_info).unwrap_or(Value::Null),
                    )
                })
                .collect(),
        ),
        other => other.as_text().map(parse_info).unwrap_or_else(|| other.to_json()),
    };
    Ok(json_text(&parsed))
}

async fn client_list(pool: &ConnectionPool, args: HostArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(redis::cmd("CLIENT").arg("LIST"))
        .await
        .map_err(|e| failure("Error retrieving client list", e))?;

    let clients = reply.as_text().map(parse_client_list).unwrap_or_default();
    Ok(json_text(&Value::Array(clients)))
}

/// Parse an INFO payload into a flat object. Numeric values become numbers,
/// `k=v,k=v` values (keyspace lines) become nested objects.
pub(crate) fn parse_info(payload: &str) -> Value {
    let mut info = Map::new();
    for line in payload.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            info.insert(key.to_string(), info_value(value));
        }
    }
    Value::Object(info)
}

fn info_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return json!(f);
        }
    }
    if raw.contains('=') && !raw.contains(' ') {
        let nested: Map<String, Value> = raw
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), info_value(v)))
            .collect();
        return Value::Object(nested);
    }
    Value::String(raw.to_string())
}

/// One object per `CLIENT LIST` line, `key=value` fields kept as text
pub(crate) fn parse_client_list(payload: &str) -> Vec<Value> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Map<String, Value> = line
                .split_whitespace()
                .filter_map(|field| field.split_once('='))
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            Value::Object(fields)
        })
        .collect()
}
