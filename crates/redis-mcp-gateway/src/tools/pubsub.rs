//! Pub/Sub tools

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{data_definition, failure, handle, parse, scalar_text, Outcome, ToolError};
use crate::pool::{ConnectionPool, ReplyMode};

pub(super) fn definitions() -> Vec<Value> {
    vec![data_definition(
        "publish",
        "Publish a message to a Redis channel.",
        json!({
            "channel": {"type": "string"},
            "message": {"description": "Message payload"}
        }),
        &["channel", "message"],
    )]
}

#[derive(Debug, Deserialize)]
struct PublishArgs {
    channel: String,
    message: Value,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "publish" => Ok(publish(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn publish(pool: &ConnectionPool, args: PublishArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let receivers: i64 = conn
        .query_as(
            redis::cmd("PUBLISH")
                .arg(&args.channel)
                .arg(scalar_text(&args.message)),
        )
        .await
        .map_err(|e| failure(format!("Error publishing message to channel '{}'", args.channel), e))?;

    Ok(format!(
        "Message published to channel '{}' ({} subscriber(s) received it).",
        args.channel, receivers
    ))
}
