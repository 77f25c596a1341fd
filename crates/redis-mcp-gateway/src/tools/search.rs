//! Redis Query Engine tools (FT.*): index listing and info, HNSW vector
//! index creation, KNN vector search and full-text search

use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{data_definition, encode_vector, failure, handle, json_text, parse, Outcome, ToolError};
use crate::pool::{ConnectionPool, Reply, ReplyMode};

const DEFAULT_INDEX: &str = "vector_index";
const DEFAULT_VECTOR_FIELD: &str = "vector";
const DEFAULT_DIALECT: u32 = 2;

pub(super) fn definitions() -> Vec<Value> {
    vec![
        data_definition(
            "get_indexes",
            "List the search indexes in the Redis database.",
            json!({}),
            &[],
        ),
        data_definition(
            "get_index_info",
            "Retrieve schema and statistics of a search index (FT.INFO).",
            json!({"index_name": {"type": "string"}}),
            &["index_name"],
        ),
        data_definition(
            "get_indexed_keys_number",
            "Retrieve the number of keys indexed by a search index.",
            json!({"index_name": {"type": "string"}}),
            &["index_name"],
        ),
        data_definition(
            "create_vector_index_hash",
            "Create an HNSW vector similarity index over float32 vectors stored in hashes.",
            json!({
                "index_name": {"type": "string", "default": DEFAULT_INDEX},
                "prefix": {"type": "string", "default": "doc:", "description": "Key prefix of indexed hashes"},
                "vector_field": {"type": "string", "default": DEFAULT_VECTOR_FIELD},
                "dim": {"type": "integer", "default": 1536},
                "distance_metric": {"type": "string", "default": "COSINE", "enum": ["COSINE", "L2", "IP"]}
            }),
            &[],
        ),
        data_definition(
            "vector_search_hash",
            "KNN vector similarity search over vectors stored in hashes.",
            json!({
                "query_vector": {"type": "array", "items": {"type": "number"}},
                "index_name": {"type": "string", "default": DEFAULT_INDEX},
                "vector_field": {"type": "string", "default": DEFAULT_VECTOR_FIELD},
                "k": {"type": "integer", "default": 5},
                "return_fields": {"type": "array", "items": {"type": "string"}}
            }),
            &["query_vector"],
        ),
        data_definition(
            "text_search",
            "Full-text search against a search index (FT.SEARCH) with paging and sorting.",
            json!({
                "query_text": {"type": "string"},
                "index_name": {"type": "string"},
                "return_fields": {"type": "array", "items": {"type": "string"}},
                "limit": {"type": "integer", "default": 10},
                "offset": {"type": "integer", "default": 0},
                "sort_by": {"type": "string"},
                "sort_ascending": {"type": "boolean", "default": true},
                "dialect": {"type": "integer", "default": DEFAULT_DIALECT}
            }),
            &["query_text", "index_name"],
        ),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostArgs {
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexArgs {
    index_name: String,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CreateIndexArgs {
    index_name: String,
    prefix: String,
    vector_field: String,
    dim: u32,
    distance_metric: String,
    host_id: Option<String>,
}

impl Default for CreateIndexArgs {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX.to_string(),
            prefix: "doc:".to_string(),
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            dim: 1536,
            distance_metric: "COSINE".to_string(),
            host_id: None,
        }
    }
}

fn default_index() -> String {
    DEFAULT_INDEX.to_string()
}

fn default_vector_field() -> String {
    DEFAULT_VECTOR_FIELD.to_string()
}

fn default_k() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
struct VectorSearchArgs {
    query_vector: Vec<f32>,
    #[serde(default = "default_index")]
    index_name: String,
    #[serde(default = "default_vector_field")]
    vector_field: String,
    #[serde(default = "default_k")]
    k: u32,
    #[serde(default)]
    return_fields: Vec<String>,
    #[serde(default)]
    host_id: Option<String>,
}

fn default_limit() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TextSearchArgs {
    query_text: String,
    index_name: String,
    #[serde(default)]
    return_fields: Vec<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default = "default_true")]
    sort_ascending: bool,
    #[serde(default)]
    dialect: Option<u32>,
    #[serde(default)]
    host_id: Option<String>,
}

pub(super) async fn call(
    pool: &ConnectionPool,
    name: &str,
    arguments: JsonObject,
) -> Result<Outcome, ToolError> {
    match name {
        "get_indexes" => Ok(get_indexes(pool, parse(arguments)?).await),
        "get_index_info" => Ok(get_index_info(pool, parse(arguments)?).await),
        "get_indexed_keys_number" => Ok(indexed_keys(pool, parse(arguments)?).await),
        "create_vector_index_hash" => Ok(create_vector_index(pool, parse(arguments)?).await),
        "vector_search_hash" => Ok(vector_search(pool, parse(arguments)?).await),
        "text_search" => Ok(text_search(pool, parse(arguments)?).await),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

async fn get_indexes(pool: &ConnectionPool, args: HostArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(&redis::cmd("FT._LIST"))
        .await
        .map_err(|e| failure("Error retrieving indexes", e))?;
    Ok(json_text(&reply.to_json()))
}

async fn get_index_info(pool: &ConnectionPool, args: IndexArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(redis::cmd("FT.INFO").arg(&args.index_name))
        .await
        .map_err(|e| failure("Error retrieving index info", e))?;
    Ok(json_text(&keyed_json(&reply)))
}

async fn indexed_keys(pool: &ConnectionPool, args: IndexArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let reply = conn
        .query(
            redis::cmd("FT.SEARCH")
                .arg(&args.index_name)
                .arg("*")
                .arg("LIMIT")
                .arg(0)
                .arg(0),
        )
        .await
        .map_err(|e| failure("Error retrieving number of keys", e))?;
    Ok(parse_search(&reply).0.to_string())
}

async fn create_vector_index(pool: &ConnectionPool, args: CreateIndexArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    conn.execute(
        redis::cmd("FT.CREATE")
            .arg(&args.index_name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(&args.prefix)
            .arg("SCHEMA")
            .arg(&args.vector_field)
            .arg("VECTOR")
            .arg("HNSW")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(args.dim)
            .arg("DISTANCE_METRIC")
            .arg(&args.distance_metric),
    )
    .await
    .map_err(|e| failure(format!("Error creating index '{}'", args.index_name), e))?;

    Ok(format!("Index '{}' created successfully.", args.index_name))
}

/// Runs on the raw handle: the query vector is a binary parameter and
/// returned fields may be binary too
async fn vector_search(pool: &ConnectionPool, args: VectorSearchArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Raw)?;
    let query = format!(
        "*=>[KNN {} @{} $vec_param AS score]",
        args.k, args.vector_field
    );

    let mut cmd = redis::cmd("FT.SEARCH");
    cmd.arg(&args.index_name)
        .arg(query)
        .arg("PARAMS")
        .arg(2)
        .arg("vec_param")
        .arg(encode_vector(&args.query_vector))
        .arg("SORTBY")
        .arg("score")
        .arg("LIMIT")
        .arg(0)
        .arg(args.k)
        .arg("RETURN")
        .arg(1 + args.return_fields.len())
        .arg("score");
    for field in &args.return_fields {
        cmd.arg(field);
    }
    cmd.arg("DIALECT").arg(DEFAULT_DIALECT);

    let reply = conn.query(&cmd).await.map_err(|e| {
        failure(
            format!("Error performing vector search on index '{}'", args.index_name),
            e,
        )
    })?;
    Ok(json_text(&Value::Array(parse_search(&reply).1)))
}

async fn text_search(pool: &ConnectionPool, args: TextSearchArgs) -> Outcome {
    let conn = handle(pool, args.host_id.as_deref(), ReplyMode::Decoded)?;
    let dialect = args.dialect.unwrap_or(DEFAULT_DIALECT);

    let mut cmd = redis::cmd("FT.SEARCH");
    cmd.arg(&args.index_name).arg(&args.query_text);
    if !args.return_fields.is_empty() {
        cmd.arg("RETURN").arg(args.return_fields.len());
        for field in &args.return_fields {
            cmd.arg(field);
        }
    }
    if let Some(sort_by) = &args.sort_by {
        cmd.arg("SORTBY")
            .arg(sort_by)
            .arg(if args.sort_ascending { "ASC" } else { "DESC" });
    }
    cmd.arg("LIMIT")
        .arg(args.offset)
        .arg(args.limit)
        .arg("DIALECT")
        .arg(dialect);

    let reply = conn.query(&cmd).await.map_err(|e| {
        failure(
            format!("Error performing text search on index '{}'", args.index_name),
            e,
        )
    })?;
    let (total, docs) = parse_search(&reply);

    let body = json!({
        "total": total,
        "docs": docs,
        "query": args.query_text,
        "dialect": dialect,
        "offset": args.offset,
        "limit": args.limit,
        "index_name": args.index_name,
    });
    Ok(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
}

/// `[total, key, [f, v, ...], key, [f, v, ...], ...]` into the total and
/// one `{"id": key, f: v, ...}` object per document
pub(crate) fn parse_search(reply: &Reply) -> (i64, Vec<Value>) {
    let Reply::Array(items) = reply else {
        return (0, Vec::new());
    };
    let Some((total, rest)) = items.split_first() else {
        return (0, Vec::new());
    };

    let mut docs = Vec::new();
    let mut iter = rest.iter().peekable();
    while let Some(key) = iter.next() {
        let mut doc = Map::new();
        doc.insert("id".to_string(), Value::String(key.key_string()));
        if let Some(Reply::Array(_)) = iter.peek() {
            if let Some(fields) = iter.next() {
                for (field, value) in fields.pairs() {
                    doc.insert(field.key_string(), value.to_json());
                }
            }
        }
        docs.push(Value::Object(doc));
    }

    (total.as_int().unwrap_or(0), docs)
}

/// Render flat `[k, v, k, v]` replies as objects, recursively. Arrays whose
/// even positions are not all text stay arrays.
pub(crate) fn keyed_json(reply: &Reply) -> Value {
    match reply {
        Reply::Array(items) if looks_keyed(items) => Value::Object(
            items
                .chunks_exact(2)
                .map(|c| (c[0].key_string(), keyed_json(&c[1])))
                .collect(),
        ),
        Reply::Array(items) => Value::Array(items.iter().map(keyed_json).collect()),
        Reply::Map(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.key_string(), keyed_json(v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

fn looks_keyed(items: &[Reply]) -> bool {
    !items.is_empty()
        && items.len() % 2 == 0
        && items
            .iter()
            .step_by(2)
            .all(|k| matches!(k, Reply::Text(s) if !s.is_empty()))
}
