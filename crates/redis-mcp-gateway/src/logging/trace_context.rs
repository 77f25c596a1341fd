//! Trace Context - tool call correlation and structured logging
//!
//! Generates short trace IDs and wraps each tool call in a span.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, info_span, Span};

/// Global call counter for trace ID generation
static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short, unique trace ID
/// Format: 6 hex characters (e.g., "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mixed = counter.wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// Trace context for a single tool call
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// Unique trace ID (6 hex chars)
    pub trace_id: String,
    /// Tool name
    pub tool: String,
    /// Target host identifier, when the caller named one
    pub host_id: Option<String>,
    pub started_at: std::time::Instant,
}

impl TraceContext {
    pub fn new(tool: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            tool: tool.to_string(),
            host_id: None,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn with_host(mut self, host_id: Option<String>) -> Self {
        self.host_id = host_id;
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Host for logging ("default" when the default connection is used)
    pub fn host(&self) -> &str {
        self.host_id.as_deref().unwrap_or("default")
    }
}

/// Span builder for tool calls
pub struct ToolSpan;

impl ToolSpan {
    /// Create the `tool_call` span; child logs inherit the trace id
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "tool_call",
            trace_id = %ctx.trace_id,
            tool = %ctx.tool,
        )
    }

    /// Log call entry (single consolidated line)
    pub fn log_entry(ctx: &TraceContext) {
        info!(trace_id = %ctx.trace_id, "→ {} host={}", ctx.tool, ctx.host());
    }

    /// Log call completion (single consolidated line)
    pub fn log_exit(ctx: &TraceContext, outcome: &str) {
        info!(
            trace_id = %ctx.trace_id,
            "← {} {} ({}ms)",
            ctx.tool,
            outcome,
            ctx.elapsed_ms()
        );
    }
}
