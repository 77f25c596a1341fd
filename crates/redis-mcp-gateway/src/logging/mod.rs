//! Logging Infrastructure
//!
//! Provides structured logging with:
//! - Trace IDs for tool call correlation
//! - Entry/exit lines with elapsed time

mod trace_context;

pub use trace_context::{generate_trace_id, ToolSpan, TraceContext};
