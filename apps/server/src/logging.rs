//! Tracing setup
//!
//! Console output goes to stderr (stdout carries the stdio transport).
//! Level: `RUST_LOG`, else `MCP_REDIS_LOG_LEVEL` (numeric or level name),
//! else `warn`.

use std::path::Path;

use redis_mcp_core::branding;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map an `MCP_REDIS_LOG_LEVEL` value to a filter directive.
///
/// Accepts numeric levels (10 debug, 20 info, 30 warning, 40 error,
/// 50 critical) and names including the WARN and FATAL aliases.
pub fn resolve_level(value: Option<&str>) -> &'static str {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "warn";
    };

    if let Ok(number) = raw.parse::<i64>() {
        return match number {
            n if n <= 0 => "trace",
            n if n <= 10 => "debug",
            n if n <= 20 => "info",
            n if n <= 30 => "warn",
            _ => "error",
        };
    }

    match raw.to_ascii_uppercase().as_str() {
        "NOTSET" | "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "warn",
    }
}

/// Writer guards; keep alive for the lifetime of the process, dropping them
/// flushes pending lines
pub struct LogGuards {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber
pub fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<LogGuards> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = resolve_level(std::env::var(branding::LOG_LEVEL_ENV).ok().as_deref());
        EnvFilter::new(level)
    });

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_ansi(false)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(branding::LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LogGuards {
        _console: console_guard,
        _file: file_guard,
    })
}
