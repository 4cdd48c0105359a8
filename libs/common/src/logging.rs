//! Logging setup
//!
//! Console output goes to stderr as `timestamp [LEVEL] message`, or as JSON
//! lines when requested. `RUST_LOG` overrides the configured level.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{CommonError, Result};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or full filter spec (`info`, `warn,prtg_client=debug`)
    pub level: String,
    /// Emit JSON lines instead of the bracketed format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-18T09:12:44.809000Z [INFO] Making request: api/getstatus.xml?start=0&count=500`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Filter from `RUST_LOG` when set, else from the configured level
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => EnvFilter::try_new(&env_str)
            .map_err(|e| CommonError::Logging(format!("Invalid RUST_LOG '{}': {}", env_str, e))),
        _ => EnvFilter::try_new(&config.level).map_err(|e| {
            CommonError::Logging(format!("Invalid log level '{}': {}", config.level, e))
        }),
    }
}

/// Install the global subscriber
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    let console_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_level(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .event_format(BracketedLevelFormat)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| CommonError::Logging(e.to_string()))
}
