//! Structured logging using the tracing crate
//!
//! ## Log Format Options
//!
//! Output format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON format for production and log aggregation systems
//! - `pretty` - Human-readable format with colors and indentation for development
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! Debug-stream lines arrive under the `debug_stream` target, so
//! `RUST_LOG=debug_stream=off` silences them without touching anything else.
//!
//! ## Examples
//!
//! ```bash
//! # Production JSON logging
//! LOG_FORMAT=json LOG_LEVEL=INFO ./aht10-env-sensor run
//!
//! # Development with colors
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./aht10-env-sensor run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json, // Default to JSON for production
        }
    }
}

/// Parse a `LOG_LEVEL` value; unknown values mean INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Raise `base` by one level per `-v`
pub fn level_for_verbosity(base: Level, verbose: u8) -> Level {
    match verbose {
        0 => base,
        1 if base < Level::DEBUG => Level::DEBUG,
        1 => base,
        _ => Level::TRACE,
    }
}

/// Filter for `level` with dependency noise reduced
pub fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::new(level.to_string());
    for directive in ["rumqttc=warn", "tokio=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Initialize logging with manual configuration.
///
/// A second initialisation in the same process is ignored.
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let filter = match env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => build_filter(level),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let _ = match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
    };
}

/// Initialize logging from environment variables, raised by `verbose`
pub fn init_default_logging(verbose: u8) {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let level = level_for_verbosity(parse_level(&log_level), verbose);

    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let log_format = LogFormat::parse(&format);

    let include_spans = env::var("LOG_SPANS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true";

    init_logging(level, log_format, include_spans);
}

/// Create a lifecycle span
#[macro_export]
macro_rules! lifecycle_span {
    ($($field:tt)*) => {
        tracing::info_span!("device_lifecycle", $($field)*)
    };
}

pub use lifecycle_span;
