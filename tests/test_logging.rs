//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle
//! log format parsing and configuration from environment variables.

use envsensor::debug::{DebugStream, TracingSink};
use envsensor::debugln;
use envsensor::observability::logging::{
    build_filter, init_logging, level_for_verbosity, parse_level, LogFormat,
};
use tracing::Level;

#[test]
fn test_log_format_parse_json() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("JSON"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("Json"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_pretty() {
    assert!(matches!(LogFormat::parse("pretty"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("PRETTY"), LogFormat::Pretty));
}

#[test]
fn test_log_format_parse_compact() {
    assert!(matches!(LogFormat::parse("compact"), LogFormat::Compact));
    assert!(matches!(LogFormat::parse("Compact"), LogFormat::Compact));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    // Invalid formats should default to JSON for production safety
    assert!(matches!(LogFormat::parse("invalid"), LogFormat::Json));
    assert!(matches!(LogFormat::parse(""), LogFormat::Json));
    assert!(matches!(LogFormat::parse("xml"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_whitespace() {
    assert!(matches!(LogFormat::parse("  json  "), LogFormat::Json));
    assert!(matches!(LogFormat::parse("\tpretty\n"), LogFormat::Pretty));
}

#[test]
fn test_log_level_parsing() {
    let test_cases = vec![
        ("ERROR", Level::ERROR),
        ("warn", Level::WARN),
        ("INFO", Level::INFO),
        ("debug", Level::DEBUG),
        ("TRACE", Level::TRACE),
        ("", Level::INFO),
        ("verbose", Level::INFO),
    ];

    for (input, expected) in test_cases {
        assert_eq!(parse_level(input), expected, "Failed for input: {input}");
    }
}

#[test]
fn test_verbosity_raises_level() {
    assert_eq!(level_for_verbosity(Level::WARN, 0), Level::WARN);
    assert_eq!(level_for_verbosity(Level::WARN, 1), Level::DEBUG);
    assert_eq!(level_for_verbosity(Level::INFO, 2), Level::TRACE);
}

#[test]
fn test_filter_quiets_dependencies() {
    let rendered = build_filter(Level::TRACE).to_string();
    assert!(rendered.contains("rumqttc=warn"));
    assert!(rendered.contains("tokio=warn"));
}

#[test]
fn test_init_logging_twice_is_harmless() {
    init_logging(Level::INFO, LogFormat::Compact, false);
    init_logging(Level::DEBUG, LogFormat::Json, true);

    // Debug-stream lines flow into whichever subscriber won
    let mut stream = DebugStream::with_sink(Box::new(TracingSink::new()));
    assert_eq!(debugln!(stream, "Hello from {}", "test"), 1);
}
