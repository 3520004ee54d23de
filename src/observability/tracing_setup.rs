// observability/tracing_setup.rs - Tracing Configuration

use std::str::FromStr;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Tracing output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable format (default)
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

impl FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(TracingFormat::Pretty),
            "compact" => Ok(TracingFormat::Compact),
            "json" => Ok(TracingFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Configuration for tracing
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "fipa_auction=debug")
    pub filter: String,

    /// Output format
    pub format: TracingFormat,

    /// Include span events (new, close)
    pub with_span_events: bool,

    /// Include file and line numbers
    pub with_file: bool,

    /// Include target (module path)
    pub with_target: bool,

    /// ANSI colors (for terminal output)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info,fipa_auction=info".into(),
            format: TracingFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Config derived from a single level and a format name, as the CLI takes them
    pub fn for_level(level: &str, format: TracingFormat) -> Self {
        let verbose = matches!(level, "debug" | "trace");
        Self {
            filter: format!("{level},fipa_auction={level}"),
            format,
            with_span_events: level == "trace",
            with_file: verbose,
            with_target: true,
            with_ansi: format != TracingFormat::Json,
        }
    }
}

/// Initialize the tracing subscriber
///
/// Call once at startup. `RUST_LOG` takes precedence over `config.filter`.
pub fn init_tracing(config: TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        TracingFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .with_span_events(span_events)
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target)
                        .with_ansi(config.with_ansi),
                )
                .init();
        }
        TracingFormat::Compact => {
            registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_span_events(span_events)
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target)
                        .with_ansi(config.with_ansi),
                )
                .init();
        }
        TracingFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_span_events(span_events)
                        .with_file(config.with_file)
                        .with_line_number(config.with_file)
                        .with_target(config.with_target),
                )
                .init();
        }
    }

    tracing::debug!(
        filter = %config.filter,
        format = ?config.format,
        "Tracing initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.filter.contains("info"));
        assert!(config.with_ansi);
    }

    #[test]
    fn test_config_for_level() {
        let config = TracingConfig::for_level("debug", TracingFormat::Json);
        assert_eq!(config.filter, "debug,fipa_auction=debug");
        assert!(config.with_file);
        assert!(!config.with_ansi);
        assert!(!config.with_span_events);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<TracingFormat>(), Ok(TracingFormat::Json));
        assert_eq!("compact".parse::<TracingFormat>(), Ok(TracingFormat::Compact));
        assert!("xml".parse::<TracingFormat>().is_err());
    }
}
