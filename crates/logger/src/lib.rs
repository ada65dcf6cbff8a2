//! Tracing subscriber installation shared by the Pulseboard crates.

use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use tracing_subscriber::util::TryInitError;

/// Output layout of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name, anything other than `json` is compact.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") { LogFormat::Json } else { LogFormat::Compact }
    }

    /// Format requested through `RUST_LOG_FORMAT`.
    pub fn from_env() -> Self {
        var("RUST_LOG_FORMAT").map(|name| Self::from_name(&name)).unwrap_or_default()
    }
}

/// Install the INFO-level subscriber, ignoring an already installed one.
pub fn init() {
    let _ = try_init(LevelFilter::INFO, None);
}

/// Install a subscriber with `level` as the default directive.
///
/// `RUST_LOG` directives still take precedence. When `format` is `None` the
/// layout comes from `RUST_LOG_FORMAT`.
pub fn try_init(level: LevelFilter, format: Option<LogFormat>) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format.unwrap_or_else(LogFormat::from_env) {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

/// Parse a level name such as `debug`, falling back to INFO.
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Compact);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("nonsense"), LevelFilter::INFO);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = try_init(LevelFilter::WARN, Some(LogFormat::Compact));
        assert!(try_init(LevelFilter::WARN, Some(LogFormat::Compact)).is_err());
    }
}
