//! # Structured Logging
//!
//! tracing-subscriber setup with JSON or text output. Nothing in the engine
//! depends on a global logger; if installation fails the process keeps a
//! minimal stderr subscriber instead of aborting.

use std::io;
use thiserror::Error;
use tracing_subscriber::{
    fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use tenantbase_core::{LoggerConfig, SERVICE_NAME, VERSION};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install log subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Logging configuration for tenantbase processes
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Enable pretty printing for development
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (supports complex filters like "tenantbase_orm=debug,tower_http=info")
    pub env_filter: Option<String>,
    pub service_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            env_filter: None,
            service_name: Some(SERVICE_NAME.to_string()),
        }
    }
}

impl LoggingConfig {
    /// Create production logging configuration
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            include_location: false,
            env_filter: Some("info,tower_http=warn,sqlx=warn".to_string()),
            service_name: Some(SERVICE_NAME.to_string()),
        }
    }

    /// Create development logging configuration
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: true,
            env_filter: Some("debug,tower_http=debug,sqlx=info".to_string()),
            service_name: Some(SERVICE_NAME.to_string()),
        }
    }

    /// Create test logging configuration (minimal output)
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            env_filter: None,
            service_name: None,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

impl From<&LoggerConfig> for LoggingConfig {
    fn from(logger: &LoggerConfig) -> Self {
        Self {
            level: logger.level.clone(),
            json_format: logger.json,
            ..Self::default()
        }
    }
}

/// Parse filter directives such as `info` or `tenantbase_orm=debug,sqlx=warn`
pub fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    Ok(EnvFilter::try_new(directives)?)
}

/// Initialize structured logging for the process.
///
/// `RUST_LOG` takes precedence over the configured directives.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(config.directives())?,
    };

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?;
    }

    tracing::debug!(
        target: "tenantbase::logging",
        service = config.service_name.as_deref().unwrap_or(SERVICE_NAME),
        version = VERSION,
        level = %config.level,
        format = if config.json_format { "json" } else { "text" },
        "Structured logging initialized"
    );

    Ok(())
}

/// Like [`init_logging`], but never fails.
///
/// On error one line goes to stderr and a plain stderr subscriber at `info`
/// is installed, unless some subscriber is already active.
pub fn init_logging_or_fallback(config: LoggingConfig) {
    if let Err(e) = init_logging(config) {
        eprintln!("{}: {}; logging to stderr at info level", SERVICE_NAME, e);
        let _ = tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_max_level(tracing::Level::INFO)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let prod = LoggingConfig::production();
        assert!(prod.json_format);
        assert_eq!(prod.directives(), "info,tower_http=warn,sqlx=warn");

        let dev = LoggingConfig::development();
        assert!(dev.pretty_print);
        assert!(dev.include_location);

        let test = LoggingConfig::test();
        assert_eq!(test.directives(), "error");
    }

    #[test]
    fn test_from_logger_config() {
        let logger = LoggerConfig {
            level: "warn".to_string(),
            json: true,
        };
        let config = LoggingConfig::from(&logger);
        assert_eq!(config.level, "warn");
        assert!(config.json_format);
        assert_eq!(config.directives(), "warn");
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("tenantbase_orm=debug,sqlx=warn").is_ok());
        assert!(matches!(
            parse_filter("tenantbase_orm=loud"),
            Err(LoggingError::Filter(_))
        ));
    }

    #[test]
    fn test_fallback_never_panics() {
        init_logging_or_fallback(LoggingConfig::test());
        // A subscriber is already installed now; the second call degrades quietly
        init_logging_or_fallback(LoggingConfig::test());
    }
}
