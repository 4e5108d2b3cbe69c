//! Logging bootstrap for commonroom
//!
//! All crates log through `tracing`; this module installs the subscriber once
//! per process. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        let level = LogLevel::parse(&config.level).ok_or_else(|| {
            LoggingError::InvalidConfiguration(format!("unknown level '{}'", config.level))
        })?;

        Ok(LogConfig::new(level)
            .with_target(config.with_target)
            .json_format(config.json_format))
    }
}

/// Install the global subscriber with default settings
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber
///
/// # Example
/// ```
/// use commonroom_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).with_target(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    // stdout is reserved for command output
    let fmt_layer = fmt::layer()
        .with_target(config.with_target)
        .with_writer(std::io::stderr);

    if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
            .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;
    }

    Ok(())
}
