//! Logging initialisation for the splitload binary

use std::io;

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, LogFormat};

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    pub format: LogFormat,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (e.g. "splitload_orm=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            level: config.log_level.clone(),
            format: config.log_format,
            include_location: !config.environment.is_production(),
            env_filter: Some(format!(
                "splitload={level},splitload_orm={level},sqlx=warn",
                level = config.log_level
            )),
        }
    }
}

/// Initialize logging. `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = config.env_filter.as_deref().unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(env_filter))?;

    // Logs go to stderr so JSON graph dumps on stdout stay parseable
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(
                Layer::new()
                    .with_writer(io::stderr)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                Layer::new()
                    .with_writer(io::stderr)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Plain => registry
            .with(Layer::new().with_writer(io::stderr).with_target(false))
            .try_init()?,
    }

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "logging initialized"
    );
    Ok(())
}
