//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`; command output (progress
//! lines, the status table) stays on stdout.

use std::io;

use clap::ValueEnum;
use serde_json::json;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Pretty,
    Json,
}

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "rollcall_migrations=debug,sqlx=warn")
    pub level: String,
    pub format: LogFormat,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Plain,
            service_name: None,
            service_version: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_service(mut self, name: &str, version: &str) -> Self {
        self.service_name = Some(name.to_string());
        self.service_version = Some(version.to_string());
        self
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over the configured level
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).pretty())
            .try_init()?,
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr))
            .try_init()?,
    }

    let mut init_msg = json!({
        "message": "Logging initialized",
        "level": config.level,
        "format": format!("{:?}", config.format).to_lowercase(),
    });
    if let Some(name) = config.service_name {
        init_msg["service_name"] = json!(name);
    }
    if let Some(version) = config.service_version {
        init_msg["service_version"] = json!(version);
    }
    tracing::debug!(target: "rollcall::logging", "{}", init_msg);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_level("debug")
            .with_format(LogFormat::Json)
            .with_service("rollcall", "0.3.0");

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.service_name.as_deref(), Some("rollcall"));
        assert_eq!(config.service_version.as_deref(), Some("0.3.0"));
    }

    #[test]
    fn test_default_is_quiet_plain_text() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Plain);
    }

    #[test]
    fn test_log_format_from_flag() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("xml", true).is_err());
    }
}
