//! Structured logging setup.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter is
//! chosen in this order:
//! 1. `--verbose` (debug for this crate)
//! 2. `RUST_LOG`
//! 3. `log.level` from the config file

use std::io::IsTerminal;

use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};

const VERBOSE_FILTER: &str = "info,ferrosmith=debug";

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level {level:?}: {message}")]
    InvalidFilter { level: String, message: String },

    #[error("failed to install logger: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig, verbose: bool) -> Result<(), LoggingError> {
    let filter = build_env_filter(config, verbose)?;
    let base_subscriber = Registry::default().with(filter);

    match config.format {
        LogFormat::Json => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Text => base_subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

fn build_env_filter(config: &LogConfig, verbose: bool) -> Result<EnvFilter, LoggingError> {
    if verbose {
        return filter_from_level(VERBOSE_FILTER);
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    filter_from_level(&config.level)
}

fn filter_from_level(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        level: level.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins() {
        let config = LogConfig {
            level: "error".to_string(),
            format: LogFormat::Text,
        };
        let filter = build_env_filter(&config, true).unwrap();
        assert!(filter.to_string().contains("ferrosmith=debug"));
    }

    #[test]
    fn test_config_levels() {
        assert!(filter_from_level("warn").is_ok());
        assert!(filter_from_level("info,ferrosmith::build=trace").is_ok());

        let err = filter_from_level("ferrosmith=loud").unwrap_err();
        assert!(err.to_string().contains("ferrosmith=loud"));
    }
}
