//! Tracing subscriber setup
//!
//! Logs go to stderr, and additionally to a daily rolling file when a log
//! directory is configured. `RUST_LOG` overrides the configured filter.

use crate::config::LoggingConfig;
use crate::error::{BridgeError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter from `RUST_LOG`, falling back to the configured directive
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            BridgeError::Config(format!("Invalid log filter '{}': {}", config.filter, e))
        }),
    }
}

/// Install the global subscriber
///
/// `file_prefix` names the rolling files (`<prefix>.YYYY-MM-DD`), so the
/// bridge and its controller child can share one directory. Keep the
/// returned guard alive for the life of the process or buffered file output
/// is lost.
pub fn init(config: &LoggingConfig, file_prefix: &str) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| BridgeError::Config(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_invalid_filter_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            filter: "info,arduino_bridge=loud".to_string(),
            directory: None,
        };
        assert!(matches!(env_filter(&config), Err(BridgeError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_config() {
        std::env::set_var("RUST_LOG", "warn");
        let config = LoggingConfig {
            filter: "not a = valid [filter".to_string(),
            directory: None,
        };
        let result = env_filter(&config);
        std::env::remove_var("RUST_LOG");
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_default_filter_parses() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter(&LoggingConfig::default()).is_ok());
    }
}
