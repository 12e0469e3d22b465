//! Logging setup
//!
//! Installs the global `tracing` subscriber from a [`LoggingConfig`].
//! `RUST_LOG` directives take precedence over the configured level.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Result, TransferError};

/// Install the subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let writer = make_writer(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(config.log_to_console && !config.log_to_file)
        .with_writer(writer);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed
        .map_err(|e| TransferError::ConfigError(format!("Failed to install logger: {e}")))?;

    debug!(app = %config.app_name, level = %config.log_level, json = config.json_format, "Logger installed");
    Ok(())
}

fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter> {
    let file = match (config.log_to_file, config.log_file_path.as_deref()) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    TransferError::ConfigError(format!("Failed to open log file {path}: {e}"))
                })?;
            Some(Arc::new(file))
        }
        _ => None,
    };

    let writer = match (config.log_to_console, file) {
        (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(file)),
        (false, Some(file)) => BoxMakeWriter::new(file),
        (true, None) => BoxMakeWriter::new(std::io::stderr),
        (false, None) => BoxMakeWriter::new(std::io::sink),
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_file_writer_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transfer.log");
        let config = LoggingConfig {
            log_to_console: false,
            log_to_file: true,
            log_file_path: Some(path.to_string_lossy().into_owned()),
            ..LoggingConfig::default()
        };
        assert!(make_writer(&config).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: Some(dir.path().join("missing/x.log").to_string_lossy().into_owned()),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            make_writer(&config),
            Err(TransferError::ConfigError(_))
        ));
    }
}
