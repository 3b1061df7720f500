// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::writers::file_writer;

/// Log level for filtering log events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates lower priority information.
    Debug,
    /// Designates useful information.
    Info,
    /// Designates hazardous situations.
    Warn,
    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Configuration for the agent logger: each destination is optional.
#[derive(Debug, Default, Clone)]
pub struct LoggerConfig {
    /// Path of the main application log file; follows `level`.
    pub app_log_file: Option<String>,
    /// Path of the error log file; always filtered at `ERROR`.
    pub error_log_file: Option<String>,
    /// Path of the access log file; filtered at `INFO`.
    pub access_log_file: Option<String>,
    /// Path of the debug log file; always filtered at `DEBUG`.
    pub debug_log_file: Option<String>,
    /// Minimum level for the app file and stderr.
    pub level: LogLevel,
    /// Also write to stderr (used when no app log file is configured or the
    /// agent runs in the foreground).
    pub stderr: bool,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Keeps the non-blocking writer threads alive for the life of the process.
///
/// Dropping the guard flushes and stops the appenders, so `main` should hold
/// it until shutdown.
pub struct LoggerGuard {
    #[allow(dead_code)]
    guards: Vec<WorkerGuard>,
}

/// Install the global logger from `config`.
///
/// Fails if a configured log file cannot be opened or if a global subscriber
/// is already installed; both are fatal at startup.
pub fn init(config: &LoggerConfig) -> io::Result<LoggerGuard> {
    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if let Some(path) = &config.app_log_file {
        let (writer, guard) = file_writer(path)?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(LevelFilter::from(config.level))
                .boxed(),
        );
    }

    if let Some(path) = &config.error_log_file {
        let (writer, guard) = file_writer(path)?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
    }

    if let Some(path) = &config.access_log_file {
        let (writer, guard) = file_writer(path)?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(LevelFilter::INFO)
                .boxed(),
        );
    }

    if let Some(path) = &config.debug_log_file {
        let (writer, guard) = file_writer(path)?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG)
                .boxed(),
        );
    }

    if config.stderr || layers.is_empty() {
        layers.push(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_filter(LevelFilter::from(config.level))
                .boxed(),
        );
    }

    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io::Error::other(format!("failed to set global subscriber: {e}")))?;

    Ok(LoggerGuard { guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::INFO);
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }
}
