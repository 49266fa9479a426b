//! # Logging
//!
//! Initializes `tracing` output: stderr always, plus a daily rolling file when
//! `logging.log_dir` is configured. `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Log file name prefix inside `log_dir`
const LOG_FILE_NAME: &str = "uav-log-analyst.log";

/// Keeps non-blocking writers alive; drop flushes them
pub struct LogGuards {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns error if the log directory cannot be created
pub fn init(config: &LoggingConfig) -> Result<LogGuards> {
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console_writer)
        .with_target(false)
        .with_filter(env_filter(&config.level));

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("create log dir: {}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter(&config.level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(LogGuards {
        _console: console_guard,
        _file: file_guard,
    })
}
