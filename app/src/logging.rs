//! File logging for the terminal UI.
//!
//! The UI owns the terminal, so events go to `<config dir>/logs/sqlb.log`
//! instead of stderr.

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "sqlb.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    /// Used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<PathBuf>, default_filter: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            default_filter: default_filter.into(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let appender = tracing_appender::rolling::never(&config.log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let registry = tracing_subscriber::registry().with(config.env_filter()).with(
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true),
    );
    if let Err(error) = registry.try_init() {
        eprintln!("logging already initialised: {error}");
    }

    Ok(guard)
}
