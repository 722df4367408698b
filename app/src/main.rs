mod logging;

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use sqlb_core::connection_manager::DatabaseTarget;
use sqlb_core::settings::{default_config_dir, FileSettingsStore, SettingsError};
use sqlb_tui::{TuiError, TuiOptions};

use crate::logging::LoggingConfig;

/// Terminal query builder and validator for SQLite databases.
#[derive(Debug, Parser)]
#[command(name = "sqlb", version, about)]
struct Args {
    /// Database file to open on startup, or `:memory:`.
    database: Option<String>,

    /// Open the database without write access.
    #[arg(long)]
    read_only: bool,

    /// Directory for settings, history, favorites, templates and logs.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Tracing filter directive; `RUST_LOG` takes precedence.
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,
}

fn build_options(args: Args) -> Result<TuiOptions, SettingsError> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let settings = FileSettingsStore::load_from_dir(&config_dir)?;
    let database = args
        .database
        .as_deref()
        .and_then(DatabaseTarget::parse)
        .map(|target| target.with_read_only(args.read_only));

    Ok(TuiOptions {
        settings,
        config_dir,
        database,
        read_only: args.read_only,
    })
}

/// `--log-filter` applies to this run only and is never written back to
/// `settings.toml`.
fn logging_config(log_filter: Option<String>, options: &TuiOptions) -> LoggingConfig {
    LoggingConfig::new(
        options.config_dir.join("logs"),
        log_filter.unwrap_or_else(|| options.settings.settings().log_filter.clone()),
    )
}

fn run_app(
    options: TuiOptions,
    run_tui: impl FnOnce(TuiOptions) -> Result<(), TuiError>,
) -> Result<(), Box<dyn Error>> {
    tracing::info!(
        config_dir = %options.config_dir.display(),
        database = ?options.database,
        "starting sqlb"
    );
    run_tui(options)?;
    tracing::info!("sqlb exited");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = Args::parse();
    let log_filter = args.log_filter.take();
    let options = build_options(args)?;
    let _guard = logging::init(&logging_config(log_filter, &options))?;
    run_app(options, sqlb_tui::run)
}

#[cfg(test)]
mod tests {
    use std::io;

    use clap::Parser;
    use sqlb_core::connection_manager::DatabaseLocation;
    use tempfile::TempDir;

    use super::{build_options, logging_config, run_app, Args};

    fn args(extra: &[&str], dir: &TempDir) -> Args {
        let config_dir = dir.path().to_string_lossy().into_owned();
        let mut argv = vec!["sqlb", "--config-dir", config_dir.as_str()];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn database_argument_is_opened_with_requested_mode() {
        let dir = TempDir::new().expect("temp dir");
        let options = build_options(args(&["shop.db", "--read-only"], &dir)).expect("options");

        let database = options.database.expect("database target");
        assert_eq!(database.location, DatabaseLocation::File("shop.db".into()));
        assert!(database.read_only);
        assert!(options.read_only);
        assert_eq!(options.config_dir, dir.path());
    }

    #[test]
    fn log_filter_flag_applies_to_this_run_only() {
        let dir = TempDir::new().expect("temp dir");
        let mut parsed = args(&["--log-filter", "sqlb=trace"], &dir);
        let log_filter = parsed.log_filter.take();
        let options = build_options(parsed).expect("options");
        assert!(options.database.is_none());

        let logging = logging_config(log_filter, &options);
        assert_eq!(logging.default_filter, "sqlb=trace");
        assert_eq!(logging.log_dir, dir.path().join("logs"));
        assert_eq!(options.settings.settings().log_filter, "info");

        options.settings.persist().expect("settings should persist");
        let stored = std::fs::read_to_string(options.settings.path()).expect("settings file");
        assert!(!stored.contains("sqlb=trace"), "{stored}");

        let without_flag = logging_config(None, &options);
        assert_eq!(without_flag.default_filter, "info");
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let dir = TempDir::new().expect("temp dir");
        let options = build_options(args(&[":memory:"], &dir)).expect("options");
        assert!(run_app(options.clone(), |_| Ok(())).is_ok());

        let result = run_app(options, |_| {
            Err(sqlb_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }
}
