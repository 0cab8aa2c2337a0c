//! Logging and tracing initialization.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level`. When `config.file` is
/// set, log lines are appended there instead of stderr; a file that cannot
/// be opened falls back to stderr with a warning.
pub fn init_logging(config: &LoggingConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let (log_file, open_error) = match config.file.as_deref().map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };

    let installed = match (log_file, config.json) {
        (Some(file), true) => tracing::subscriber::set_global_default(
            fmt::Subscriber::builder()
                .with_env_filter(filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .json()
                .finish(),
        ),
        (Some(file), false) => tracing::subscriber::set_global_default(
            fmt::Subscriber::builder()
                .with_env_filter(filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .finish(),
        ),
        (None, true) => tracing::subscriber::set_global_default(
            fmt::Subscriber::builder()
                .with_env_filter(filter())
                .json()
                .finish(),
        ),
        (None, false) => tracing::subscriber::set_global_default(
            fmt::Subscriber::builder()
                .with_env_filter(filter())
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        ),
    };

    // A second init (tests, embedded use) keeps the first subscriber.
    installed.ok();

    if let (Some(err), Some(path)) = (open_error, config.file.as_ref()) {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "Cannot open log file, logging to stderr"
        );
    }
}

/// Open `path` for appending, creating it if missing.
fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}
