//! Logging setup for printctl binaries.
//!
//! Installs a global `tracing` subscriber with two outputs:
//! - A log file (truncated at session start) written through a non-blocking
//!   appender
//! - Compact console output on stderr, so stdout stays free for command data
//!
//! The level comes from `RUST_LOG` when set, otherwise from the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default directory for log files.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "printctl.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Initialize logging.
///
/// Creates `log_dir` if needed and clears any previous `log_file` in it.
/// `default_level` is an `EnvFilter` directive used when `RUST_LOG` is unset
/// (e.g. `"info"` or `"printctl=debug"`).
///
/// # Errors
///
/// Fails if the directory or file cannot be prepared, or if a global
/// subscriber is already installed.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    log_file: &str,
    default_level: &str,
) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_dir.as_ref();
    let path = prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(true);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// Creates the directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}
