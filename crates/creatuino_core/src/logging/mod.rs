//! Logging infrastructure for creatuino.
//!
//! The core crate only emits `tracing` events; this module installs the
//! subscriber once at startup:
//! - Respects the RUST_LOG environment variable
//! - Falls back to the level resolved from configuration / `-v` flags
//! - Outputs to stderr, plus an optional plain-text log file

mod types;

pub use types::LogLevel;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// When `log_file` is given, events are also appended to it through a
/// non-blocking writer. The returned guard must be kept alive until exit so
/// buffered lines are flushed.
pub fn init_tracing(
    default_level: LogLevel,
    log_file: Option<&Path>,
) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}
