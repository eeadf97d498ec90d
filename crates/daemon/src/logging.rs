//! Sets up the daemon's own operational log: structured, to a file if
//! `--server-log-path` was given, otherwise to stderr.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the global `tracing` subscriber. The returned guard must be
/// held for the process lifetime when logging to a file: dropping it early
/// stops the background flush thread mid-write.
pub fn init(server_log_path: Option<&Path>) -> Option<WorkerGuard> {
    match server_log_path {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
                Some(guard)
            }
            Err(err) => {
                eprintln!(
                    "ulogd: failed to open server log {}: {err}, falling back to stderr",
                    path.display()
                );
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_writer(std::io::stderr)
                    .init();
                None
            }
        },
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
