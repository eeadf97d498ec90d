//! The ulog daemon: a single-threaded, readiness-driven server that accepts
//! local clients over a UNIX stream socket, handshakes each on a target
//! filepath, and appends their streamed bytes to a shared file handle.
//!
//! `ulog-daemon` owns all of the actual socket I/O; the handshake parser
//! and the file-handler registry it drives live in `ulog-core` and are
//! exercised there without any sockets at all.

pub mod cli;
mod logging;
pub mod server;
mod session;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use cli::Args;
pub use server::Server;

/// Parses `args`, starts the server, and runs it to completion. Mirrors the
/// thin `main()` pattern: all decisions happen here so the binary entry
/// point stays a one-liner.
pub fn run<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(err) => {
            let _ = write!(stderr, "{err}");
            return if err.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let _guard = logging::init(args.server_log_path.as_deref());

    let server = match server::Server::bind(&args.socket_file) {
        Ok(server) => server,
        Err(err) => {
            let _ = writeln!(
                stderr,
                "ulogd: failed to bind {}: {err}",
                args.socket_file.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let _ = writeln!(stdout, "ulogd: listening on {}", args.socket_file.display());

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "event loop exited with an error");
            let _ = writeln!(stderr, "ulogd: {err}");
            ExitCode::FAILURE
        }
    }
}
