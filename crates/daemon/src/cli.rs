//! Daemon command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Local logging off-load daemon.
#[derive(Debug, Parser)]
#[command(name = "ulogd", version, about = "Local logging off-load daemon")]
pub struct Args {
    /// UNIX socket path clients connect to.
    #[arg(short = 's', long = "socket-file", default_value = "/tmp/ulog.sock")]
    pub socket_file: PathBuf,

    /// Optional file for the daemon's own operational log. Defaults to stderr.
    #[arg(short = 'l', long = "server-log-path")]
    pub server_log_path: Option<PathBuf>,
}
