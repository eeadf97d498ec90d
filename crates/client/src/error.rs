//! Error taxonomy for the client endpoint, matching the kinds `ulog-core`
//! describes in its wire-error propagation policy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use ulog_core::WireError;

/// Everything that can go wrong constructing or driving a [`crate::ProxyFile`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured socket path has no listener (`connect` saw `ENOENT`).
    #[error("server socket {path} not found")]
    NotFound { path: PathBuf },

    /// A client-local validation failure (embedded NUL, etc.) caught before
    /// any bytes reached the wire.
    #[error("{0}")]
    Configuration(String),

    /// The server rejected the handshake or reported a write failure.
    #[error("server error: {0}")]
    Server(#[from] WireError),

    /// The handshake response, or the close-time drain, did not complete
    /// within the configured timeout.
    #[error("timed out waiting for the server")]
    Timeout,

    /// `close()` could not flush the send queue before its timeout; the
    /// residual byte count is what remained unsent.
    #[error("timed out flushing {residual} queued bytes")]
    CloseTimeout { residual: usize },

    /// The server closed the connection without a response.
    #[error("server unexpectedly closed the connection")]
    Disconnect,

    #[error(transparent)]
    Io(#[from] io::Error),
}
