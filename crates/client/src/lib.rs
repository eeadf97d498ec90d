//! `ProxyFile`: the client-side endpoint of the ulog wire protocol.
//!
//! A `ProxyFile` looks like an append-only file to the caller, but every
//! write is relayed over a UNIX stream socket to a `ulog-daemon` process
//! that owns the real file descriptor. The socket is non-blocking end to
//! end; back-pressure is absorbed by a segmented send queue rather than by
//! blocking the caller's thread.

mod error;
mod poll;
mod proxy_file;
mod send_queue;

pub use error::ClientError;
pub use proxy_file::ProxyFile;
pub use send_queue::SendQueue;
