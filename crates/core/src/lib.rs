//! Shared protocol, error taxonomy, and server-side data model for `ulog`.
//!
//! This crate has no knowledge of sockets or pollers. It exists so that the
//! handshake parser and the [`FileHandlerRegistry`] can be exercised with
//! plain byte slices in unit tests, while `ulog-daemon` supplies the actual
//! non-blocking I/O around them.

pub mod error;
pub mod file_handler;
pub mod handshake;
pub mod path;
pub mod wire;

pub use error::WireError;
pub use file_handler::{ClientId, FileHandlerRegistry};
pub use handshake::{HandshakeAccumulator, HandshakeOutcome};
