//! Constants for the NUL-framed handshake/response wire protocol.
//!
//! Every message that crosses the socket, in either direction, is a byte
//! string terminated by a single `0x00`. During the handshake the client
//! sends an absolute path and the server replies with [`OK_SENTINEL`] or a
//! `"<ErrorKind>: <message>"` payload. After the handshake the stream is
//! opaque: bytes are appended to the target file verbatim.

/// Success sentinel sent by the server once the handshake completes.
pub const OK_SENTINEL: &[u8] = b"OK";

/// Optional goodbye sentinel a server may send before closing a clean
/// client-initiated shutdown. No released server version emits this; clients
/// must tolerate a bare EOF in its place (see design notes in the protocol
/// write-up this crate implements).
pub const BYE_SENTINEL: &[u8] = b"BYE";

/// Payload sent to every live session when the server begins graceful
/// shutdown, before half-closing the session for reads.
pub const SHUTDOWN_NOTICE: &[u8] = b"OSError: ulog server exited";

/// Error payload for a handshake path whose pre-NUL byte count exceeds
/// `PATH_MAX`.
pub const ERR_PATH_TOO_LONG: &[u8] = b"ValueError: path longer than PATH_MAX";

/// Error payload for a handshake path that does not start with `/`.
pub const ERR_NOT_ABSOLUTE: &[u8] = b"ValueError: not an absolute path";

/// The chunk size used by the client's segmented send queue. Matches the
/// server's read buffer size so a queued chunk and a single `recv` are the
/// same order of magnitude.
pub const CHUNK_SIZE: usize = 4096;

/// Read buffer size used by the server for each `recv` call.
pub const RECV_BUFSIZE: usize = 4096;
