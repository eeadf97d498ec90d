//! The `"<ErrorKind>: <message>"` error payload used on the wire, and the
//! mapping from `std::io::Error` to the short textual tag a client uses to
//! recover a typed error.

use std::fmt;
use std::io;

/// A structured error as it travels over the wire: a short tag (`ValueError`,
/// `PermissionError`, `OSError`, ...) followed by a human-readable message.
///
/// This mirrors the source implementation's habit of formatting the last
/// line of a caught exception and sending `f"{type(exc).__name__}: {exc}"`
/// to the peer. We don't have Python's exception hierarchy, so [`WireError`]
/// picks the closest-matching tag from the underlying [`io::ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub kind: &'static str,
    pub message: String,
}

impl WireError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_absolute() -> Self {
        Self::new("ValueError", "not an absolute path")
    }

    pub fn path_too_long() -> Self {
        Self::new("ValueError", "path longer than PATH_MAX")
    }

    pub fn embedded_nul() -> Self {
        Self::new("ValueError", "embedded null byte in filepath")
    }

    /// Builds a `WireError` from an I/O failure, picking the error-class tag
    /// a Python client would see for the equivalent `OSError` subclass.
    pub fn from_io(err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => "PermissionError",
            io::ErrorKind::NotFound => "FileNotFoundError",
            io::ErrorKind::AlreadyExists => "FileExistsError",
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => "ValueError",
            io::ErrorKind::TimedOut => "TimeoutError",
            io::ErrorKind::BrokenPipe => "BrokenPipeError",
            io::ErrorKind::ConnectionReset => "ConnectionResetError",
            _ => "OSError",
        };
        Self::new(kind, err.to_string())
    }

    /// Renders the `"<ErrorKind>: <message>"` wire form, without the
    /// terminating NUL (callers append that when framing the response).
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses a `"<ErrorKind>: <message>"` payload received from the peer.
    /// Payloads that don't match the expected shape are reported verbatim
    /// under the `ValueError` tag, mirroring the source's fallback.
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        match text.split_once(": ") {
            Some((kind, message)) if is_known_tag(kind) => Self::new(
                known_tag(kind),
                message.to_string(),
            ),
            _ => Self::new("ValueError", text.into_owned()),
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for WireError {}

const KNOWN_TAGS: &[&str] = &[
    "ValueError",
    "PermissionError",
    "FileNotFoundError",
    "FileExistsError",
    "TimeoutError",
    "BrokenPipeError",
    "ConnectionResetError",
    "OSError",
];

fn is_known_tag(tag: &str) -> bool {
    KNOWN_TAGS.contains(&tag)
}

fn known_tag(tag: &str) -> &'static str {
    KNOWN_TAGS
        .iter()
        .find(|&&known| known == tag)
        .copied()
        .unwrap_or("OSError")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_kind_and_message() {
        let err = WireError::not_absolute();
        assert_eq!(err.to_string(), "ValueError: not an absolute path");
    }

    #[test]
    fn parses_known_tag() {
        let err = WireError::parse(b"PermissionError: denied");
        assert_eq!(err.kind, "PermissionError");
        assert_eq!(err.message, "denied");
    }

    #[test]
    fn unknown_tag_falls_back_to_value_error() {
        let err = WireError::parse(b"WeirdError: whatever");
        assert_eq!(err.kind, "ValueError");
        assert_eq!(err.message, "WeirdError: whatever");
    }

    #[test]
    fn maps_permission_denied() {
        let io_err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(WireError::from_io(&io_err).kind, "PermissionError");
    }
}
