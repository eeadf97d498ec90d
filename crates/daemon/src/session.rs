//! Per-connection state machine: HANDSHAKE until the terminating NUL
//! arrives, then STREAMING for the rest of the socket's life.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use tracing::warn;
use ulog_core::file_handler::{ClientId, FileHandlerRegistry};
use ulog_core::handshake::{HandshakeAccumulator, HandshakeOutcome};
use ulog_core::path::is_absolute;
use ulog_core::wire::{ERR_NOT_ABSOLUTE, ERR_PATH_TOO_LONG, OK_SENTINEL, RECV_BUFSIZE};
use ulog_core::WireError;

enum State {
    Handshake(HandshakeAccumulator),
    Streaming,
}

/// Result of feeding one `recv()` worth of bytes through the state machine.
pub enum ProcessResult {
    Continue,
    Disconnect,
}

/// What the caller should do once [`Session::on_readable`] returns.
pub enum SessionOutcome {
    Continue,
    Disconnect,
}

/// One accepted client connection.
pub struct Session {
    pub id: ClientId,
    pub path: Option<PathBuf>,
    stream: mio::net::UnixStream,
    state: State,
}

impl Session {
    pub fn new(id: ClientId, stream: mio::net::UnixStream, path_max: usize) -> Self {
        Self {
            id,
            path: None,
            stream,
            state: State::Handshake(HandshakeAccumulator::new(path_max)),
        }
    }

    pub fn stream_mut(&mut self) -> &mut mio::net::UnixStream {
        &mut self.stream
    }

    pub fn shutdown_read(&self) -> io::Result<()> {
        self.stream.shutdown(std::net::Shutdown::Read)
    }

    /// Drains the socket until it would block, driving the state machine on
    /// every chunk read. mio notifications are treated as edge-triggered
    /// hints: a single readable event may represent more than one `recv`
    /// worth of data, so this keeps reading until `WouldBlock`.
    pub fn on_readable(&mut self, registry: &mut FileHandlerRegistry) -> SessionOutcome {
        let mut buf = [0u8; RECV_BUFSIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return SessionOutcome::Disconnect,
                Ok(n) => match self.process(&buf[..n], registry) {
                    ProcessResult::Continue => continue,
                    ProcessResult::Disconnect => return SessionOutcome::Disconnect,
                },
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return SessionOutcome::Continue
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(client = self.id, error = %err, "read failed, disconnecting");
                    return SessionOutcome::Disconnect;
                }
            }
        }
    }

    fn process(&mut self, data: &[u8], registry: &mut FileHandlerRegistry) -> ProcessResult {
        match &mut self.state {
            State::Handshake(acc) => match acc.feed(data) {
                HandshakeOutcome::NeedMore => ProcessResult::Continue,
                HandshakeOutcome::TooLong => {
                    self.send_response(ERR_PATH_TOO_LONG);
                    ProcessResult::Disconnect
                }
                HandshakeOutcome::Ready { path, extra } => {
                    self.complete_handshake(path, extra, registry)
                }
            },
            State::Streaming => {
                let path = self.path.as_deref().expect("streaming implies a path");
                match registry.write(path, data) {
                    Ok(()) => ProcessResult::Continue,
                    Err(err) => {
                        warn!(client = self.id, path = %path.display(), error = %err, "write failed");
                        self.send_response(&WireError::from_io(&err).to_payload());
                        ProcessResult::Disconnect
                    }
                }
            }
        }
    }

    fn complete_handshake(
        &mut self,
        path_bytes: Vec<u8>,
        extra: Vec<u8>,
        registry: &mut FileHandlerRegistry,
    ) -> ProcessResult {
        if !is_absolute(&path_bytes) {
            self.send_response(ERR_NOT_ABSOLUTE);
            return ProcessResult::Disconnect;
        }
        let path = PathBuf::from(OsString::from_vec(path_bytes));
        if let Err(err) = registry.open(&path) {
            warn!(client = self.id, path = %path.display(), error = %err, "open failed");
            self.send_response(&WireError::from_io(&err).to_payload());
            return ProcessResult::Disconnect;
        }
        registry.new_client(&path, self.id);
        self.path = Some(path.clone());
        self.state = State::Streaming;
        if !extra.is_empty() {
            if let Err(err) = registry.write(&path, &extra) {
                warn!(client = self.id, path = %path.display(), error = %err, "extradata write failed");
                self.send_response(&WireError::from_io(&err).to_payload());
                return ProcessResult::Disconnect;
            }
        }
        self.send_response(OK_SENTINEL);
        ProcessResult::Continue
    }

    /// Sends a NUL-terminated response. Best-effort: the server has no
    /// per-operation retry, a response that would block is logged and the
    /// session is left for the caller to disconnect.
    pub(crate) fn send_response(&mut self, payload: &[u8]) {
        let mut msg = Vec::with_capacity(payload.len() + 1);
        msg.extend_from_slice(payload);
        msg.push(0);
        let mut data = &msg[..];
        while !data.is_empty() {
            match self.stream.write(data) {
                Ok(0) => return,
                Ok(n) => data = &data[n..],
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    warn!(client = self.id, "response would block, dropping remainder");
                    return;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::UnixStream as MioUnixStream;
    use std::os::unix::net::UnixStream as StdUnixStream;

    fn session_pair(path_max: usize) -> (Session, StdUnixStream) {
        let (a, b) = StdUnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let session = Session::new(1, MioUnixStream::from_std(a), path_max);
        (session, b)
    }

    #[test]
    fn happy_path_handshake_then_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("out.log");
        let (mut session, mut peer) = session_pair(4096);
        let mut registry = FileHandlerRegistry::new();

        let mut handshake = log_path.as_os_str().as_encoded_bytes().to_vec();
        handshake.push(0);
        handshake.extend_from_slice(b"hello\n");
        peer.write_all(&handshake).unwrap();

        assert!(matches!(
            session.on_readable(&mut registry),
            SessionOutcome::Continue
        ));
        assert_eq!(session.path.as_deref(), Some(log_path.as_path()));

        let mut resp = [0u8; 16];
        let n = peer.read(&mut resp).unwrap();
        assert_eq!(&resp[..n], b"OK\0");
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "hello\n");
    }

    #[test]
    fn relative_path_is_rejected() {
        let (mut session, mut peer) = session_pair(4096);
        let mut registry = FileHandlerRegistry::new();
        peer.write_all(b"relative/path\0").unwrap();
        assert!(matches!(
            session.on_readable(&mut registry),
            SessionOutcome::Disconnect
        ));
        let mut resp = [0u8; 64];
        let n = peer.read(&mut resp).unwrap();
        assert_eq!(&resp[..n], b"ValueError: not an absolute path\0");
    }
}
