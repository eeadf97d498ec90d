//! The non-blocking socket endpoint that does the actual handshake and
//! streaming I/O.

use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{Shutdown, UnixStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::warn;
use ulog_core::wire::{BYE_SENTINEL, CHUNK_SIZE, OK_SENTINEL, RECV_BUFSIZE};
use ulog_core::WireError;

use crate::error::ClientError;
use crate::poll::{wait_readable, wait_writable};
use crate::send_queue::SendQueue;

/// Looks like an append-only file to the caller; every write is relayed to
/// a `ulog-daemon` over a UNIX stream socket.
///
/// Not thread-safe: a single `ProxyFile` must not be shared across threads
/// without external synchronization, matching the single-threaded
/// cooperative model the whole protocol is built on.
pub struct ProxyFile {
    sock: UnixStream,
    queue: SendQueue,
    timeout: Duration,
    closed: bool,
}

impl ProxyFile {
    /// Connects to `sock_path`, performs the handshake for `filepath`, and
    /// returns a `ProxyFile` ready for [`ProxyFile::write`].
    pub fn open(
        filepath: impl AsRef<Path>,
        sock_path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let filepath = filepath.as_ref();
        let raw = filepath.as_os_str().as_bytes();
        if raw.contains(&0) {
            return Err(ClientError::Configuration(
                WireError::embedded_nul().to_string(),
            ));
        }
        let abs = to_absolute(filepath)?;

        let sock_path = sock_path.as_ref();
        let sock = UnixStream::connect(sock_path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ClientError::NotFound {
                    path: sock_path.to_path_buf(),
                }
            } else {
                ClientError::Io(err)
            }
        })?;
        sock.set_nonblocking(true)?;

        let mut this = Self {
            sock,
            queue: SendQueue::new(CHUNK_SIZE),
            timeout,
            closed: false,
        };
        this.handshake(&abs, timeout)?;
        Ok(this)
    }

    fn handshake(&mut self, abs_path: &Path, timeout: Duration) -> Result<(), ClientError> {
        let mut payload = abs_path.as_os_str().as_bytes().to_vec();
        payload.push(0);
        if let Err(err) = self.send_all_or_fail(&payload) {
            return Err(err);
        }
        let response = self.recv_until_nul(timeout)?;
        if response == OK_SENTINEL {
            Ok(())
        } else {
            self.closed = true;
            Err(ClientError::Server(WireError::parse(&response)))
        }
    }

    /// Sends `data` in full, retrying on partial writes but not on
    /// would-block: the handshake is expected to fit comfortably within the
    /// kernel socket buffer.
    fn send_all_or_fail(&mut self, mut data: &[u8]) -> Result<(), ClientError> {
        while !data.is_empty() {
            match self.sock.write(data) {
                Ok(0) => return Err(ClientError::Disconnect),
                Ok(n) => data = &data[n..],
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    return Err(self.demux_broken_pipe());
                }
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
        Ok(())
    }

    /// Reads until a NUL-terminated message arrives or `timeout` elapses.
    fn recv_until_nul(&mut self, timeout: Duration) -> Result<Vec<u8>, ClientError> {
        let deadline = Instant::now() + timeout;
        let mut msg = Vec::new();
        let mut buf = [0u8; RECV_BUFSIZE];
        let mut first = true;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !first && remaining.is_zero() {
                return Err(ClientError::Timeout);
            }
            first = false;
            if !wait_readable(self.sock.as_raw_fd(), remaining)? {
                return Err(ClientError::Timeout);
            }
            match self.sock.read(&mut buf) {
                Ok(0) => return Err(ClientError::Disconnect),
                Ok(n) => {
                    if let Some(pos) = buf[..n].iter().position(|&b| b == 0) {
                        msg.extend_from_slice(&buf[..pos]);
                        return Ok(msg);
                    }
                    msg.extend_from_slice(&buf[..n]);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
    }

    /// After a broken pipe, gives the server one last zero-timeout chance to
    /// have already delivered an error payload, rather than surfacing a bare
    /// `BrokenPipeError` that hides the real reason.
    fn demux_broken_pipe(&mut self) -> ClientError {
        match self.recv_until_nul(Duration::ZERO) {
            Ok(payload) => ClientError::Server(WireError::parse(&payload)),
            Err(_) => ClientError::Io(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    /// Writes `bytes` to the proxied file. Order is preserved: any
    /// previously queued bytes are drained first. A partial send queues the
    /// remainder and still returns `Ok(())` to the caller.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.drain_queue()?;
        if !self.queue.is_empty() {
            self.queue.put(bytes);
            return Ok(());
        }
        match self.send_best_effort(bytes)? {
            Some(unsent) => {
                self.queue.put(unsent);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Sends as much of `data` as the socket accepts without blocking;
    /// returns the unsent remainder, if any.
    fn send_best_effort<'a>(&mut self, mut data: &'a [u8]) -> Result<Option<&'a [u8]>, ClientError> {
        while !data.is_empty() {
            match self.sock.write(data) {
                Ok(0) => return Err(ClientError::Disconnect),
                Ok(n) => data = &data[n..],
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Some(data)),
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    return Err(self.demux_broken_pipe());
                }
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
        Ok(None)
    }

    fn drain_queue(&mut self) -> Result<(), ClientError> {
        while let Some(chunk) = self.queue.peek() {
            let chunk = chunk.to_vec();
            match self.sock.write(&chunk) {
                Ok(0) => return Err(ClientError::Disconnect),
                Ok(n) => self.queue.done(n),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    return Err(self.demux_broken_pipe());
                }
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flushes any queued bytes (subject to the configured timeout),
    /// half-closes for writing, and releases the socket. Idempotent.
    pub fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.drain_with_timeout();
        let _ = self.sock.shutdown(Shutdown::Write);
        // Best-effort: tolerate either a "BYE" sentinel or a bare EOF, per
        // the protocol's open question on the goodbye response.
        match self.recv_until_nul(self.timeout.min(Duration::from_millis(200))) {
            Ok(payload) if payload == BYE_SENTINEL => {}
            Ok(other) => warn!(payload = ?other, "unexpected close response"),
            Err(_) => {}
        }
        result
    }

    fn drain_with_timeout(&mut self) -> Result<(), ClientError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            self.drain_queue()?;
            if self.queue.is_empty() {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::CloseTimeout {
                    residual: self.queue.len(),
                });
            }
            if !wait_writable(self.sock.as_raw_fd(), remaining)? {
                return Err(ClientError::CloseTimeout {
                    residual: self.queue.len(),
                });
            }
        }
    }
}

impl Drop for ProxyFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "error closing ProxyFile during drop");
        }
    }
}

/// Mirrors `os.path.abspath`: joins a relative path onto the current
/// working directory without resolving symlinks or `..` components beyond
/// what [`Path::join`] already collapses lexically.
fn to_absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn socket_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn handshake_succeeds_on_ok_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = socket_path(&dir, "t.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let n = conn.read(&mut buf).unwrap();
            assert!(buf[..n].ends_with(b"\0"));
            conn.write_all(b"OK\0").unwrap();
            conn
        });
        let log_path = dir.path().join("out.log");
        let proxy = ProxyFile::open(&log_path, &sock_path, Duration::from_secs(1));
        assert!(proxy.is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn handshake_surfaces_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = socket_path(&dir, "t.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = conn.read(&mut buf).unwrap();
            conn.write_all(b"ValueError: not an absolute path\0").unwrap();
        });
        let log_path = dir.path().join("out.log");
        let err = ProxyFile::open(&log_path, &sock_path, Duration::from_secs(1)).unwrap_err();
        match err {
            ClientError::Server(wire) => assert_eq!(wire.kind, "ValueError"),
            other => panic!("unexpected error: {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn connect_to_missing_socket_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = socket_path(&dir, "absent.sock");
        let log_path = dir.path().join("out.log");
        let err = ProxyFile::open(&log_path, &sock_path, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[test]
    fn embedded_nul_is_rejected_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = socket_path(&dir, "absent.sock");
        let bad_path: &std::ffi::OsStr = std::ffi::OsStr::new("/tmp/has\0nul");
        let err = ProxyFile::open(bad_path, &sock_path, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn write_after_handshake_reaches_server() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = socket_path(&dir, "t.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = conn.read(&mut buf).unwrap();
            conn.write_all(b"OK\0").unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 64];
            loop {
                match conn.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&chunk[..n]),
                }
            }
            received
        });
        let log_path = dir.path().join("out.log");
        let mut proxy =
            ProxyFile::open(&log_path, &sock_path, Duration::from_secs(1)).unwrap();
        proxy.write(b"hello\n").unwrap();
        proxy.close().unwrap();
        let received = handle.join().unwrap();
        assert_eq!(received, b"hello\n");
    }
}
