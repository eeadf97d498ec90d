//! Shared test harness for spinning up a real `ulog-daemon` server on a
//! background thread and waiting on its observable side effects, so
//! integration tests exercise the actual socket rather than a mock.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ulog_daemon::Server;

/// A running server on a background thread, bound to a temporary socket
/// path. Dropping this without calling [`ServerGuard::join`] leaves the
/// thread running for the remainder of the test process; tests that
/// exercise shutdown should always join explicitly.
pub struct ServerGuard {
    handle: Option<JoinHandle<std::io::Result<()>>>,
    pub socket_path: PathBuf,
}

impl ServerGuard {
    /// Blocks until the server thread's `run()` returns, propagating a
    /// panic from the thread or the `io::Result` it returned.
    pub fn join(mut self) -> std::io::Result<()> {
        self.handle
            .take()
            .expect("join called twice")
            .join()
            .expect("server thread panicked")
    }
}

/// Starts a server bound to `socket_path` and waits until the socket file
/// exists before returning.
pub fn spawn_server(socket_path: PathBuf) -> ServerGuard {
    let server = Server::bind(&socket_path).expect("server should bind in tests");
    let handle = thread::spawn(move || server.run());
    wait_for(|| socket_path.exists(), Duration::from_secs(2))
        .then_some(())
        .unwrap_or_else(|| panic!("server socket {} never appeared", socket_path.display()));
    ServerGuard {
        handle: Some(handle),
        socket_path,
    }
}

/// Polls `check` until it returns `true` or `timeout` elapses.
pub fn wait_for(mut check: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// A unique socket path inside `dir`, short enough to stay under the
/// platform's `sockaddr_un` path limit even inside a deep temp directory.
pub fn socket_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Raises `SIGTERM` against the current process, for tests that exercise
/// the self-pipe shutdown path end to end. Affects every self-pipe
/// registered in the test binary, so callers should serialize such tests.
#[cfg(unix)]
pub fn raise_sigterm() {
    // SAFETY: `raise` with a valid signal number has no preconditions.
    unsafe {
        libc::raise(libc::SIGTERM);
    }
}
