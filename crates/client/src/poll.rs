//! A minimal `poll(2)` wrapper: the only unsafe surface in this crate,
//! isolated here so the rest of the client can reason about readiness as a
//! plain boolean.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

fn wait(fd: RawFd, events: libc::c_short, timeout: Duration) -> io::Result<bool> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        let millis = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);
        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        // SAFETY: `pfd` is a single valid pollfd on the stack, `poll` writes
        // only to `revents` within its bounds.
        let rv = unsafe { libc::poll(&mut pfd, 1, millis) };
        match rv {
            0 => return Ok(false),
            n if n > 0 => return Ok(true),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted && std::time::Instant::now() < deadline
                {
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// Blocks until `fd` is readable or `timeout` elapses; returns `false` on
/// timeout.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    wait(fd, libc::POLLIN, timeout)
}

/// Blocks until `fd` is writable or `timeout` elapses; returns `false` on
/// timeout.
pub fn wait_writable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    wait(fd, libc::POLLOUT, timeout)
}
