//! Self-pipe signal delivery.
//!
//! Installed handlers write a single byte to a pipe and return; a
//! [`SelfPipe`]'s read half is registered with the caller's poller like any
//! other readable fd, and the poller wakes exactly once per signal batch.
//! All shutdown work happens in the main loop, never in the handler itself.

use std::io::{self, Read};
use std::os::unix::net::UnixStream;

pub use signal_hook::consts::{SIGINT, SIGTERM};

/// Owns the read half of a self-pipe whose write half is poked by a signal
/// handler installed via [`signal_hook`].
pub struct SelfPipe {
    reader: UnixStream,
}

impl SelfPipe {
    /// Installs handlers for every signal in `signals` that write to the
    /// pipe, and returns the read half for the caller to register with its
    /// poller.
    pub fn install(signals: &[libc::c_int]) -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        for &signal in signals {
            // SAFETY: `writer` is a plain fd write, the only operation
            // signal-hook performs from within the signal handler.
            signal_hook::low_level::pipe::register(signal, writer.try_clone()?)?;
        }
        Ok(Self { reader })
    }

    /// The read half, to be registered with a poller for readable events.
    pub fn reader(&self) -> &UnixStream {
        &self.reader
    }

    /// Converts self into the underlying read-half socket, e.g. to hand it
    /// to `mio::net::UnixStream::from_std`.
    pub fn into_reader(self) -> UnixStream {
        self.reader
    }

    /// Drains every byte currently queued on the pipe. Call this once the
    /// poller reports the reader as readable; it never blocks.
    pub fn drain(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 64];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn drain_consumes_all_queued_bytes() {
        let (mut writer, reader) = UnixStream::pair().unwrap();
        reader.set_nonblocking(true).unwrap();
        writer.write_all(&[0u8; 8]).unwrap();
        let mut pipe = SelfPipe { reader };
        std::thread::sleep(Duration::from_millis(10));
        pipe.drain().unwrap();
        // A second drain on an empty pipe must not block or error.
        pipe.drain().unwrap();
    }
}
