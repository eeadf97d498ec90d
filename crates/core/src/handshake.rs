//! The sans-I/O half of the session handshake: accumulating bytes before the
//! terminating NUL of the handshake filepath.
//!
//! [`HandshakeAccumulator`] knows nothing about sockets. It is fed whatever
//! bytes a `recv` call returned and reports back whether a full path has
//! arrived, whether the path overflowed `PATH_MAX`, and any bytes the client
//! pipelined after the NUL ("extradata" in the wire write-up).

use memchr::memchr;

/// Result of feeding a chunk of bytes to a [`HandshakeAccumulator`].
#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// No NUL seen yet; keep accumulating.
    NeedMore,
    /// The accumulator (including this chunk) exceeded `PATH_MAX` bytes
    /// before a NUL terminator was found.
    TooLong,
    /// A NUL terminator arrived. `path` is the OS-encoded bytes before it;
    /// `extra` is whatever followed it in the same `recv` (the first
    /// streaming write, to be applied before the OK response is sent).
    Ready { path: Vec<u8>, extra: Vec<u8> },
}

/// Accumulates the pre-NUL bytes of a handshake filepath, enforcing
/// `PATH_MAX` as it goes.
pub struct HandshakeAccumulator {
    buf: Vec<u8>,
    path_max: usize,
}

impl HandshakeAccumulator {
    pub fn new(path_max: usize) -> Self {
        Self {
            buf: Vec::new(),
            path_max,
        }
    }

    /// Bytes currently buffered, belonging to the not-yet-terminated path.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Feeds `data` (bytes freshly read from the socket) to the accumulator.
    ///
    /// The overflow check runs against whatever preceded the NUL in this
    /// call, even if a NUL arrived in the same chunk: a handshake that
    /// smuggles a huge path and its terminator in one `recv` is still
    /// rejected as too long, it does not get to "sneak in" under the wire.
    pub fn feed(&mut self, data: &[u8]) -> HandshakeOutcome {
        let (head, tail) = match memchr(0, data) {
            Some(pos) => (&data[..pos], Some(&data[pos + 1..])),
            None => (data, None),
        };
        self.buf.extend_from_slice(head);
        if self.buf.len() > self.path_max {
            return HandshakeOutcome::TooLong;
        }
        match tail {
            None => HandshakeOutcome::NeedMore,
            Some(extra) => HandshakeOutcome::Ready {
                path: std::mem::take(&mut self.buf),
                extra: extra.to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_calls() {
        let mut acc = HandshakeAccumulator::new(4096);
        assert_eq!(acc.feed(b"/tmp/"), HandshakeOutcome::NeedMore);
        assert_eq!(
            acc.feed(b"out.log\0hello"),
            HandshakeOutcome::Ready {
                path: b"/tmp/out.log".to_vec(),
                extra: b"hello".to_vec(),
            }
        );
    }

    #[test]
    fn empty_handshake_is_ready_with_empty_path() {
        let mut acc = HandshakeAccumulator::new(4096);
        assert_eq!(
            acc.feed(b"\0"),
            HandshakeOutcome::Ready {
                path: Vec::new(),
                extra: Vec::new(),
            }
        );
    }

    #[test]
    fn exact_path_max_without_nul_is_allowed() {
        let mut acc = HandshakeAccumulator::new(8);
        assert_eq!(acc.feed(&b"a"[..].repeat(8)), HandshakeOutcome::NeedMore);
    }

    #[test]
    fn one_byte_over_path_max_without_nul_errors() {
        let mut acc = HandshakeAccumulator::new(8);
        assert_eq!(acc.feed(&b"a"[..].repeat(9)), HandshakeOutcome::TooLong);
    }

    #[test]
    fn overflow_detected_even_when_nul_arrives_in_same_chunk() {
        let mut acc = HandshakeAccumulator::new(4);
        let mut chunk = b"a".repeat(5);
        chunk.push(0);
        assert_eq!(acc.feed(&chunk), HandshakeOutcome::TooLong);
    }

    #[test]
    fn embedded_nul_in_data_terminates_at_first_nul() {
        let mut acc = HandshakeAccumulator::new(4096);
        assert_eq!(
            acc.feed(b"foo\0bar"),
            HandshakeOutcome::Ready {
                path: b"foo".to_vec(),
                extra: b"bar".to_vec(),
            }
        );
    }
}
