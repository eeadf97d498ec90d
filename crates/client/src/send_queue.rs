//! The segmented send queue: a FIFO of fixed-size chunks holding bytes that
//! could not be sent immediately.
//!
//! A single growing `Vec` would require shifting every remaining byte left
//! each time the head is consumed. Chunking bounds that cost: only the head
//! chunk is ever partially consumed, and fully-drained chunks are dropped
//! wholesale.

use std::collections::VecDeque;

/// A FIFO of byte chunks, each at most `chunk_size` bytes. The first and
/// last chunks may be partially filled; interior chunks are always exactly
/// `chunk_size`.
pub struct SendQueue {
    chunks: VecDeque<Vec<u8>>,
    chunk_size: usize,
    len: usize,
}

impl SendQueue {
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        Self {
            chunks: VecDeque::new(),
            chunk_size,
            len: 0,
        }
    }

    /// Total queued bytes across every chunk.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `bytes` to the tail, topping up the last chunk before
    /// allocating new ones.
    pub fn put(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        if let Some(tail) = self.chunks.back_mut() {
            let room = self.chunk_size - tail.len();
            if room > 0 {
                let take = room.min(rest.len());
                tail.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
            }
        }
        for piece in rest.chunks(self.chunk_size) {
            self.chunks.push_back(piece.to_vec());
        }
        self.len += bytes.len();
    }

    /// The head chunk's current contents, or `None` if the queue is empty.
    pub fn peek(&self) -> Option<&[u8]> {
        self.chunks.front().map(Vec::as_slice)
    }

    /// Removes `n` bytes from the front, across as many chunks as
    /// necessary. Panics if `n` exceeds the queued length, which would
    /// indicate a caller bug (consuming more than was ever peeked).
    pub fn done(&mut self, mut n: usize) {
        assert!(n <= self.len, "done() consumed more than was queued");
        self.len -= n;
        while n > 0 {
            let front = self.chunks.front_mut().expect("len tracked consistently");
            if n < front.len() {
                front.drain(..n);
                break;
            }
            n -= front.len();
            self.chunks.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_fills_tail_before_allocating() {
        let mut q = SendQueue::new(4);
        q.put(b"ab");
        q.put(b"cd");
        assert_eq!(q.len(), 4);
        assert_eq!(q.peek(), Some(&b"abcd"[..]));
    }

    #[test]
    fn put_spills_into_new_chunks() {
        let mut q = SendQueue::new(4);
        q.put(b"abcdefgh");
        assert_eq!(q.len(), 8);
        assert_eq!(q.peek(), Some(&b"abcd"[..]));
        q.done(4);
        assert_eq!(q.peek(), Some(&b"efgh"[..]));
    }

    #[test]
    fn done_spans_multiple_chunks() {
        let mut q = SendQueue::new(4);
        q.put(b"abcdefgh12");
        q.done(6);
        assert_eq!(q.len(), 4);
        assert_eq!(q.peek(), Some(&b"gh12"[..]));
    }

    #[test]
    fn empty_queue_peeks_none() {
        let q = SendQueue::new(4);
        assert!(q.is_empty());
        assert_eq!(q.peek(), None);
    }

    #[test]
    fn done_draining_exactly_to_empty() {
        let mut q = SendQueue::new(4);
        q.put(b"abcd");
        q.done(4);
        assert!(q.is_empty());
        assert_eq!(q.peek(), None);
    }
}
