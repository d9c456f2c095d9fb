//! Fixed-capacity byte queue backing each virtual socket.

use bytes::{Bytes, BytesMut};

/// Default buffer capacity (64 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Smallest registry buffer that can satisfy every RECV length the wire can
/// carry.
pub const MIN_BUFFER_CAPACITY: usize = vtcp_protocol::MAX_PAYLOAD_SIZE;

/// FIFO byte queue with lossy writes and all-or-nothing reads.
///
/// Writes beyond the remaining capacity are dropped. Reads either take
/// exactly the requested number of bytes from the front or take nothing.
#[derive(Debug)]
pub struct SocketBuffer {
    data: BytesMut,
    capacity: usize,
}

impl SocketBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends as much of `bytes` as fits and returns how many were kept.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.remaining());
        self.data.extend_from_slice(&bytes[..accepted]);
        accepted
    }

    /// Removes and returns the first `len` bytes, or `None` if fewer are
    /// buffered. Requests above the capacity are clamped to it.
    pub fn read(&mut self, len: usize) -> Option<Bytes> {
        let len = len.min(self.capacity);
        if self.data.len() < len {
            return None;
        }
        Some(self.data.split_to(len).freeze())
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }
}

impl Default for SocketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_write_then_read() {
        let mut buf = SocketBuffer::new();
        assert_eq!(buf.write(b"hello, "), 7);
        assert_eq!(buf.write(b"world"), 5);
        assert_eq!(buf.len(), 12);

        assert_eq!(buf.read(7).unwrap().as_ref(), b"hello, ");
        assert_eq!(buf.read(5).unwrap().as_ref(), b"world");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_read_has_no_side_effects() {
        let mut buf = SocketBuffer::new();
        buf.write(b"abc");

        assert!(buf.read(4).is_none());
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read(3).unwrap().as_ref(), b"abc");
    }

    #[test]
    fn test_remainder_moves_to_front() {
        let mut buf = SocketBuffer::new();
        buf.write(b"0123456789");
        assert_eq!(buf.read(4).unwrap().as_ref(), b"0123");
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.remaining(), DEFAULT_BUFFER_CAPACITY - 6);
        assert_eq!(buf.read(6).unwrap().as_ref(), b"456789");
    }

    #[test]
    fn test_overflow_is_truncated() {
        let mut buf = SocketBuffer::with_capacity(8);
        assert_eq!(buf.write(b"abcdef"), 6);
        assert_eq!(buf.write(b"ghijk"), 2);
        assert_eq!(buf.write(b"lmn"), 0);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.remaining(), 0);

        assert_eq!(buf.read(8).unwrap().as_ref(), b"abcdefgh");
        // The dropped tail never shows up.
        assert!(buf.read(1).is_none());
    }

    #[test]
    fn test_read_clamped_to_capacity() {
        let mut buf = SocketBuffer::with_capacity(4);
        buf.write(b"wxyz");
        assert_eq!(buf.read(100).unwrap().as_ref(), b"wxyz");
    }

    #[test]
    fn test_clear() {
        let mut buf = SocketBuffer::new();
        buf.write(b"data");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.remaining(), buf.capacity());
    }

    proptest! {
        #[test]
        fn prop_fifo_order_within_capacity(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..512), 0..16)
        ) {
            let mut buf = SocketBuffer::new();
            let mut expected = Vec::new();
            for chunk in &chunks {
                prop_assert_eq!(buf.write(chunk), chunk.len());
                expected.extend_from_slice(chunk);
            }
            let out = buf.read(expected.len()).unwrap();
            prop_assert_eq!(out.as_ref(), expected.as_slice());
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn prop_length_stays_within_capacity(
            capacity in 1usize..256,
            writes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..128), 0..16)
        ) {
            let mut buf = SocketBuffer::with_capacity(capacity);
            let mut kept = Vec::new();
            for w in &writes {
                let n = buf.write(w);
                kept.extend_from_slice(&w[..n]);
                prop_assert!(buf.len() <= capacity);
            }
            prop_assert_eq!(kept.len(), buf.len());
            // Only the leading bytes up to capacity survive.
            let all: Vec<u8> = writes.concat();
            let prefix = &all[..all.len().min(capacity)];
            prop_assert_eq!(kept.as_slice(), prefix);
        }
    }
}
