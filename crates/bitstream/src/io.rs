//! Minimal byte-stream abstractions the packet layer is built on.

/// A source of bytes that may run dry: `read` returns fewer bytes than
/// requested (possibly zero) rather than blocking.
pub trait ByteSource {
    /// Reads up to `n` bytes, returning as many as are currently available.
    fn read(&mut self, n: usize) -> Vec<u8>;
}

/// A sink that bytes are pushed into.
pub trait ByteSink {
    /// Writes `bytes` to the underlying stream.
    fn write(&mut self, bytes: &[u8]);
}

/// An in-memory FIFO byte buffer implementing both [`ByteSource`] and
/// [`ByteSink`]; the capacity grows as needed.
///
/// This is the plain, single-threaded building block. The cross-thread
/// variant shared between a relay's pump threads wraps this type in a
/// `Mutex` (see the `engine` crate's `SyncFifo`).
#[derive(Debug, Default, Clone)]
pub struct Fifo {
    buf: std::collections::VecDeque<u8>,
}

impl Fifo {
    /// Creates an empty FIFO.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Reports whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl ByteSource for Fifo {
    fn read(&mut self, n: usize) -> Vec<u8> {
        let take = n.min(self.buf.len());
        self.buf.drain(..take).collect()
    }
}

impl ByteSink for Fifo {
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }
}
