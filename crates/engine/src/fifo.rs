//! The one structure touched by both the thread feeding plaintext bytes (from
//! stdin or a child process's stdout) and the connection worker's read-side
//! pump: a mutex-guarded byte queue standing in for the legacy reference's
//! `SynchronizedFIFOBuffer`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bitstream::{ByteSink, ByteSource};

/// Thread-safe FIFO byte queue, shared via [`Arc`] between the stdin-feeding
/// loop and the bit-stream pipeline that drains it.
#[derive(Default)]
pub struct SyncFifo {
    buf: Mutex<VecDeque<u8>>,
}

impl SyncFifo {
    /// Creates an empty, shareable FIFO.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a single byte, waking nothing — the reader side polls.
    pub fn push(&self, byte: u8) {
        self.buf.lock().unwrap().push_back(byte);
    }

    fn drain(&self, n: usize) -> Vec<u8> {
        let mut guard = self.buf.lock().unwrap();
        let take = n.min(guard.len());
        guard.drain(..take).collect()
    }
}

impl ByteSource for Arc<SyncFifo> {
    fn read(&mut self, n: usize) -> Vec<u8> {
        self.drain(n)
    }
}

impl ByteSink for Arc<SyncFifo> {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_no_more_than_available() {
        let fifo = SyncFifo::shared();
        fifo.push(b'a');
        fifo.push(b'b');
        let mut reader = fifo.clone();
        assert_eq!(ByteSource::read(&mut reader, 5), vec![b'a', b'b']);
        assert_eq!(ByteSource::read(&mut reader, 5), Vec::<u8>::new());
    }

    #[test]
    fn two_handles_share_the_same_underlying_queue() {
        let fifo = SyncFifo::shared();
        let writer = fifo.clone();
        let mut reader = fifo.clone();
        writer.push(b'x');
        assert_eq!(ByteSource::read(&mut reader, 1), vec![b'x']);
    }
}
