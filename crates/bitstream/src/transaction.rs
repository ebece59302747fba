//! Transactional wrappers around the bit layer: bits read (or written) can be
//! replayed (or dropped) if the TCP segment that was meant to carry them
//! never made it to the peer.
//!
//! The covert encoder may compute a permutation, ask the attached bit reader
//! for the `e` bits it needs, and then fail to deliver the resulting buffer
//! (the peer socket closed mid-send). Without a transaction layer those bits
//! would simply be gone — lost from the covert stream with no way for the
//! two ends to ever resynchronise. `commit` retires the bits once delivery is
//! confirmed; `rollback` makes them visible again, in the same order, on the
//! next `read`/`write`.

use crate::binary::{BitSink, BitSource};

/// Replays bits already issued to a caller until they are [`commit`](Self::commit)ted.
pub struct BinaryTransactionReader<R> {
    inner: R,
    history: Vec<bool>,
    pos: usize,
}

impl<R: BitSource> BinaryTransactionReader<R> {
    /// Wraps `inner`, with no bits yet issued since the last commit.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            history: Vec::new(),
            pos: 0,
        }
    }

    /// Discards the replay history; bits already read are permanently retired.
    pub fn commit(&mut self) {
        self.history.clear();
        self.pos = 0;
    }

    /// Rewinds the replay cursor to the start of the history accumulated
    /// since the last commit, so the next `read` calls reissue the exact same
    /// bits in the exact same order.
    pub fn rollback(&mut self) {
        self.pos = 0;
    }

    /// Unwraps the reader, returning the inner bit source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BitSource> BitSource for BinaryTransactionReader<R> {
    fn read(&mut self, n: u32) -> u64 {
        let n = n as usize;
        if self.pos + n > self.history.len() {
            let need = self.pos + n - self.history.len();
            let fresh = self.inner.read(need as u32);
            for i in (0..need).rev() {
                self.history.push((fresh >> i) & 1 == 1);
            }
        }
        let mut result: u64 = 0;
        for &bit in &self.history[self.pos..self.pos + n] {
            result = (result << 1) | u64::from(bit);
        }
        self.pos += n;
        result
    }
}

/// Accumulates `(value, width)` writes locally until [`commit`](Self::commit)
/// flushes them, in order, to the wrapped sink.
pub struct BinaryTransactionWriter<W> {
    inner: W,
    pending: Vec<(u64, u32)>,
}

impl<W: BitSink> BinaryTransactionWriter<W> {
    /// Wraps `inner`, with nothing pending.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }

    /// Flushes every pending write to the wrapped sink, in the order they
    /// were issued, then clears the pending list.
    pub fn commit(&mut self) {
        for (n, m) in self.pending.drain(..) {
            self.inner.write(n, m);
        }
    }

    /// Discards every pending write without forwarding it.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Unwraps the writer, returning the inner bit sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: BitSink> BitSink for BinaryTransactionWriter<W> {
    fn write(&mut self, n: u64, m: u32) {
        let masked = if m == 0 {
            0
        } else if m >= 64 {
            n
        } else {
            n & ((1u64 << m) - 1)
        };
        self.pending.push((masked, m));
    }
}
