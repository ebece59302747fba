//! Adapts the plaintext side's output handle (a child process's stdin, or our
//! own stdout) to the [`ByteSink`] the packet layer writes through.

use std::io::Write;

use bitstream::ByteSink;

/// Wraps a boxed [`Write`] handle as a [`ByteSink`], silently dropping the
/// byte-level result of a broken pipe — a dead write handle is reported by
/// the connection's own read/write loop, not from inside the codec stack.
pub struct WriterSink {
    inner: Box<dyn Write + Send>,
}

impl WriterSink {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self { inner }
    }
}

impl ByteSink for WriterSink {
    fn write(&mut self, bytes: &[u8]) {
        let _ = self.inner.write_all(bytes);
        let _ = self.inner.flush();
    }
}
