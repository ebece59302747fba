//! Gate that silences a bit source until explicitly switched on.
//!
//! The server side of the covert channel must not emit useful bits on the
//! return path until the client's authentication preamble has matched —
//! otherwise a passive observer could distinguish a listening relay from a
//! plain proxy before the handshake completes. The gate gets flipped on from
//! the authentication callback once that happens.

use rand::RngCore;

use crate::binary::BitSource;

/// Wraps a bit source so it reads as all-zero (or random) bits until
/// [`set_enabled`](Self::set_enabled) is called with `true`.
pub struct BinaryOnOffReader<R> {
    inner: R,
    enabled: bool,
    random: bool,
}

impl<R: BitSource> BinaryOnOffReader<R> {
    /// Wraps `inner`, disabled by default. When `random` is set, disabled
    /// reads return random bits instead of zero — useful so a disabled
    /// channel's traffic doesn't look conspicuously uniform.
    pub fn new(inner: R, random: bool) -> Self {
        Self {
            inner,
            enabled: false,
            random,
        }
    }

    /// Switches the gate on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Reports whether the gate currently forwards to the inner source.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<R: BitSource> BitSource for BinaryOnOffReader<R> {
    fn read(&mut self, n: u32) -> u64 {
        if self.enabled {
            return self.inner.read(n);
        }
        if !self.random {
            return 0;
        }
        let mask = if n >= 64 { u64::MAX } else { (1u64 << n) - 1 };
        rand::thread_rng().next_u64() & mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryReader;
    use crate::io::{ByteSink, ByteSource, Fifo};
    use crate::packet::PacketReader;

    #[test]
    fn disabled_reads_zero_by_default() {
        let mut fifo = Fifo::new();
        fifo.write(b"X");
        let reader = BinaryReader::new(PacketReader::new(fifo));
        let mut gate = BinaryOnOffReader::new(reader, false);
        assert_eq!(gate.read(9), 0);
        assert_eq!(gate.read(9), 0);
    }

    #[test]
    fn enabling_forwards_to_inner_source() {
        let mut fifo = Fifo::new();
        fifo.write(b"X");
        let reader = BinaryReader::new(PacketReader::new(fifo));
        let mut gate = BinaryOnOffReader::new(reader, false);
        assert!(!gate.is_enabled());
        gate.set_enabled(true);
        assert_eq!(gate.read(9), 0x058);
    }

    #[test]
    fn disabled_with_random_never_forwards_inner_bytes() {
        let mut fifo = Fifo::new();
        fifo.write(b"\0");
        let reader = BinaryReader::new(PacketReader::new(fifo));
        let mut gate = BinaryOnOffReader::new(reader, true);
        // can't assert a specific value, but it must not have touched `reader`
        let _ = gate.read(9);
        gate.set_enabled(true);
        assert_eq!(gate.read(9), 0x000);
    }
}
