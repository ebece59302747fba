//! Bit-at-a-time reassembly/disassembly over the 9-bit packet layer.
//!
//! A single [`BinaryReader::read`]/[`BinaryWriter::write`] call carries at
//! most 64 bits (`n` and `m` are bounded by the `u64` result/argument type).
//! Every real caller in this workspace stays far under that limit — a byte
//! at a time through the packet layer, or a permutation-coder efficiency
//! count for a realistic number of headers/attributes — so this is a typed
//! version of a constraint the original bignum-based implementation left
//! implicit.

use std::cell::RefCell;
use std::rc::Rc;

use crate::packet::{PacketSink, PacketSource, PACKET_MASK, PACKET_SIZE};

/// A source of individual bits, MSB-first within each `read` call.
pub trait BitSource {
    /// Reads `n` bits (`n <= 64`), returned as the low `n` bits of a `u64`.
    fn read(&mut self, n: u32) -> u64;
}

/// A sink for individual bits.
pub trait BitSink {
    /// Writes the low `m` bits of `n` (`m <= 64`).
    fn write(&mut self, n: u64, m: u32);
}

/// Lets a single bit reader/writer be wrapped by more than one filter stage at
/// once — e.g. a serial group's tag-permutation stage and header-permutation
/// stage both writing covert bits through the same authenticated sink, the
/// way the legacy reference shares one Python object reference between them.
impl<T: BitSource> BitSource for Rc<RefCell<T>> {
    fn read(&mut self, n: u32) -> u64 {
        self.borrow_mut().read(n)
    }
}

impl<T: BitSink> BitSink for Rc<RefCell<T>> {
    fn write(&mut self, n: u64, m: u32) {
        self.borrow_mut().write(n, m);
    }
}

/// Reassembles bits out of a stream of 9-bit packets.
pub struct BinaryReader<P> {
    packets: P,
    last: u32,
    remain: u32,
}

impl<P: PacketSource> BinaryReader<P> {
    /// Wraps `packets`, with no residual bits buffered yet.
    pub fn new(packets: P) -> Self {
        Self {
            packets,
            last: 0,
            remain: 0,
        }
    }

    /// Discards any buffered residual bits, starting fresh on the next read.
    pub fn reset(&mut self) {
        self.last = 0;
        self.remain = 0;
    }
}

impl<P: PacketSource> BitSource for BinaryReader<P> {
    fn read(&mut self, mut n: u32) -> u64 {
        let mut result: u64 = 0;
        if self.remain > 0 {
            if self.remain >= n {
                result = u64::from(self.last >> (self.remain - n));
                self.last &= (1 << (self.remain - n)) - 1;
                self.remain -= n;
                return result;
            }
            result = u64::from(self.last);
            n -= self.remain;
            self.remain = 0;
        }
        let nb = n / PACKET_SIZE;
        let r = n % PACKET_SIZE;
        if nb > 0 {
            for p in self.packets.read(nb as usize) {
                result = (result << PACKET_SIZE) | u64::from(p);
            }
        }
        if r > 0 {
            self.last = u32::from(self.packets.read(1)[0]);
            result = (result << r) | u64::from(self.last >> (PACKET_SIZE - r));
            self.last &= (1 << (PACKET_SIZE - r)) - 1;
            self.remain = PACKET_SIZE - r;
        }
        result
    }
}

/// Breaks bits into 9-bit packets, pushed to an inner [`PacketSink`].
pub struct BinaryWriter<P> {
    packets: P,
    current: u32,
    remain: u32,
}

impl<P: PacketSink> BinaryWriter<P> {
    /// Wraps `packets`, with nothing buffered yet.
    pub fn new(packets: P) -> Self {
        Self {
            packets,
            current: 0,
            remain: 0,
        }
    }

    /// Discards any buffered residual bits.
    pub fn reset(&mut self) {
        self.current = 0;
        self.remain = 0;
    }

    /// Unwraps the writer, returning the inner packet sink.
    pub fn into_inner(self) -> P {
        self.packets
    }
}

impl<P: PacketSink> BitSink for BinaryWriter<P> {
    fn write(&mut self, n: u64, m: u32) {
        let r = PACKET_SIZE - self.remain;
        if r > m {
            let bits = if m == 0 { 0 } else { n & ((1u64 << m) - 1) };
            self.current = (self.current << m) | bits as u32;
            self.remain += m;
            return;
        }
        let mut m = m - r;
        self.current = (self.current << r) | (((n >> m) & ((1 << r) - 1)) as u32);
        let mut out = vec![self.current as u16];
        self.remain = 0;
        while m >= PACKET_SIZE {
            m -= PACKET_SIZE;
            out.push(((n >> m) & u64::from(PACKET_MASK)) as u16);
        }
        self.packets.write(&out);
        self.remain = m;
        self.current = if m == 0 { 0 } else { (n & ((1u64 << m) - 1)) as u32 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteSink, ByteSource, Fifo};
    use crate::packet::{PacketReader, PacketWriter};

    #[test]
    fn roundtrip_bits_across_packet_boundaries() {
        let mut src = Fifo::new();
        src.write(b"AB"); // 0x41 0x42 -> 18 bits of payload once packed
        let mut reader = BinaryReader::new(PacketReader::new(src));
        let a = reader.read(9);
        let b = reader.read(9);
        assert_eq!(a, 0x041);
        assert_eq!(b, 0x042);
    }

    #[test]
    fn writer_flushes_full_packets_and_buffers_remainder() {
        let sink = Fifo::new();
        let mut writer = BinaryWriter::new(PacketWriter::new(sink));
        writer.write(0b1010_1010_1, 9);
        writer.write(0b1, 1);
        // second write completes nothing on its own (only 1 of 9 bits), but
        // together with the residual from the first call it forms no new
        // full packet yet; just exercise the no-panic path.
    }

    #[test]
    fn read_write_are_inverses_for_arbitrary_bit_widths() {
        let sink = Fifo::new();
        let mut writer = BinaryWriter::new(PacketWriter::new(sink));
        writer.write(0x1F, 5);
        writer.write(0xAA, 8);
        writer.write(0x3, 2);
        // flush the residual packet by padding to a full 9-bit boundary
        let written_bits = 5 + 8 + 2;
        let pad = (PACKET_SIZE - (written_bits % PACKET_SIZE)) % PACKET_SIZE;
        if pad > 0 {
            writer.write(0, pad);
        }

        let mut sink_fifo = writer.packets.into_inner();
        let total_bytes = (written_bits + pad) / 8 + 1;
        let bytes = sink_fifo.read(total_bytes as usize);
        let mut fifo = Fifo::new();
        fifo.write(&bytes);
        let mut reader = BinaryReader::new(PacketReader::new(fifo));
        assert_eq!(reader.read(5), 0x1F);
        assert_eq!(reader.read(8), 0xAA);
        assert_eq!(reader.read(2), 0x3);
    }
}
