//! 9-bit packet layer: wraps an 8-bit byte stream so that a dedicated
//! "empty" symbol (`PACKET_EMPTY`) can be threaded through the same channel
//! as real bytes, letting the bit layer above keep producing output even
//! when the underlying byte source has momentarily run dry.

use crate::io::{ByteSink, ByteSource};

/// Sentinel packet value meaning "no byte available".
pub const PACKET_EMPTY: u16 = 0x100;
const PACKET_CHAR_MASK: u16 = 0x0ff;
/// Width in bits of one packet.
pub const PACKET_SIZE: u32 = 9;
/// Mask selecting the bits of a valid packet (byte value or empty flag).
pub const PACKET_MASK: u16 = 0x1ff;

/// Source of 9-bit packets.
pub trait PacketSource {
    /// Reads `n` packets, padding with [`PACKET_EMPTY`] if the underlying
    /// byte source cannot supply enough bytes.
    fn read(&mut self, n: usize) -> Vec<u16>;
}

/// Sink for 9-bit packets.
pub trait PacketSink {
    /// Writes `packets`, silently dropping any [`PACKET_EMPTY`] entries.
    fn write(&mut self, packets: &[u16]);
}

/// Encodes bytes from an inner [`ByteSource`] as packets.
pub struct PacketReader<R> {
    reader: R,
}

impl<R: ByteSource> PacketReader<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: ByteSource> PacketSource for PacketReader<R> {
    fn read(&mut self, n: usize) -> Vec<u16> {
        let bytes = self.reader.read(n);
        let mut result: Vec<u16> = bytes.into_iter().map(u16::from).collect();
        result.resize(n, PACKET_EMPTY);
        result
    }
}

/// Decodes packets, forwarding real bytes to an inner [`ByteSink`].
pub struct PacketWriter<W> {
    writer: W,
}

impl<W: ByteSink> PacketWriter<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwraps the writer, returning the inner sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: ByteSink> PacketSink for PacketWriter<W> {
    fn write(&mut self, packets: &[u16]) {
        let bytes: Vec<u8> = packets
            .iter()
            .filter(|&&p| p & PACKET_EMPTY == 0)
            .map(|&p| (p & PACKET_CHAR_MASK) as u8)
            .collect();
        self.writer.write(&bytes);
    }
}
