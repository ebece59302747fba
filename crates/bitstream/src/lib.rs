#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `bitstream` is the covert channel's physical layer: it turns a byte
//! stream into a sequence of bits a caller can request in arbitrary-width
//! chunks, and back again. Four layers stack on top of each other, each
//! narrowing what the layer above has to think about:
//!
//! 1. [`packet`] wraps a plain byte stream in 9-bit "packets" so an "empty"
//!    marker can ride alongside real bytes without blocking the pipeline.
//! 2. [`binary`] reassembles/disassembles those packets into bit fields of
//!    arbitrary width, tracking a fractional leftover packet across calls.
//! 3. [`transaction`] wraps a bit reader/writer with commit/rollback so that
//!    bits consumed (or produced) by a covert encoder are only retired once
//!    the TCP segment carrying them has actually been sent.
//! 4. [`auth`] and [`onoff`] ride on top of the bit layer: a password
//!    preamble, and a gate that silences a stream's useful bits until the
//!    preamble has matched.
//!
//! # Design
//!
//! Every layer is built against the narrow [`BitSource`](binary::BitSource) /
//! [`BitSink`](binary::BitSink) traits so the stack composes by wrapping, not
//! by inheritance — a `BinaryAuthenticateReader` wraps a
//! `BinaryTransactionReader` wraps a `BinaryReader` wraps a `PacketReader`,
//! and each only knows about the trait one layer down.

pub mod auth;
pub mod binary;
pub mod io;
pub mod onoff;
pub mod packet;
pub mod transaction;

pub use auth::{AuthEvent, AuthState, BinaryAuthenticateReader, BinaryAuthenticateWriter};
pub use binary::{BinaryReader, BinaryWriter, BitSink, BitSource};
pub use io::{ByteSink, ByteSource, Fifo};
pub use onoff::BinaryOnOffReader;
pub use packet::{PacketReader, PacketSink, PacketSource, PacketWriter, PACKET_EMPTY, PACKET_SIZE};
pub use transaction::{BinaryTransactionReader, BinaryTransactionWriter};
