#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `engine` is the relay's runtime: it resolves a [`RelayConfig`] into a
//! listening socket, an attached plaintext peer, and a per-mode codec
//! pipeline built from `filters`/`bitstream`, then drives accepted
//! connections through [`net`] until told to stop.
//!
//! # Design
//!
//! [`run`] is the crate's one public entry point; everything else here is
//! plumbing it assembles:
//!
//! - [`config`] is the plain, parser-independent configuration `cli` builds.
//! - [`process`] attaches the plaintext peer (stdin/stdout, or a `-c
//!   <command>` child).
//! - [`fifo`] and [`pipe`] are the byte-stream adapters bridging that peer
//!   to the `bitstream` crate's bit-level abstractions.
//! - [`net`] owns the accept/connect/forward loop and the client/server
//!   pipeline wiring.
//! - [`error`] collects the fatal errors a relay run can report.

pub mod config;
pub mod error;
pub mod fifo;
pub mod net;
pub mod pipe;
pub mod process;

pub use config::{Mode, RelayConfig};
pub use error::RelayError;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Runs `config` to completion (or until `stop` is set), dispatching to the
/// client or server accept loop per [`RelayConfig::mode`].
pub fn run(config: &RelayConfig, stop: Arc<AtomicBool>) -> Result<(), RelayError> {
    net::run(config, stop)
}
