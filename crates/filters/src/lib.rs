#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `filters` sits on top of `bitstream` and `permute` to turn the order of
//! HTTP header lines and HTML tag attributes into a covert channel.
//!
//! Every filter in this crate implements the same four-state [`Filter`]
//! lifecycle from [`framework`]: a filter accumulates bytes through `write`
//! until it recognizes a complete unit (a header block, a tag, a body), at
//! which point it becomes [`FilterState::Pass`] and must be `read` before
//! more bytes can be written. [`SerialFilterGroup`] chains filters so one
//! stage's output feeds the next, which is how a body extractor and a tag
//! permutation coder compose into a single pipeline stage.
//!
//! - [`header`] permutes the order of HTTP header lines.
//! - [`html`] permutes the order of an HTML/XML tag's attributes.
//! - [`body`] extracts an HTTP message's body from its framing so an inner
//!   filter (typically [`html`]) can see the HTML it carries, then
//!   re-encapsulates whatever that filter produces.
//! - [`host`] rewrites a request's `Host` header, independent of the covert
//!   channel, so a relay's client side can present the real destination.

pub mod body;
pub mod framework;
pub mod header;
pub mod html;
pub mod host;

pub use body::{HttpDataExtractorFilter, DEFAULT_CHUNK_SIZE};
pub use framework::{
    guard_read, guard_write, Filter, FilterCore, FilterError, FilterState, NullFilter,
    SerialFilterGroup, MAX_BUFFER,
};
pub use header::{HttpHeaderPermutFilterIn, HttpHeaderPermutFilterOut};
pub use html::{HtmlTagsPermutFilterIn, HtmlTagsPermutFilterOut};
pub use host::HttpHeaderHostChanger;
