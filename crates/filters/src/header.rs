//! Permutation coding over the order of an HTTP request/response's header
//! lines.

use bitstream::{BitSink, BitSource};
use permute::{efficiency, rank, unrank};

use crate::framework::{Filter, FilterError, FilterState};

/// Matches either an HTTP request line or an HTTP status line, up to and
/// including its trailing `\r\n`. Shared by [`HttpHeaderPermutFilterIn`],
/// [`HttpHeaderPermutFilterOut`] and `filters::body`.
pub(crate) const REGEXP_HTTP_REQRESP: &str = concat!(
    "(",
    "(GET|POST|PUT|DELETE|HEAD|TRACE|CONNECT|OPTIONS) ",
    "(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\\?([^#]*))?(#(.*))?",
    " HTTP/[0-9]\\.[0-9]\r\n",
    "|",
    "HTTP/[0-9]\\.[0-9] [1-5][0-1][0-9] [^\r\n]*\r\n",
    ")"
);

/// Deduplicates a sorted list, keeping the first of each run of equal
/// elements — mirrors the legacy reference's predecessor-tracking dedup.
fn dedup_sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// Deduplicates `items` preserving the order of first occurrence, so the
/// decode side can rank the order headers actually appeared in on the wire
/// rather than their sorted order (see `spec.md` §9's Open Question on
/// header/attribute dedup, resolved in `DESIGN.md`).
fn dedup_stable(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

struct HeaderScan {
    pattern: stepregex::Regex,
    into_header: bool,
    /// Header lines as observed, in wire order, including duplicates.
    headers: Vec<String>,
    /// Deduplicated, sorted header set once the blank line is seen — the
    /// base list [`unrank`] permutes on encode.
    sorted_deduped: Vec<String>,
    current_header: String,
    request_line: String,
    efficiency: u32,
}

impl HeaderScan {
    fn new() -> Result<Self, FilterError> {
        Ok(Self {
            pattern: stepregex::compile(REGEXP_HTTP_REQRESP)?,
            into_header: false,
            headers: Vec::new(),
            sorted_deduped: Vec::new(),
            current_header: String::new(),
            request_line: String::new(),
            efficiency: 0,
        })
    }

    fn reset(&mut self) {
        self.pattern.reset();
        self.into_header = false;
        self.headers.clear();
        self.sorted_deduped.clear();
        self.current_header.clear();
        self.request_line.clear();
        self.efficiency = 0;
    }

    /// Feeds one byte of the overall buffer; `buffer` is the full buffer
    /// accumulated so far (including `c`), used to check for the `\r\n\r\n`
    /// and `\r\n` trailers the way the legacy reference does.
    fn write(&mut self, c: u8, buffer: &[u8]) -> FilterState {
        if self.into_header {
            self.current_header.push(c as char);
            if buffer.ends_with(b"\r\n\r\n") {
                self.sorted_deduped = dedup_sorted(self.headers.clone());
                self.efficiency = efficiency(self.sorted_deduped.len());
                return FilterState::Pass;
            } else if buffer.ends_with(b"\r\n") {
                self.headers.push(std::mem::take(&mut self.current_header));
            }
            FilterState::Waiting
        } else {
            match self.pattern.step(c) {
                stepregex::Step::Pass => FilterState::Waiting,
                stepregex::Step::Accept => {
                    self.into_header = true;
                    FilterState::Waiting
                }
                stepregex::Step::Fail => FilterState::Pass,
            }
        }
    }
}

/// Encodes covert bits in the order of an HTTP message's header lines,
/// pulling `efficiency` bits per message from an attached bit source.
pub struct HttpHeaderPermutFilterIn<R> {
    reader: R,
    scan: HeaderScan,
    buffer: Vec<u8>,
    state: FilterState,
}

impl<R: BitSource> HttpHeaderPermutFilterIn<R> {
    /// Builds a new encoder reading covert bits from `reader`.
    pub fn new(reader: R) -> Result<Self, FilterError> {
        Ok(Self {
            reader,
            scan: HeaderScan::new()?,
            buffer: Vec::new(),
            state: FilterState::Empty,
        })
    }
}

impl<R: BitSource> Filter for HttpHeaderPermutFilterIn<R> {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        crate::framework::guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);
        if !self.scan.into_header {
            self.scan.request_line.push(c as char);
        }
        self.state = self.scan.write(c, &self.buffer);
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        crate::framework::guard_read(self.state)?;
        self.state = FilterState::Flushed;
        if self.scan.efficiency == 0 {
            return Ok(std::mem::take(&mut self.buffer));
        }
        let n = self.reader.read(self.scan.efficiency);
        let permuted = unrank(n, &self.scan.sorted_deduped);
        let mut out = self.scan.request_line.clone().into_bytes();
        for h in permuted {
            out.extend(h.into_bytes());
        }
        out.extend_from_slice(b"\r\n");
        Ok(out)
    }

    fn reset(&mut self) {
        self.state = FilterState::Empty;
        self.buffer.clear();
        self.scan.reset();
    }

    fn state(&self) -> FilterState {
        self.state
    }
}

/// Decodes covert bits from the order of an HTTP message's header lines,
/// forwarding them to an attached bit sink. The message itself passes
/// through unchanged.
pub struct HttpHeaderPermutFilterOut<W> {
    writer: W,
    scan: HeaderScan,
    buffer: Vec<u8>,
    state: FilterState,
}

impl<W: BitSink> HttpHeaderPermutFilterOut<W> {
    /// Builds a new decoder writing recovered covert bits to `writer`.
    pub fn new(writer: W) -> Result<Self, FilterError> {
        Ok(Self {
            writer,
            scan: HeaderScan::new()?,
            buffer: Vec::new(),
            state: FilterState::Empty,
        })
    }
}

impl<W: BitSink> Filter for HttpHeaderPermutFilterOut<W> {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        crate::framework::guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);
        if !self.scan.into_header {
            self.scan.request_line.push(c as char);
        }
        self.state = self.scan.write(c, &self.buffer);
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        crate::framework::guard_read(self.state)?;
        self.state = FilterState::Flushed;
        if self.scan.efficiency != 0 {
            // Dedup in wire-observed order, matching the base list the
            // encoder ranked over — `scan.sorted_deduped` is only the sorted
            // view used to agree on `efficiency`, not the rank input.
            let n = rank(dedup_stable(self.scan.headers.clone()));
            self.writer.write(n, self.scan.efficiency);
        }
        Ok(std::mem::take(&mut self.buffer))
    }

    fn reset(&mut self) {
        self.state = FilterState::Empty;
        self.buffer.clear();
        self.scan.reset();
    }

    fn state(&self) -> FilterState {
        self.state
    }
}
