//! Extracts an HTTP message's body from its framing (`Content-Length` or
//! chunked `Transfer-Encoding`), drives it through an inner filter, and
//! re-encapsulates whatever that filter produces.

use permute::int_to_hex;

use crate::framework::{guard_read, guard_write, Filter, FilterError, FilterState};
use crate::header::REGEXP_HTTP_REQRESP;

/// Default chunk size used when re-chunking a filtered, chunk-encoded body.
pub const DEFAULT_CHUNK_SIZE: usize = 65535;

#[derive(Clone, Copy, Eq, PartialEq)]
enum Framing {
    Unknown,
    Chunked,
    Length,
}

/// Pulls an HTTP message's body out of its Content-Length or chunked framing,
/// drives the body through `filter`, and rebuilds the message around
/// whatever `filter` produces.
///
/// Bodies using neither framing cannot be re-encapsulated (their length has
/// no other expression on the wire), so the message passes through
/// unfiltered. An inner filter that never reaches [`FilterState::Pass`] for
/// the whole body is reported as [`FilterError::Stuck`] rather than silently
/// dropping data.
pub struct HttpDataExtractorFilter<F> {
    filter: F,
    pattern: stepregex::Regex,
    request_line: String,
    into_header: bool,
    headers: Vec<String>,
    current_header: String,
    into_data: bool,
    framing: Framing,
    length: usize,
    data: Vec<u8>,
    buffer: Vec<u8>,
    state: FilterState,
    finished: bool,
    new_chunk_size: usize,
    // chunked-body scanning
    chunk_length: usize,
    chunk_size_line: Vec<u8>,
    end_of_chunk: u8,
}

impl<F: Filter> HttpDataExtractorFilter<F> {
    /// Builds a new extractor driving `filter` over the recovered body,
    /// re-chunking at `new_chunk_size` bytes per chunk when re-encoding a
    /// chunked body.
    pub fn new(filter: F, new_chunk_size: usize) -> Result<Self, FilterError> {
        Ok(Self {
            filter,
            pattern: stepregex::compile(REGEXP_HTTP_REQRESP)?,
            request_line: String::new(),
            into_header: false,
            headers: Vec::new(),
            current_header: String::new(),
            into_data: false,
            framing: Framing::Unknown,
            length: 0,
            data: Vec::new(),
            buffer: Vec::new(),
            state: FilterState::Empty,
            finished: false,
            new_chunk_size,
            chunk_length: 0,
            chunk_size_line: Vec::new(),
            end_of_chunk: 0,
        })
    }

    fn write_header_byte(&mut self, c: u8) -> FilterState {
        self.current_header.push(c as char);
        if self.buffer.ends_with(b"\r\n\r\n") {
            if self.framing != Framing::Unknown {
                self.into_data = true;
                FilterState::Waiting
            } else {
                FilterState::Pass
            }
        } else if self.buffer.ends_with(b"\r\n") {
            if self.current_header == "Transfer-Encoding: chunked\r\n" {
                self.framing = Framing::Chunked;
            }
            if let Some(rest) = self.current_header.strip_prefix("Content-Length:") {
                match rest.trim_end_matches("\r\n").trim().parse::<usize>() {
                    Ok(len) => {
                        self.length = len;
                        if len > 0 && self.framing == Framing::Unknown {
                            self.framing = Framing::Length;
                        }
                    }
                    Err(_) => return FilterState::Pass,
                }
            }
            self.headers.push(std::mem::take(&mut self.current_header));
            FilterState::Waiting
        } else {
            FilterState::Waiting
        }
    }

    fn write_chunked_byte(&mut self, c: u8) -> FilterState {
        if self.end_of_chunk == 1 {
            if c != b'\r' {
                return FilterState::Pass;
            }
            self.end_of_chunk = 2;
            FilterState::Waiting
        } else if self.end_of_chunk == 2 {
            if c != b'\n' {
                return FilterState::Pass;
            }
            self.end_of_chunk = 0;
            FilterState::Waiting
        } else if self.chunk_length > 0 {
            self.chunk_length -= 1;
            self.data.push(c);
            if self.chunk_length == 0 {
                self.end_of_chunk = 1;
            }
            FilterState::Waiting
        } else {
            self.chunk_size_line.push(c);
            if self.chunk_size_line.ends_with(b"\r\n") {
                let digits = &self.chunk_size_line[..self.chunk_size_line.len() - 2];
                let text = match std::str::from_utf8(digits) {
                    Ok(t) => t,
                    Err(_) => return FilterState::Pass,
                };
                match usize::from_str_radix(text, 16) {
                    Ok(n) => {
                        self.chunk_size_line.clear();
                        if n == 0 {
                            self.finished = true;
                            return FilterState::Pass;
                        }
                        self.chunk_length = n;
                    }
                    Err(_) => return FilterState::Pass,
                }
            }
            FilterState::Waiting
        }
    }

    fn write_length_byte(&mut self, c: u8) -> FilterState {
        if self.length == 0 {
            return FilterState::Pass;
        }
        self.data.push(c);
        self.length -= 1;
        if self.length == 0 {
            self.finished = true;
            FilterState::Pass
        } else {
            FilterState::Waiting
        }
    }

    fn drain_filter(&mut self) -> Result<Option<Vec<u8>>, FilterError> {
        let mut out = Vec::new();
        let mut last_pass = false;
        for &byte in &self.data {
            if self.filter.write(byte)? == FilterState::Pass {
                out.extend(self.filter.read()?);
                self.filter.reset();
                last_pass = true;
            } else {
                last_pass = false;
            }
        }
        if last_pass || self.data.is_empty() {
            Ok(Some(out))
        } else {
            Ok(None)
        }
    }

    fn rebuild_headers(&self) -> Vec<u8> {
        let mut out = self.request_line.clone().into_bytes();
        for h in &self.headers {
            out.extend(h.as_bytes());
        }
        out
    }
}

impl<F: Filter> Filter for HttpDataExtractorFilter<F> {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);

        self.state = if self.into_data {
            match self.framing {
                Framing::Chunked => self.write_chunked_byte(c),
                Framing::Length => self.write_length_byte(c),
                Framing::Unknown => FilterState::Pass,
            }
        } else if self.into_header {
            self.write_header_byte(c)
        } else {
            self.request_line.push(c as char);
            match self.pattern.step(c) {
                stepregex::Step::Pass => FilterState::Waiting,
                stepregex::Step::Accept => {
                    self.into_header = true;
                    FilterState::Waiting
                }
                stepregex::Step::Fail => FilterState::Pass,
            }
        };
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        guard_read(self.state)?;
        self.state = FilterState::Flushed;

        if !self.finished {
            return Ok(std::mem::take(&mut self.buffer));
        }

        match self.framing {
            Framing::Chunked => {
                let Some(filtered) = self.drain_filter()? else {
                    return Err(FilterError::Stuck);
                };
                let mut out = self.rebuild_headers();
                out.extend_from_slice(b"\r\n");
                let mut offset = 0;
                let total = filtered.len();
                while offset < total {
                    let take = std::cmp::min(self.new_chunk_size, total - offset);
                    out.extend(int_to_hex(take as u64, false).into_bytes());
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(&filtered[offset..offset + take]);
                    out.extend_from_slice(b"\r\n");
                    offset += take;
                }
                out.extend_from_slice(b"0\r\n");
                out.extend_from_slice(b"\r\n");
                Ok(out)
            }
            Framing::Length => {
                let Some(filtered) = self.drain_filter()? else {
                    return Err(FilterError::Stuck);
                };
                let mut headers = self.headers.clone();
                for h in &mut headers {
                    if h.starts_with("Content-Length:") {
                        *h = format!("Content-Length: {}\r\n", filtered.len());
                    }
                }
                let mut out = self.request_line.clone().into_bytes();
                for h in &headers {
                    out.extend(h.as_bytes());
                }
                out.extend_from_slice(b"\r\n");
                out.extend(filtered);
                Ok(out)
            }
            Framing::Unknown => Ok(std::mem::take(&mut self.buffer)),
        }
    }

    fn reset(&mut self) {
        self.state = FilterState::Empty;
        self.buffer.clear();
        self.pattern.reset();
        self.request_line.clear();
        self.into_header = false;
        self.headers.clear();
        self.current_header.clear();
        self.into_data = false;
        self.framing = Framing::Unknown;
        self.length = 0;
        self.data.clear();
        self.finished = false;
        self.chunk_length = 0;
        self.chunk_size_line.clear();
        self.end_of_chunk = 0;
        self.filter.reset();
    }

    fn state(&self) -> FilterState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::NullFilter;

    fn feed<F: Filter>(f: &mut F, data: &[u8]) -> FilterState {
        let mut last = FilterState::Empty;
        for &b in data {
            last = f.write(b).unwrap();
            if last == FilterState::Pass {
                break;
            }
        }
        last
    }

    #[test]
    fn content_length_body_round_trips_through_null_filter() {
        let mut f = HttpDataExtractorFilter::new(NullFilter::new(), DEFAULT_CHUNK_SIZE).unwrap();
        let msg = b"GET / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let state = feed(&mut f, msg);
        assert_eq!(state, FilterState::Pass);
        let out = f.read().unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn chunked_body_is_rechunked_with_trailing_crlf() {
        let mut f = HttpDataExtractorFilter::new(NullFilter::new(), DEFAULT_CHUNK_SIZE).unwrap();
        let msg = b"GET / HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let state = feed(&mut f, msg);
        assert_eq!(state, FilterState::Pass);
        let out = f.read().unwrap();
        assert!(out.ends_with(b"0\r\n\r\n"));
        assert!(out.windows(5).any(|w| w == b"hello"));
    }

    #[test]
    fn unframed_body_passes_through_unfiltered() {
        let mut f = HttpDataExtractorFilter::new(NullFilter::new(), DEFAULT_CHUNK_SIZE).unwrap();
        let msg = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let state = feed(&mut f, msg);
        assert_eq!(state, FilterState::Pass);
        let out = f.read().unwrap();
        assert_eq!(out, msg);
    }
}
