//! Rewrites the `Host` header of an HTTP request to a fixed value.
//!
//! Lets a relay's client side present the tunnel's real destination to the
//! far end, instead of whatever host the original client addressed the
//! tunnel with.

use crate::framework::{guard_read, guard_write, Filter, FilterError, FilterState};

/// Rewrites the first `Host:` header line it sees to `Host: <host>\r\n`,
/// passing every other byte through unchanged.
pub struct HttpHeaderHostChanger {
    pattern: stepregex::Regex,
    host: String,
    found: bool,
    buffer: Vec<u8>,
    state: FilterState,
}

impl HttpHeaderHostChanger {
    /// Builds a filter that rewrites `Host` headers to `host`.
    pub fn new(host: impl Into<String>) -> Result<Self, FilterError> {
        Ok(Self {
            pattern: stepregex::compile("Host: [^\r\n]+\r\n")?,
            host: host.into(),
            found: false,
            buffer: Vec::new(),
            state: FilterState::Empty,
        })
    }
}

impl Filter for HttpHeaderHostChanger {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);
        self.state = match self.pattern.step(c) {
            stepregex::Step::Pass => FilterState::Waiting,
            stepregex::Step::Accept => {
                self.found = true;
                FilterState::Pass
            }
            stepregex::Step::Fail => FilterState::Pass,
        };
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        guard_read(self.state)?;
        self.state = FilterState::Flushed;
        if self.found {
            Ok(format!("Host: {}\r\n", self.host).into_bytes())
        } else {
            Ok(std::mem::take(&mut self.buffer))
        }
    }

    fn reset(&mut self) {
        self.state = FilterState::Empty;
        self.buffer.clear();
        self.pattern.reset();
        self.found = false;
    }

    fn state(&self) -> FilterState {
        self.state
    }
}
