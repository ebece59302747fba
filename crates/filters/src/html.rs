//! Permutation coding over the order of an HTML/XML start tag's attributes.

use bitstream::{BitSink, BitSource};
use permute::{efficiency, rank, unrank, xml_tag_extract};

use crate::framework::{guard_read, guard_write, Filter, FilterError, FilterState};

const TAG: &str = concat!(
    "<",
    "[A-Za-z0-9:_][A-Za-z0-9._:-]*",
    "(",
    "([\n\r\t ]+)",
    "[A-Za-z0-9:_][A-Za-z0-9._:-]*",
    "([\n\r\t ]+)?=([\n\r\t ]+)?",
    "(\"([^<&\"]|&(#[0-9]+|[A-Za-z0-9:_][A-Za-z0-9._:-]*);)*\"|'([^<&']|&(#[0-9]+|[A-Za-z0-9:_][A-Za-z0-9._:-]*);)*')",
    ")*",
    "([\n\r\t ]+)?",
    "/?>"
);

fn dedup_sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// Deduplicates `items` preserving the order of first occurrence, so the
/// decode side can rank the order attributes actually appeared in on the
/// wire rather than their sorted order.
fn dedup_stable(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

struct TagScan {
    pattern: stepregex::Regex,
    /// Attributes as observed, in tag order, including duplicates.
    attribs: Vec<String>,
    /// Deduplicated, sorted attribute set — the base list [`unrank`]
    /// permutes on encode.
    sorted_deduped: Vec<String>,
    start: String,
    end: String,
    efficiency: u32,
}

impl TagScan {
    fn new() -> Result<Self, FilterError> {
        Ok(Self {
            pattern: stepregex::compile(TAG)?,
            attribs: Vec::new(),
            sorted_deduped: Vec::new(),
            start: String::new(),
            end: String::new(),
            efficiency: 0,
        })
    }

    fn reset(&mut self) {
        self.pattern.reset();
        self.attribs.clear();
        self.sorted_deduped.clear();
        self.start.clear();
        self.end.clear();
        self.efficiency = 0;
    }

    /// `buffer` is the full tag buffer accumulated so far (including the byte
    /// just written).
    fn write(&mut self, c: u8, buffer: &[u8]) -> FilterState {
        match self.pattern.step(c) {
            stepregex::Step::Pass => FilterState::Waiting,
            stepregex::Step::Accept => {
                let text = String::from_utf8_lossy(buffer);
                let (attrs, start, end) = xml_tag_extract(&text);
                self.start = start;
                self.end = end;
                if !attrs.is_empty() {
                    self.sorted_deduped = dedup_sorted(attrs.clone());
                    self.efficiency = efficiency(self.sorted_deduped.len());
                    self.attribs = attrs;
                }
                FilterState::Pass
            }
            stepregex::Step::Fail => FilterState::Pass,
        }
    }
}

/// Encodes covert bits in the order of an HTML/XML tag's attributes.
pub struct HtmlTagsPermutFilterIn<R> {
    reader: R,
    scan: TagScan,
    buffer: Vec<u8>,
    state: FilterState,
}

impl<R: BitSource> HtmlTagsPermutFilterIn<R> {
    /// Builds a new encoder reading covert bits from `reader`.
    pub fn new(reader: R) -> Result<Self, FilterError> {
        Ok(Self {
            reader,
            scan: TagScan::new()?,
            buffer: Vec::new(),
            state: FilterState::Empty,
        })
    }
}

impl<R: BitSource> Filter for HtmlTagsPermutFilterIn<R> {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);
        self.state = self.scan.write(c, &self.buffer);
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        guard_read(self.state)?;
        self.state = FilterState::Flushed;
        if self.scan.efficiency == 0 {
            return Ok(std::mem::take(&mut self.buffer));
        }
        let n = self.reader.read(self.scan.efficiency);
        let permuted = unrank(n, &self.scan.sorted_deduped);
        let mut out = self.scan.start.clone().into_bytes();
        out.push(b' ');
        out.extend(permuted.join(" ").into_bytes());
        out.push(b' ');
        out.extend(self.scan.end.clone().into_bytes());
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

/// Decodes covert bits from the order of an HTML/XML tag's attributes,
/// forwarding them to an attached bit sink. The tag itself passes through
/// unchanged.
pub struct HtmlTagsPermutFilterOut<W> {
    writer: W,
    scan: TagScan,
    buffer: Vec<u8>,
    state: FilterState,
}

impl<W: BitSink> HtmlTagsPermutFilterOut<W> {
    /// Builds a new decoder writing recovered covert bits to `writer`.
    pub fn new(writer: W) -> Result<Self, FilterError> {
        Ok(Self {
            writer,
            scan: TagScan::new()?,
            buffer: Vec::new(),
            state: FilterState::Empty,
        })
    }
}

impl<W: BitSink> Filter for HtmlTagsPermutFilterOut<W> {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        guard_write(self.state, self.buffer.len())?;
        self.buffer.push(c);
        self.state = self.scan.write(c, &self.buffer);
        Ok(self.state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        guard_read(self.state)?;
        self.state = FilterState::Flushed;
        if self.scan.efficiency != 0 {
            // Dedup in tag-observed order, matching the base list the
            // encoder ranked over.
            let n = rank(dedup_stable(self.scan.attribs.clone()));
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
