#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Lexicographic permutation coding and the small set of string helpers the
//! header/HTML permutation filters build on.
//!
//! `rank`/`unrank` turn an ordered list into an index into all of its
//! permutations (and back), which is the mechanism the covert channel uses to
//! smuggle bits in the order of a set of HTTP headers or HTML tag attributes:
//! the sender picks the permutation whose rank encodes the next `e` bits it
//! wants to send, the receiver recovers those bits by computing the rank of
//! whatever order it observed on the wire.
//!
//! Factorials beyond `20!` overflow `u64`; [`fact`] saturates at `u64::MAX`
//! rather than wrapping, which bounds the realistic number of headers or
//! attributes a single permutation coder can index (documented, not silent).

use std::sync::{Mutex, OnceLock};

fn fact_cache() -> &'static Mutex<Vec<u64>> {
    static CACHE: OnceLock<Mutex<Vec<u64>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(vec![1]))
}

/// Returns `n!`, extending a process-wide cache as needed. Saturates at
/// `u64::MAX` for `n >= 21`, where the true value would overflow `u64`.
pub fn fact(n: usize) -> u64 {
    let mut cache = fact_cache().lock().unwrap();
    while cache.len() <= n {
        let next = cache.len() as u64;
        let prev = *cache.last().unwrap();
        cache.push(prev.saturating_mul(next));
    }
    cache[n]
}

/// Returns `floor(log2(k!))`, the number of bits a permutation of `k`
/// distinct items can carry.
pub fn efficiency(k: usize) -> u32 {
    let f = fact(k);
    u64::BITS - 1 - f.leading_zeros()
}

/// Returns the `x`th permutation of `items` in lexicographic order (`x = 0`
/// is `items` sorted ascending). `x` is taken modulo `items.len()!`.
pub fn unrank<T: Clone>(x: u64, items: &[T]) -> Vec<T> {
    let mut remaining: Vec<T> = items.to_vec();
    let mut n = remaining.len() as u64;
    let mut f = fact(remaining.len());
    let mut x = if f == 0 { 0 } else { x % f };
    let mut result = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        f /= n;
        let q = (x / f) as usize;
        let r = x % f;
        result.push(remaining.remove(q));
        n -= 1;
        x = r;
    }
    result
}

/// Returns the lexicographic rank of `items` among all permutations of its
/// (unsorted) elements — the inverse of [`unrank`].
pub fn rank<T: Ord>(mut items: Vec<T>) -> u64 {
    let total = items.len();
    if total <= 1 {
        return 0;
    }
    let mut sorted_so_far = vec![items.pop().unwrap()];
    let mut r: u64 = 0;
    let mut n: u64 = 1;
    let mut cost: u64 = 1;
    while let Some(e) = items.pop() {
        let mut i = 0;
        while i < sorted_so_far.len() && sorted_so_far[i] < e {
            i += 1;
            r += cost;
        }
        if i == sorted_so_far.len() {
            sorted_so_far.push(e);
        } else {
            sorted_so_far.insert(i, e);
        }
        n += 1;
        cost *= n;
    }
    r
}

/// Splits a captured tag buffer (everything between, and including, the `<`
/// and `>` that bracket an HTML/XML start tag) into its attribute list, its
/// start marker (e.g. `<html`), and its end marker (e.g. `>` or `/>`).
///
/// Attributes are returned exactly as captured, including their surrounding
/// quotes, so the caller can permute and reassemble them without having to
/// re-derive quoting.
pub fn xml_tag_extract(s: &str) -> (Vec<String>, String, String) {
    const SEPARATORS: [char; 4] = ['\n', '\r', '\t', ' '];

    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_tag = false;
    let mut in_separator = false;
    let mut current = String::new();
    let mut start = String::new();
    let mut attributes = Vec::new();

    for c in s.chars() {
        if in_single_quote {
            current.push(c);
            if c == '\'' {
                in_tag = false;
                in_single_quote = false;
                in_double_quote = false;
                attributes.push(std::mem::take(&mut current));
            }
        } else if in_double_quote {
            current.push(c);
            if c == '"' {
                in_tag = false;
                in_single_quote = false;
                in_double_quote = false;
                attributes.push(std::mem::take(&mut current));
            }
        } else if in_tag {
            current.push(c);
            if c == '\'' {
                in_single_quote = true;
            }
            if c == '"' {
                in_double_quote = true;
            }
        } else if in_separator {
            if !SEPARATORS.contains(&c) {
                current.push(c);
                in_tag = true;
            }
        } else if SEPARATORS.contains(&c) {
            in_separator = true;
            start = std::mem::take(&mut current);
        } else {
            current.push(c);
        }
    }
    let end = current;
    (attributes, start, end)
}

/// Renders `n` as hexadecimal digits with no leading `0x` (used for chunked
/// transfer-encoding chunk-size lines). Returns an empty string for `n == 0`;
/// callers that need a literal `"0"` terminator write it themselves.
pub fn int_to_hex(mut n: u64, upper: bool) -> String {
    const LOWER: &[u8; 16] = b"0123456789abcdef";
    const UPPER: &[u8; 16] = b"0123456789ABCDEF";
    let digits = if upper { UPPER } else { LOWER };
    let mut result = Vec::new();
    while n != 0 {
        result.push(digits[(n & 0xf) as usize]);
        n >>= 4;
    }
    result.reverse();
    String::from_utf8(result).expect("hex digits are ASCII")
}
