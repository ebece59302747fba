//! A full response-direction pipeline — header-order coding feeding a body
//! extractor that runs HTML tag-order coding over the body — round-tripped
//! end to end, checked for semantic rather than byte-identical equivalence:
//! same status line, same header set (with `Content-Length` recomputed),
//! and the same tag attributes and inter-tag text in the body, independent
//! of which permutation the covert channel happened to pick.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use bitstream::{BinaryReader, BinaryWriter, Fifo, PacketReader, PacketWriter};
use filters::{
    Filter, FilterState, HtmlTagsPermutFilterIn, HtmlTagsPermutFilterOut, HttpDataExtractorFilter,
    HttpHeaderPermutFilterIn, HttpHeaderPermutFilterOut, SerialFilterGroup, DEFAULT_CHUNK_SIZE,
};

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

/// Splits a response into `(status line, sorted header lines, body)`, the
/// granularity a client actually cares about — header order and exact
/// `Content-Length` digits are transport detail, not semantics.
fn split(msg: &[u8]) -> (String, BTreeSet<String>, Vec<u8>) {
    let text = String::from_utf8_lossy(msg);
    let (head, body) = text.split_once("\r\n\r\n").expect("blank line present");
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().to_string();
    let headers: BTreeSet<String> = lines.map(str::to_string).filter(|l| !l.is_empty()).collect();
    (status, headers, body.as_bytes().to_vec())
}

/// Same attribute set per tag and the same inter-tag text, regardless of
/// the order attributes were written back in.
fn tag_attr_sets(html: &[u8]) -> Vec<BTreeSet<String>> {
    let text = String::from_utf8_lossy(html);
    let mut out = Vec::new();
    let mut rest = text.as_ref();
    while let Some(start) = rest.find('<') {
        let Some(end) = rest[start..].find('>') else { break };
        let tag = &rest[start + 1..start + end];
        let attrs: BTreeSet<String> = tag.split_whitespace().skip(1).map(str::to_string).collect();
        out.push(attrs);
        rest = &rest[start + end + 1..];
    }
    out
}

#[test]
fn response_with_html_body_round_trips_structurally_under_any_covert_payload() {
    let body = b"<div id=\"x\" class=\"y\">hi<span class=\"a\" data-x=\"b\">there</span></div>".to_vec();
    let msg = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nX-Trace: abc\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    let full_msg = [msg, body].concat();

    // A non-trivial payload (not all zero bits) so the permutation chosen
    // for both the header order and each tag's attribute order is exercised,
    // not just the degenerate already-sorted case.
    let mut src = Fifo::new();
    for _ in 0..8 {
        src.write(&[0xA5u8]);
    }
    let reader = Rc::new(RefCell::new(BinaryReader::new(PacketReader::new(src))));
    let mut encode = SerialFilterGroup::new(vec![
        Box::new(HttpHeaderPermutFilterIn::new(reader.clone()).unwrap()),
        Box::new(HttpDataExtractorFilter::new(HtmlTagsPermutFilterIn::new(reader).unwrap(), DEFAULT_CHUNK_SIZE).unwrap()),
    ]);

    let state = feed(&mut encode, &full_msg);
    assert_eq!(state, FilterState::Pass, "whole message consumed in one pass");
    let encoded = encode.read().unwrap();

    let sink = Fifo::new();
    let writer = Rc::new(RefCell::new(BinaryWriter::new(PacketWriter::new(sink))));
    let mut decode = SerialFilterGroup::new(vec![
        Box::new(HttpHeaderPermutFilterOut::new(writer.clone()).unwrap()),
        Box::new(HttpDataExtractorFilter::new(HtmlTagsPermutFilterOut::new(writer).unwrap(), DEFAULT_CHUNK_SIZE).unwrap()),
    ]);

    let state = feed(&mut decode, &encoded);
    assert_eq!(state, FilterState::Pass);
    let decoded = decode.read().unwrap();

    let (orig_status, orig_headers, orig_body) = split(&full_msg);
    let (got_status, got_headers, got_body) = split(&decoded);
    assert_eq!(got_status, orig_status);
    assert_eq!(got_headers, orig_headers, "Content-Length recomputed, other headers untouched");
    assert_eq!(tag_attr_sets(&got_body), tag_attr_sets(&orig_body));
    assert!(got_body.windows(2).any(|w| w == b"hi"));
    assert!(got_body.windows(5).any(|w| w == b"there"));
}
