//! Canonicalization of the elements an EBICS signature covers.
//!
//! EBICS signs a restricted, self-controlled subset of the request: every
//! element carrying `authenticate="true"` (in practice the `header` and
//! `body` elements of `ebicsRequest`/`ebicsResponse`). This module does not
//! implement the full W3C Exclusive XML Canonicalization recommendation —
//! there is no need to, since both sides of this protocol emit and consume
//! documents with no comments, processing instructions, or namespace
//! inheritance games. What it implements is the subset of C14N rules that
//! actually vary between two otherwise-equivalent serializations of the
//! same EBICS element: attribute ordering, self-closing-tag expansion, and
//! text/attribute escaping.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

const AUTHENTICATE_ATTR: &[u8] = b"authenticate";
const AUTHENTICATE_TRUE: &[u8] = b"true";

/// Canonicalize every element carrying `authenticate="true"`, in document
/// order, and concatenate their canonical byte strings. This is the input
/// to the A006 signature digest over an EBICS request or response envelope.
pub fn canonicalize_authenticated(xml: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut out = Vec::new();
    let mut capture: Option<CaptureFrame> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Eof => break,
            Event::Start(start) => {
                if let Some(frame) = capture.as_mut() {
                    frame.depth += 1;
                    write_start(&mut frame.buf, start);
                } else if is_authenticated(start)? {
                    let mut frame = CaptureFrame::new();
                    write_start(&mut frame.buf, start);
                    capture = Some(frame);
                }
            }
            Event::Empty(start) => {
                if let Some(frame) = capture.as_mut() {
                    write_start(&mut frame.buf, start);
                    write_end(&mut frame.buf, start.name().as_ref());
                } else if is_authenticated(start)? {
                    let mut frame = CaptureFrame::new();
                    write_start(&mut frame.buf, start);
                    write_end(&mut frame.buf, start.name().as_ref());
                    out.extend_from_slice(&frame.buf);
                }
            }
            Event::End(end) => {
                if let Some(frame) = capture.as_mut() {
                    if frame.depth == 0 {
                        write_end(&mut frame.buf, end.name().as_ref());
                        let finished = capture.take().unwrap();
                        out.extend_from_slice(&finished.buf);
                    } else {
                        frame.depth -= 1;
                        write_end(&mut frame.buf, end.name().as_ref());
                    }
                }
            }
            Event::Text(text) => {
                if let Some(frame) = capture.as_mut() {
                    let unescaped = text.unescape().map_err(|e| Error::Malformed(e.to_string()))?;
                    write_escaped_text(&mut frame.buf, unescaped.as_bytes());
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = capture.as_mut() {
                    write_escaped_text(&mut frame.buf, cdata.as_ref());
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if out.is_empty() {
        return Err(Error::NoAuthenticatedElements);
    }
    Ok(out)
}

struct CaptureFrame {
    buf: Vec<u8>,
    depth: usize,
}

impl CaptureFrame {
    fn new() -> Self {
        CaptureFrame {
            buf: Vec::new(),
            depth: 0,
        }
    }
}

fn is_authenticated(start: &BytesStart<'_>) -> Result<bool> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Malformed(e.to_string()))?;
        if attr.key.as_ref() == AUTHENTICATE_ATTR && attr.value.as_ref() == AUTHENTICATE_TRUE {
            return Ok(true);
        }
    }
    Ok(false)
}

fn write_start(buf: &mut Vec<u8>, start: &BytesStart<'_>) {
    buf.push(b'<');
    buf.extend_from_slice(start.name().as_ref());

    let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| (a.key.as_ref().to_vec(), a.value.as_ref().to_vec()))
        .collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in attrs {
        buf.push(b' ');
        buf.extend_from_slice(&name);
        buf.extend_from_slice(b"=\"");
        write_escaped_attr(buf, &value);
        buf.push(b'"');
    }
    buf.push(b'>');
}

fn write_end(buf: &mut Vec<u8>, name: &[u8]) {
    buf.extend_from_slice(b"</");
    buf.extend_from_slice(name);
    buf.push(b'>');
}

fn write_escaped_text(buf: &mut Vec<u8>, text: &[u8]) {
    for &b in text {
        match b {
            b'&' => buf.extend_from_slice(b"&amp;"),
            b'<' => buf.extend_from_slice(b"&lt;"),
            b'>' => buf.extend_from_slice(b"&gt;"),
            b'\r' => buf.extend_from_slice(b"&#13;"),
            _ => buf.push(b),
        }
    }
}

fn write_escaped_attr(buf: &mut Vec<u8>, value: &[u8]) {
    for &b in value {
        match b {
            b'&' => buf.extend_from_slice(b"&amp;"),
            b'<' => buf.extend_from_slice(b"&lt;"),
            b'"' => buf.extend_from_slice(b"&quot;"),
            b'\t' => buf.extend_from_slice(b"&#9;"),
            b'\n' => buf.extend_from_slice(b"&#10;"),
            b'\r' => buf.extend_from_slice(b"&#13;"),
            _ => buf.push(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_only_authenticated_elements() {
        let xml = br#"<ebicsRequest><header authenticate="true"><a>1</a></header><body authenticate="true"><b>2</b></body><other>ignored</other></ebicsRequest>"#;
        let canon = canonicalize_authenticated(xml).unwrap();
        let s = String::from_utf8(canon).unwrap();
        assert_eq!(
            s,
            r#"<header authenticate="true"><a>1</a></header><body authenticate="true"><b>2</b></body>"#
        );
    }

    #[test]
    fn self_closing_elements_expand() {
        let xml = br#"<root><header authenticate="true"/></root>"#;
        let canon = canonicalize_authenticated(xml).unwrap();
        assert_eq!(canon, br#"<header authenticate="true"></header>"#.to_vec());
    }

    #[test]
    fn attributes_are_sorted_lexicographically() {
        let xml = br#"<root><header z="1" authenticate="true" a="2"></header></root>"#;
        let canon = canonicalize_authenticated(xml).unwrap();
        let s = String::from_utf8(canon).unwrap();
        assert_eq!(s, r#"<header a="2" authenticate="true" z="1"></header>"#);
    }

    #[test]
    fn no_authenticated_elements_is_an_error() {
        let xml = br#"<root><a>no signing here</a></root>"#;
        assert!(canonicalize_authenticated(xml).is_err());
    }

    #[test]
    fn whitespace_differences_outside_authenticated_elements_do_not_affect_digest() {
        let a = br#"<root><header authenticate="true"><x>1</x></header></root>"#;
        let b = br#"<root>
            <header authenticate="true"><x>1</x></header>
        </root>"#;
        assert_eq!(
            canonicalize_authenticated(a).unwrap(),
            canonicalize_authenticated(b).unwrap()
        );
    }

    #[test]
    fn entities_round_trip_through_canonical_escaping() {
        let xml = br#"<root><header authenticate="true"><x>a &amp; b &lt; c</x></header></root>"#;
        let canon = canonicalize_authenticated(xml).unwrap();
        let s = String::from_utf8(canon).unwrap();
        assert!(s.contains("a &amp; b &lt; c"));
    }
}
