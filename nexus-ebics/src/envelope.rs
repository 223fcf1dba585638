//! Low-level XML helpers shared by the key-management, download, and
//! upload request builders, plus a generic response-field scanner.
//!
//! EBICS responses are shallow: almost everything this engine needs is a
//! handful of leaf text elements (`TransactionID`, `ReturnCode`,
//! `OrderData`, ...). Rather than modelling the full `ebicsResponse` schema
//! with serde, a single-pass scan collects the fields that exist into
//! [`ResponseFields`] — the same approach `nexus-xml` takes for pulling
//! `ds:SignatureValue` out of a signed envelope.

use crate::error::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use std::io::Cursor;

/// Namespace for `H004` vs `H005`, used on every envelope root element.
pub fn namespace(dialect: nexus_iso20022::dialect::Dialect) -> &'static str {
    match dialect {
        nexus_iso20022::dialect::Dialect::H004 => "urn:org:ebics:H004",
        nexus_iso20022::dialect::Dialect::H005 => "urn:org:ebics:H005",
    }
}

/// Write `<tag>text</tag>`.
pub fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
    Ok(())
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Framing(e.to_string())
    }
}

/// Finish a [`Writer`] into a UTF-8 string.
pub fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Framing(e.to_string()))
}

/// The fields this engine ever needs to read back out of an EBICS response.
#[derive(Debug, Clone, Default)]
pub struct ResponseFields {
    /// `OrderID` assigned by the bank, for uploads.
    pub order_id: Option<String>,
    /// `TransactionID`, for multi-phase transactions.
    pub transaction_id: Option<String>,
    /// `TransactionPhase`.
    pub transaction_phase: Option<String>,
    /// `NumSegments`.
    pub num_segments: Option<u32>,
    /// `SegmentNumber`.
    pub segment_number: Option<u32>,
    /// `TechnicalReturnCode` / `ReturnCode` (H004 uses both names
    /// depending on element scope; both are scanned for).
    pub technical_return_code: Option<String>,
    /// Business-layer `ReportText`/reason, when present.
    pub report_text: Option<String>,
    /// `DataEncryptionInfo/EncryptionPubKeyDigest`, base64.
    pub encryption_pub_key_digest: Option<String>,
    /// `DataEncryptionInfo/TransactionKey`, base64.
    pub transaction_key: Option<String>,
    /// `OrderData`, base64 (one segment's worth, or the whole payload for
    /// single-segment transactions).
    pub order_data: Option<String>,
}

const LEAF_TAGS: &[&str] = &[
    "OrderID",
    "TransactionID",
    "TransactionPhase",
    "NumSegments",
    "SegmentNumber",
    "TechnicalReturnCode",
    "ReturnCode",
    "ReportText",
    "EncryptionPubKeyDigest",
    "TransactionKey",
    "OrderData",
];

/// Scan `xml` once, collecting every leaf tag this engine cares about.
pub fn parse_response(xml: &[u8]) -> Result<ResponseFields> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut fields = ResponseFields::default();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(start) => {
                let local = start.name();
                let local = String::from_utf8_lossy(local.local_name().as_ref()).into_owned();
                if LEAF_TAGS.contains(&local.as_str()) {
                    current = Some(local);
                }
            }
            Event::Text(text) if current.is_some() => {
                let value = text
                    .unescape()
                    .map_err(|e| Error::Framing(e.to_string()))?
                    .into_owned();
                match current.as_deref() {
                    Some("OrderID") => fields.order_id = Some(value),
                    Some("TransactionID") => fields.transaction_id = Some(value),
                    Some("TransactionPhase") => fields.transaction_phase = Some(value),
                    Some("NumSegments") => fields.num_segments = value.parse().ok(),
                    Some("SegmentNumber") => fields.segment_number = value.parse().ok(),
                    Some("TechnicalReturnCode") | Some("ReturnCode") => {
                        if fields.technical_return_code.is_none() {
                            fields.technical_return_code = Some(value)
                        }
                    }
                    Some("ReportText") => fields.report_text = Some(value),
                    Some("EncryptionPubKeyDigest") => {
                        fields.encryption_pub_key_digest = Some(value)
                    }
                    Some("TransactionKey") => fields.transaction_key = Some(value),
                    Some("OrderData") => fields.order_data = Some(value),
                    _ => {}
                }
            }
            Event::End(_) => current = None,
            _ => {}
        }
        buf.clear();
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_known_leaves() {
        let xml = br#"<ebicsResponse><header><mutable>
            <TransactionPhase>Initialisation</TransactionPhase>
            <SegmentNumber lastSegment="false">1</SegmentNumber>
            <ReturnCode>000000</ReturnCode>
        </mutable></header><body>
            <TransactionID>00AABBCC</TransactionID>
            <ReturnCode>000000</ReturnCode>
        </body></ebicsResponse>"#;
        let fields = parse_response(xml).unwrap();
        assert_eq!(fields.transaction_phase.as_deref(), Some("Initialisation"));
        assert_eq!(fields.segment_number, Some(1));
        assert_eq!(fields.transaction_id.as_deref(), Some("00AABBCC"));
        assert_eq!(fields.technical_return_code.as_deref(), Some("000000"));
    }
}
