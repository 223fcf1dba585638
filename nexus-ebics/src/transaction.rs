//! Download and upload transaction orchestration: the multi-phase state
//! machines described in §4.2 — `INIT → [TRANSFER × N] → RECEIPT` for
//! downloads, `INIT → [TRANSFER × N]` for uploads.
//!
//! Both orchestrators run the whole transaction while holding the
//! subscriber's lock (§5's "simpler option"): callers acquire
//! [`EbicsSubscriber::lock`] before calling into this module.

use crate::envelope::{self, namespace, ResponseFields};
use crate::error::{Error, Result};
use crate::order::{Btf, OrderType};
use crate::subscriber::EbicsSubscriber;
use crate::transport::EbicsTransport;
use chrono::{NaiveDate, Utc};
use nexus_crypto::cipher::{E002Envelope, encrypt_with_key, generate_transaction_key, wrap_transaction_key};
use nexus_iso20022::dialect::Dialect;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Inclusive date range restricting a download, translated from the
/// scheduler's `rangeType` before reaching this crate.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    /// `DateRange/Start`.
    pub start: NaiveDate,
    /// `DateRange/End`.
    pub end: NaiveDate,
}

/// The order selector for a download or upload: either an H004 `OrderType`
/// or an H005 `BTF` descriptor, never both.
#[derive(Debug, Clone)]
pub enum OrderSelector {
    /// EBICS 2.5 order type string.
    OrderType(OrderType),
    /// EBICS 3.0 BTF descriptor.
    Btf(Btf),
}

/// Write the `OrderDetails`/`OrderType` (H004) or `BTF` (H005) element
/// that selects the order, plus an optional `StandardOrderParams/DateRange`
/// nested inside it. The two dialects use disjoint shapes (spec.md §6.1),
/// so this branches rather than reducing `selector` to a bare string.
fn write_order_selector(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    selector: &OrderSelector,
    order_attribute: &str,
    date_range: Option<DateRange>,
) -> Result<()> {
    match selector {
        OrderSelector::OrderType(ot) => {
            writer.write_event(Event::Start(BytesStart::new("OrderDetails")))?;
            envelope::write_element(writer, "OrderType", ot.as_str())?;
            envelope::write_element(writer, "OrderAttribute", order_attribute)?;
            write_date_range(writer, date_range)?;
            writer.write_event(Event::End(BytesEnd::new("OrderDetails")))?;
        }
        OrderSelector::Btf(btf) => {
            writer.write_event(Event::Start(BytesStart::new("BTF")))?;
            envelope::write_element(writer, "ServiceName", &btf.service_name)?;
            if let Some(scope) = &btf.scope {
                envelope::write_element(writer, "Scope", scope)?;
            }
            let mut msg_name = BytesStart::new("MsgName");
            msg_name.push_attribute(("version", btf.message_version.as_str()));
            writer.write_event(Event::Start(msg_name))?;
            writer.write_event(Event::Text(BytesText::new(&btf.message_name)))?;
            writer.write_event(Event::End(BytesEnd::new("MsgName")))?;
            if let Some(option) = &btf.service_option {
                envelope::write_element(writer, "ServiceOption", option)?;
            }
            if let Some(container_type) = &btf.container {
                let mut container = BytesStart::new("Container");
                container.push_attribute(("containerType", container_type.as_str()));
                writer.write_event(Event::Start(container))?;
                writer.write_event(Event::End(BytesEnd::new("Container")))?;
            }
            write_date_range(writer, date_range)?;
            writer.write_event(Event::End(BytesEnd::new("BTF")))?;
        }
    }
    Ok(())
}

fn write_date_range(writer: &mut Writer<Cursor<Vec<u8>>>, date_range: Option<DateRange>) -> Result<()> {
    if let Some(range) = date_range {
        writer.write_event(Event::Start(BytesStart::new("StandardOrderParams")))?;
        writer.write_event(Event::Start(BytesStart::new("DateRange")))?;
        envelope::write_element(writer, "Start", &range.start.format("%Y-%m-%d").to_string())?;
        envelope::write_element(writer, "End", &range.end.format("%Y-%m-%d").to_string())?;
        writer.write_event(Event::End(BytesEnd::new("DateRange")))?;
        writer.write_event(Event::End(BytesEnd::new("StandardOrderParams")))?;
    }
    Ok(())
}

/// Outcome of a completed download transaction.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Decrypted, inflated order data. For C52/C53/C54 this is typically a
    /// ZIP container of one or more camt.05x documents, or a single raw XML
    /// document if the bank does not zip single-document downloads.
    pub order_data: Vec<u8>,
    /// `true` if the bank reported `EBICS_NO_DOWNLOAD_DATA_AVAILABLE` — the
    /// transaction terminated cleanly with zero documents.
    pub no_data_available: bool,
}

/// Outcome of a completed upload transaction.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// The `OrderID` the bank assigned.
    pub order_id: String,
    /// The `TransactionID` the bank assigned, for forensics/logging.
    pub transaction_id: String,
}

/// Segment size for upload chunking: 4096 base64 characters per §4.2.
const UPLOAD_SEGMENT_SIZE: usize = 4096;

/// Run a full download transaction: INIT, any TRANSFER segments, RECEIPT.
///
/// `our_auth_priv`/bank auth+enc public keys must already be resolved on
/// `subscriber.keys` (i.e. HPB has completed) before this is called.
pub async fn run_download(
    transport: &EbicsTransport,
    subscriber: &EbicsSubscriber,
    selector: OrderSelector,
    date_range: Option<DateRange>,
) -> Result<DownloadResult> {
    let bank_auth_pub = subscriber
        .keys
        .bank_authentication_public_key
        .as_ref()
        .ok_or_else(|| Error::Framing("bank authentication key not yet known (run HPB first)".into()))?;
    let bank_enc_pub = subscriber
        .keys
        .bank_encryption_public_key
        .as_ref()
        .ok_or_else(|| Error::Framing("bank encryption key not yet known (run HPB first)".into()))?;

    let init_request = build_download_init(subscriber, &selector, date_range)?;
    let signed = nexus_xml::signature::sign_and_embed(
        init_request.as_bytes(),
        &subscriber.keys.authentication_private_key,
    )?;
    let response = transport
        .post(&subscriber.url, String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?)
        .await?;
    nexus_xml::signature::verify_envelope(&response, bank_auth_pub)?;
    let fields = envelope::parse_response(&response)?;

    let code = fields
        .technical_return_code
        .as_deref()
        .ok_or_else(|| Error::Framing("download INIT response has no return code".into()))?;
    if code == "090005" {
        return Ok(DownloadResult {
            order_data: Vec::new(),
            no_data_available: true,
        });
    }
    if code != "000000" {
        return Err(Error::bank_technical(code));
    }

    let transaction_id = fields
        .transaction_id
        .clone()
        .ok_or_else(|| Error::Framing("download INIT response has no TransactionID".into()))?;
    let num_segments = fields.num_segments.unwrap_or(1);
    let enc_tx_key_b64 = fields
        .transaction_key
        .clone()
        .ok_or_else(|| Error::Framing("download INIT response has no TransactionKey".into()))?;
    let enc_pub_digest_b64 = fields
        .encryption_pub_key_digest
        .clone()
        .ok_or_else(|| Error::Framing("download INIT response has no EncryptionPubKeyDigest".into()))?;

    let mut segments_b64 = vec![fields
        .order_data
        .clone()
        .ok_or_else(|| Error::Framing("download INIT response has no OrderData".into()))?];

    for segment_number in 2..=num_segments {
        let request = build_download_transfer(subscriber, &transaction_id, segment_number)?;
        let signed = nexus_xml::signature::sign_and_embed(
            request.as_bytes(),
            &subscriber.keys.authentication_private_key,
        )?;
        let response = transport
            .post(&subscriber.url, String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?)
            .await?;
        nexus_xml::signature::verify_envelope(&response, bank_auth_pub)?;
        let fields = envelope::parse_response(&response)?;
        check_ok(&fields)?;
        segments_b64.push(
            fields
                .order_data
                .ok_or_else(|| Error::Framing(format!("TRANSFER segment {segment_number} has no OrderData")))?,
        );
    }

    let ciphertext = nexus_crypto::encoding::decode(&segments_b64.concat())
        .map_err(nexus_crypto::Error::from)
        .map_err(|e| Error::PostProcessing(e.to_string()))?;
    let enc_tx_key = nexus_crypto::encoding::decode(&enc_tx_key_b64)
        .map_err(nexus_crypto::Error::from)
        .map_err(|e| Error::PostProcessing(e.to_string()))?;
    let digest_bytes = nexus_crypto::encoding::decode(&enc_pub_digest_b64)
        .map_err(nexus_crypto::Error::from)
        .map_err(|e| Error::PostProcessing(e.to_string()))?;
    let mut digest = [0u8; 32];
    if digest_bytes.len() == 32 {
        digest.copy_from_slice(&digest_bytes);
    }
    let decryption_key = subscriber.keys.decryption_key_for_digest(&digest)?;

    let plain = nexus_crypto::cipher::decrypt_e002(&ciphertext, &enc_tx_key, decryption_key)
        .map_err(|e| Error::PostProcessing(format!("E002 decrypt failed: {e}")))?;
    let order_data = nexus_crypto::compress::inflate(&plain)
        .map_err(|e| Error::PostProcessing(format!("inflate failed: {e}")))?;

    let receipt_request = build_receipt(subscriber, &transaction_id)?;
    let signed = nexus_xml::signature::sign_and_embed(
        receipt_request.as_bytes(),
        &subscriber.keys.authentication_private_key,
    )?;
    let response = transport
        .post(&subscriber.url, String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?)
        .await?;
    nexus_xml::signature::verify_envelope(&response, bank_auth_pub)?;
    let fields = envelope::parse_response(&response)?;
    check_ok(&fields)?;

    Ok(DownloadResult {
        order_data,
        no_data_available: false,
    })
}

/// Run a full upload transaction for already-serialized order data (e.g.
/// pain.001 bytes), signing it with the subscriber's A006 signing key and
/// splitting the encrypted payload into `UPLOAD_SEGMENT_SIZE`-character
/// base64 segments.
pub async fn run_upload(
    transport: &EbicsTransport,
    subscriber: &EbicsSubscriber,
    selector: OrderSelector,
    order_data: &[u8],
) -> Result<UploadResult> {
    let bank_auth_pub = subscriber
        .keys
        .bank_authentication_public_key
        .as_ref()
        .ok_or_else(|| Error::Framing("bank authentication key not yet known (run HPB first)".into()))?;
    let bank_enc_pub = subscriber
        .keys
        .bank_encryption_public_key
        .as_ref()
        .ok_or_else(|| Error::Framing("bank encryption key not yet known (run HPB first)".into()))?;

    let signature_value = nexus_crypto::signature::sign_a006(order_data, &subscriber.keys.signing_private_key)
        .map_err(Error::from)?;
    let user_signature_data = build_user_signature_data(subscriber, &signature_value)?;

    let key = generate_transaction_key();
    let encrypted_signature_data = encrypt_with_key(user_signature_data.as_bytes(), &key);
    let compressed_order_data = nexus_crypto::compress::deflate(order_data).map_err(Error::from)?;
    let encrypted_order_data = encrypt_with_key(&compressed_order_data, &key);
    let encrypted_transaction_key = wrap_transaction_key(&key, bank_enc_pub).map_err(Error::from)?;
    let envelope_info = E002Envelope {
        encrypted_transaction_key,
        encryption_pub_key_digest: nexus_crypto::keys::public_key_digest(bank_enc_pub).map_err(Error::from)?,
        ciphertext: encrypted_order_data,
    };

    let order_data_b64 = nexus_crypto::encoding::encode(&envelope_info.ciphertext);
    let segments: Vec<&str> = {
        let bytes = order_data_b64.as_bytes();
        bytes
            .chunks(UPLOAD_SEGMENT_SIZE)
            .map(|c| std::str::from_utf8(c).expect("base64 is ASCII"))
            .collect()
    };
    let num_segments = segments.len().max(1) as u32;

    let order_id = subscriber.next_order_id()?;
    let init_request = build_upload_init(
        subscriber,
        &selector,
        &order_id,
        num_segments,
        &envelope_info,
        &encrypted_signature_data,
        segments.first().copied().unwrap_or(""),
    )?;
    let signed = nexus_xml::signature::sign_and_embed(
        init_request.as_bytes(),
        &subscriber.keys.authentication_private_key,
    )?;
    let response = transport
        .post(&subscriber.url, String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?)
        .await?;
    nexus_xml::signature::verify_envelope(&response, bank_auth_pub)?;
    let fields = envelope::parse_response(&response)?;
    check_ok(&fields)?;
    let transaction_id = fields
        .transaction_id
        .clone()
        .ok_or_else(|| Error::Framing("upload INIT response has no TransactionID".into()))?;

    for (idx, segment) in segments.iter().enumerate().skip(1) {
        let chunk_index_on_wire = idx as u32 + 1; // 1-based on the wire
        let request = build_upload_transfer(subscriber, &transaction_id, chunk_index_on_wire, segment)?;
        let signed = nexus_xml::signature::sign_and_embed(
            request.as_bytes(),
            &subscriber.keys.authentication_private_key,
        )?;
        let response = transport
            .post(&subscriber.url, String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?)
            .await?;
        nexus_xml::signature::verify_envelope(&response, bank_auth_pub)?;
        let fields = envelope::parse_response(&response)?;
        check_ok(&fields)?;
    }

    let order_id = fields.order_id.unwrap_or(order_id);
    Ok(UploadResult {
        order_id,
        transaction_id,
    })
}

fn check_ok(fields: &ResponseFields) -> Result<()> {
    match fields.technical_return_code.as_deref() {
        Some("000000") => Ok(()),
        Some("011000") | Some("011001") => Ok(()),
        Some(code) => Err(Error::bank_technical(code)),
        None => Err(Error::Framing("response has no return code".into())),
    }
}

fn xml_writer() -> Writer<Cursor<Vec<u8>>> {
    Writer::new(Cursor::new(Vec::new()))
}

fn build_download_init(
    subscriber: &EbicsSubscriber,
    selector: &OrderSelector,
    date_range: Option<DateRange>,
) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", dialect_version(subscriber.dialect)));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    let nonce: [u8; 16] = rand::random();
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "Nonce", &hex(&nonce))?;
    envelope::write_element(&mut writer, "Timestamp", &Utc::now().to_rfc3339())?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;

    write_order_selector(&mut writer, selector, "DZHNN", date_range)?;

    writer.write_event(Event::Start(BytesStart::new("BankPubKeyDigests")))?;
    write_key_digest(&mut writer, "Authentication", subscriber)?;
    write_key_digest(&mut writer, "Encryption", subscriber)?;
    writer.write_event(Event::End(BytesEnd::new("BankPubKeyDigests")))?;

    envelope::write_element(&mut writer, "SecurityMedium", "0000")?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Initialisation")?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsRequest")))?;
    envelope::finish(writer)
}

fn build_download_transfer(
    subscriber: &EbicsSubscriber,
    transaction_id: &str,
    segment_number: u32,
) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", dialect_version(subscriber.dialect)));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "TransactionID", transaction_id)?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Transfer")?;
    let mut seg = BytesStart::new("SegmentNumber");
    seg.push_attribute(("lastSegment", "false"));
    writer.write_event(Event::Start(seg))?;
    writer.write_event(Event::Text(BytesText::new(&segment_number.to_string())))?;
    writer.write_event(Event::End(BytesEnd::new("SegmentNumber")))?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsRequest")))?;
    envelope::finish(writer)
}

fn build_receipt(subscriber: &EbicsSubscriber, transaction_id: &str) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", dialect_version(subscriber.dialect)));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "TransactionID", transaction_id)?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Receipt")?;
    writer.write_event(Event::Start(BytesStart::new("ReceiptCode")))?;
    writer.write_event(Event::Text(BytesText::new("0")))?;
    writer.write_event(Event::End(BytesEnd::new("ReceiptCode")))?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsRequest")))?;
    envelope::finish(writer)
}

fn build_upload_init(
    subscriber: &EbicsSubscriber,
    selector: &OrderSelector,
    order_id: &str,
    num_segments: u32,
    envelope_info: &E002Envelope,
    encrypted_signature_data: &[u8],
    first_segment_b64: &str,
) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", dialect_version(subscriber.dialect)));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    let nonce: [u8; 16] = rand::random();
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "Nonce", &hex(&nonce))?;
    envelope::write_element(&mut writer, "Timestamp", &Utc::now().to_rfc3339())?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    envelope::write_element(&mut writer, "OrderID", order_id)?;

    write_order_selector(&mut writer, selector, "OZHNN", None)?;

    writer.write_event(Event::Start(BytesStart::new("BankPubKeyDigests")))?;
    write_key_digest(&mut writer, "Authentication", subscriber)?;
    write_key_digest(&mut writer, "Encryption", subscriber)?;
    writer.write_event(Event::End(BytesEnd::new("BankPubKeyDigests")))?;

    envelope::write_element(&mut writer, "SecurityMedium", "0000")?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Initialisation")?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(BytesStart::new("DataTransfer")))?;
    writer.write_event(Event::Start(BytesStart::new("DataEncryptionInfo")))?;
    envelope::write_element(
        &mut writer,
        "EncryptionPubKeyDigest",
        &nexus_crypto::encoding::encode(&envelope_info.encryption_pub_key_digest),
    )?;
    envelope::write_element(
        &mut writer,
        "TransactionKey",
        &nexus_crypto::encoding::encode(&envelope_info.encrypted_transaction_key),
    )?;
    writer.write_event(Event::End(BytesEnd::new("DataEncryptionInfo")))?;

    writer.write_event(Event::Start(BytesStart::new("SignatureData")))?;
    writer.write_event(Event::Text(BytesText::new(&nexus_crypto::encoding::encode(
        encrypted_signature_data,
    ))))?;
    writer.write_event(Event::End(BytesEnd::new("SignatureData")))?;

    writer.write_event(Event::Start(BytesStart::new("OrderData")))?;
    writer.write_event(Event::Text(BytesText::new(first_segment_b64)))?;
    writer.write_event(Event::End(BytesEnd::new("OrderData")))?;

    writer.write_event(Event::End(BytesEnd::new("DataTransfer")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsRequest")))?;
    envelope::finish(writer)
}

fn build_upload_transfer(
    subscriber: &EbicsSubscriber,
    transaction_id: &str,
    chunk_index_on_wire: u32,
    segment_b64: &str,
) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", dialect_version(subscriber.dialect)));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "TransactionID", transaction_id)?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Transfer")?;
    let mut seg = BytesStart::new("SegmentNumber");
    seg.push_attribute(("lastSegment", "true"));
    writer.write_event(Event::Start(seg))?;
    writer.write_event(Event::Text(BytesText::new(&chunk_index_on_wire.to_string())))?;
    writer.write_event(Event::End(BytesEnd::new("SegmentNumber")))?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(BytesStart::new("DataTransfer")))?;
    writer.write_event(Event::Start(BytesStart::new("OrderData")))?;
    writer.write_event(Event::Text(BytesText::new(segment_b64)))?;
    writer.write_event(Event::End(BytesEnd::new("OrderData")))?;
    writer.write_event(Event::End(BytesEnd::new("DataTransfer")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsRequest")))?;
    envelope::finish(writer)
}

fn build_user_signature_data(subscriber: &EbicsSubscriber, signature_value: &[u8]) -> Result<String> {
    let mut writer = xml_writer();
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("UserSignatureData")))?;
    writer.write_event(Event::Start(BytesStart::new("OrderSignatureData")))?;
    envelope::write_element(&mut writer, "SignatureVersion", "A006")?;
    envelope::write_element(
        &mut writer,
        "SignatureValue",
        &nexus_crypto::encoding::encode(signature_value),
    )?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    writer.write_event(Event::End(BytesEnd::new("OrderSignatureData")))?;
    writer.write_event(Event::End(BytesEnd::new("UserSignatureData")))?;
    envelope::finish(writer)
}

fn write_key_digest(writer: &mut Writer<Cursor<Vec<u8>>>, role: &str, subscriber: &EbicsSubscriber) -> Result<()> {
    let tag = format!("{role}");
    let key = match role {
        "Authentication" => subscriber
            .keys
            .bank_authentication_public_key
            .as_ref()
            .expect("checked by caller before reaching the writer"),
        _ => subscriber
            .keys
            .bank_encryption_public_key
            .as_ref()
            .expect("checked by caller before reaching the writer"),
    };
    let digest = nexus_crypto::keys::public_key_digest(key).map_err(Error::from)?;
    let mut el = BytesStart::new(tag.as_str());
    el.push_attribute(("Version", if role == "Authentication" { "X002" } else { "E002" }));
    writer.write_event(Event::Start(el))?;
    writer.write_event(Event::Text(BytesText::new(&nexus_crypto::encoding::encode(&digest))))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn dialect_version(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::H004 => "H004",
        Dialect::H005 => "H005",
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_selector_writes_order_details() {
        let mut writer = xml_writer();
        write_order_selector(&mut writer, &OrderSelector::OrderType(OrderType::C53), "DZHNN", None).unwrap();
        let xml = envelope::finish(writer).unwrap();
        assert!(xml.contains("<OrderDetails>"));
        assert!(xml.contains("<OrderType>C53</OrderType>"));
        assert!(xml.contains("<OrderAttribute>DZHNN</OrderAttribute>"));
        assert!(!xml.contains("<BTF>"));
    }

    #[test]
    fn btf_selector_writes_service_descriptor() {
        let mut writer = xml_writer();
        write_order_selector(&mut writer, &OrderSelector::Btf(Btf::camt053()), "DZHNN", None).unwrap();
        let xml = envelope::finish(writer).unwrap();
        assert!(xml.contains("<BTF>"));
        assert!(xml.contains("<ServiceName>STM</ServiceName>"));
        assert!(xml.contains("<Scope>SEPA</Scope>"));
        assert!(xml.contains("<MsgName version=\"08\">camt.053</MsgName>"));
        assert!(xml.contains("<Container containerType=\"ZIP\">"));
        assert!(!xml.contains("<OrderDetails>"));
    }

    #[test]
    fn btf_selector_carries_date_range() {
        let mut writer = xml_writer();
        let range = DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        write_order_selector(&mut writer, &OrderSelector::Btf(Btf::camt053()), "DZHNN", Some(range)).unwrap();
        let xml = envelope::finish(writer).unwrap();
        assert!(xml.contains("<Start>2024-01-01</Start>"));
        assert!(xml.contains("<End>2024-01-31</End>"));
    }
}
