//! INI, HIA, and HPB: the single-shot key-management transactions.
//!
//! INI and HIA upload our own public keys inside an `ebicsUnsecuredRequest`
//! — there is no `AuthSignature` because we have no confirmed relationship
//! with the bank yet. HPB downloads the bank's two public keys inside an
//! `ebicsNoPubKeyDigestsRequest`, which *is* signed with our authentication
//! key, since by that point the bank already has it from HIA.

use crate::envelope::{self, namespace};
use crate::error::{Error, Result};
use crate::order::OrderType;
use crate::subscriber::EbicsSubscriber;
use crate::transport::EbicsTransport;
use chrono::Utc;
use nexus_crypto::{RsaPrivateKey, RsaPublicKey};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use rsa::traits::PublicKeyParts;
use std::io::Cursor;

fn rsa_key_value_xml(writer: &mut Writer<Cursor<Vec<u8>>>, pub_key: &RsaPublicKey) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("ds:RSAKeyValue")))?;
    envelope::write_element(
        writer,
        "ds:Modulus",
        &nexus_crypto::encoding::encode(&pub_key.n().to_bytes_be()),
    )?;
    envelope::write_element(
        writer,
        "ds:Exponent",
        &nexus_crypto::encoding::encode(&pub_key.e().to_bytes_be()),
    )?;
    writer.write_event(Event::End(BytesEnd::new("ds:RSAKeyValue")))?;
    Ok(())
}

fn build_unsecured_envelope(
    subscriber: &EbicsSubscriber,
    order_type: OrderType,
    order_data_b64: &str,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsUnsecuredRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", "H004"));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    writer.write_event(Event::Start(BytesStart::new("static")))?;
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    writer.write_event(Event::Start(BytesStart::new("OrderDetails")))?;
    envelope::write_element(&mut writer, "OrderType", order_type.as_str())?;
    envelope::write_element(&mut writer, "OrderAttribute", "DZNNN")?;
    writer.write_event(Event::End(BytesEnd::new("OrderDetails")))?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;
    writer.write_event(Event::Start(BytesStart::new("mutable")))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Initialisation")?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(BytesStart::new("DataTransfer")))?;
    writer.write_event(Event::Start(BytesStart::new("OrderData")))?;
    writer.write_event(Event::Text(quick_xml::events::BytesText::new(order_data_b64)))?;
    writer.write_event(Event::End(BytesEnd::new("OrderData")))?;
    writer.write_event(Event::End(BytesEnd::new("DataTransfer")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;

    writer.write_event(Event::End(BytesEnd::new("ebicsUnsecuredRequest")))?;

    envelope::finish(writer)
}

/// Upload the signing public key via INI.
pub async fn send_ini(transport: &EbicsTransport, subscriber: &EbicsSubscriber) -> Result<()> {
    let pub_key = subscriber.keys.signing_private_key.to_public_key();
    let order_data_xml = signature_pub_key_order_data(subscriber, &pub_key)?;
    let order_data_b64 =
        nexus_crypto::encoding::encode(&nexus_crypto::compress::deflate(order_data_xml.as_bytes())?);

    let request = build_unsecured_envelope(subscriber, OrderType::Ini, &order_data_b64)?;
    let response = transport.post(&subscriber.url, request).await?;
    let fields = envelope::parse_response(&response)?;
    check_success(&fields)
}

fn signature_pub_key_order_data(
    subscriber: &EbicsSubscriber,
    pub_key: &RsaPublicKey,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("SignaturePubKeyOrderData")))?;
    writer.write_event(Event::Start(BytesStart::new("SignaturePubKeyInfo")))?;
    writer.write_event(Event::Start(BytesStart::new("PubKeyValue")))?;
    rsa_key_value_xml(&mut writer, pub_key)?;
    envelope::write_element(&mut writer, "TimeStamp", &Utc::now().to_rfc3339())?;
    writer.write_event(Event::End(BytesEnd::new("PubKeyValue")))?;
    envelope::write_element(&mut writer, "SignatureVersion", "A006")?;
    writer.write_event(Event::End(BytesEnd::new("SignaturePubKeyInfo")))?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    writer.write_event(Event::End(BytesEnd::new("SignaturePubKeyOrderData")))?;
    envelope::finish(writer)
}

/// Upload the authentication and encryption public keys via HIA.
pub async fn send_hia(transport: &EbicsTransport, subscriber: &EbicsSubscriber) -> Result<()> {
    let auth_pub = subscriber.keys.authentication_private_key.to_public_key();
    let enc_pub = subscriber.keys.encryption_private_key.to_public_key();
    let order_data_xml = hia_order_data(subscriber, &auth_pub, &enc_pub)?;
    let order_data_b64 =
        nexus_crypto::encoding::encode(&nexus_crypto::compress::deflate(order_data_xml.as_bytes())?);

    let request = build_unsecured_envelope(subscriber, OrderType::Hia, &order_data_b64)?;
    let response = transport.post(&subscriber.url, request).await?;
    let fields = envelope::parse_response(&response)?;
    check_success(&fields)
}

fn hia_order_data(
    subscriber: &EbicsSubscriber,
    auth_pub: &RsaPublicKey,
    enc_pub: &RsaPublicKey,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("HIARequestOrderData")))?;

    writer.write_event(Event::Start(BytesStart::new("AuthenticationPubKeyInfo")))?;
    writer.write_event(Event::Start(BytesStart::new("PubKeyValue")))?;
    rsa_key_value_xml(&mut writer, auth_pub)?;
    envelope::write_element(&mut writer, "TimeStamp", &Utc::now().to_rfc3339())?;
    writer.write_event(Event::End(BytesEnd::new("PubKeyValue")))?;
    envelope::write_element(&mut writer, "AuthenticationVersion", "X002")?;
    writer.write_event(Event::End(BytesEnd::new("AuthenticationPubKeyInfo")))?;

    writer.write_event(Event::Start(BytesStart::new("EncryptionPubKeyInfo")))?;
    writer.write_event(Event::Start(BytesStart::new("PubKeyValue")))?;
    rsa_key_value_xml(&mut writer, enc_pub)?;
    envelope::write_element(&mut writer, "TimeStamp", &Utc::now().to_rfc3339())?;
    writer.write_event(Event::End(BytesEnd::new("PubKeyValue")))?;
    envelope::write_element(&mut writer, "EncryptionVersion", "E002")?;
    writer.write_event(Event::End(BytesEnd::new("EncryptionPubKeyInfo")))?;

    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    writer.write_event(Event::End(BytesEnd::new("HIARequestOrderData")))?;
    envelope::finish(writer)
}

/// The bank's two public keys, downloaded via HPB.
pub struct BankKeys {
    /// The bank's authentication (X002) public key.
    pub authentication: RsaPublicKey,
    /// The bank's encryption (E002) public key.
    pub encryption: RsaPublicKey,
}

/// Download the bank's public keys via HPB. The operator must confirm
/// their fingerprints out of band before the connection is marked ready —
/// this function only performs the protocol exchange.
pub async fn send_hpb(
    transport: &EbicsTransport,
    subscriber: &EbicsSubscriber,
    our_auth_priv: &RsaPrivateKey,
) -> Result<BankKeys> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ebicsNoPubKeyDigestsRequest");
    root.push_attribute(("xmlns", namespace(subscriber.dialect)));
    root.push_attribute(("Version", "H004"));
    root.push_attribute(("Revision", "1"));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("header")))?;
    let mut static_hdr = BytesStart::new("static");
    static_hdr.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(static_hdr))?;
    let nonce: [u8; 16] = rand::random();
    envelope::write_element(&mut writer, "Nonce", &hex(&nonce))?;
    envelope::write_element(&mut writer, "Timestamp", &Utc::now().to_rfc3339())?;
    envelope::write_element(&mut writer, "HostID", &subscriber.host_id)?;
    envelope::write_element(&mut writer, "PartnerID", &subscriber.partner_id)?;
    envelope::write_element(&mut writer, "UserID", &subscriber.user_id)?;
    writer.write_event(Event::Start(BytesStart::new("OrderDetails")))?;
    envelope::write_element(&mut writer, "OrderType", OrderType::Hpb.as_str())?;
    envelope::write_element(&mut writer, "OrderAttribute", "DZHNN")?;
    writer.write_event(Event::End(BytesEnd::new("OrderDetails")))?;
    writer.write_event(Event::End(BytesEnd::new("static")))?;

    let mut mutable = BytesStart::new("mutable");
    mutable.push_attribute(("authenticate", "true"));
    writer.write_event(Event::Start(mutable))?;
    envelope::write_element(&mut writer, "TransactionPhase", "Initialisation")?;
    writer.write_event(Event::End(BytesEnd::new("mutable")))?;
    writer.write_event(Event::End(BytesEnd::new("header")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("ebicsNoPubKeyDigestsRequest")))?;

    let unsigned = envelope::finish(writer)?;
    let signed = nexus_xml::signature::sign_and_embed(unsigned.as_bytes(), our_auth_priv)?;
    let request = String::from_utf8(signed).map_err(|e| Error::Framing(e.to_string()))?;

    let response = transport.post(&subscriber.url, request).await?;
    let fields = envelope::parse_response(&response)?;
    check_success(&fields)?;

    let order_data_b64 = fields
        .order_data
        .ok_or_else(|| Error::Framing("HPB response has no OrderData".into()))?;
    let enc_tx_key_b64 = fields
        .transaction_key
        .ok_or_else(|| Error::Framing("HPB response has no TransactionKey".into()))?;

    let ciphertext = nexus_crypto::encoding::decode(&order_data_b64)
        .map_err(nexus_crypto::Error::from)?;
    let enc_tx_key = nexus_crypto::encoding::decode(&enc_tx_key_b64).map_err(nexus_crypto::Error::from)?;

    let plain = nexus_crypto::cipher::decrypt_e002(&ciphertext, &enc_tx_key, &subscriber.keys.encryption_private_key)?;
    let order_data_xml = nexus_crypto::compress::inflate(&plain)?;
    let order_data_xml = String::from_utf8(order_data_xml).map_err(|e| Error::Framing(e.to_string()))?;

    parse_hpb_order_data(&order_data_xml)
}

fn parse_hpb_order_data(xml: &str) -> Result<BankKeys> {
    let pairs = scan_rsa_key_values(xml.as_bytes())?;
    if pairs.len() < 2 {
        return Err(Error::Framing(format!(
            "expected 2 RSAKeyValue blocks in HPB order data, found {}",
            pairs.len()
        )));
    }
    // HPB order data lists AuthenticationPubKeyInfo before EncryptionPubKeyInfo.
    let authentication = rsa_public_key_from_parts(&pairs[0].0, &pairs[0].1)?;
    let encryption = rsa_public_key_from_parts(&pairs[1].0, &pairs[1].1)?;
    Ok(BankKeys {
        authentication,
        encryption,
    })
}

/// Scan for `ds:RSAKeyValue` blocks, returning (modulus, exponent) byte
/// pairs in document order.
fn scan_rsa_key_values(xml: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut pairs = Vec::new();
    let mut modulus: Option<Vec<u8>> = None;
    let mut exponent: Option<Vec<u8>> = None;
    let mut current: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(start) => {
                match start.name().local_name().as_ref() {
                    b"Modulus" => current = Some("Modulus"),
                    b"Exponent" => current = Some("Exponent"),
                    _ => {}
                }
            }
            Event::Text(text) if current.is_some() => {
                let decoded = nexus_crypto::encoding::decode(
                    text.unescape().map_err(|e| Error::Framing(e.to_string()))?.trim(),
                )
                .map_err(nexus_crypto::Error::from)?;
                match current {
                    Some("Modulus") => modulus = Some(decoded),
                    Some("Exponent") => exponent = Some(decoded),
                    _ => {}
                }
            }
            Event::End(end) => {
                if end.name().local_name().as_ref() == b"RSAKeyValue" {
                    if let (Some(m), Some(e)) = (modulus.take(), exponent.take()) {
                        pairs.push((m, e));
                    }
                }
                current = None;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(pairs)
}

fn rsa_public_key_from_parts(modulus: &[u8], exponent: &[u8]) -> Result<RsaPublicKey> {
    use rsa::BigUint;
    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    RsaPublicKey::new(n, e).map_err(|err| Error::Framing(format!("invalid bank RSA key: {err}")))
}

fn check_success(fields: &envelope::ResponseFields) -> Result<()> {
    let code = fields
        .technical_return_code
        .as_deref()
        .ok_or_else(|| Error::Framing("response has no return code".into()))?;
    if code == "000000" {
        Ok(())
    } else {
        Err(Error::bank_technical(code))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_crypto::keys::generate_keypair;

    #[test]
    fn hpb_order_data_round_trips_through_rsa_key_value_xml() {
        let (_auth_priv, auth_pub) = generate_keypair(1024).unwrap();
        let (_enc_priv, enc_pub) = generate_keypair(1024).unwrap();

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Start(BytesStart::new("HPBRequestOrderData"))).unwrap();
        writer.write_event(Event::Start(BytesStart::new("AuthenticationPubKeyInfo"))).unwrap();
        rsa_key_value_xml(&mut writer, &auth_pub).unwrap();
        writer.write_event(Event::End(BytesEnd::new("AuthenticationPubKeyInfo"))).unwrap();
        writer.write_event(Event::Start(BytesStart::new("EncryptionPubKeyInfo"))).unwrap();
        rsa_key_value_xml(&mut writer, &enc_pub).unwrap();
        writer.write_event(Event::End(BytesEnd::new("EncryptionPubKeyInfo"))).unwrap();
        writer.write_event(Event::End(BytesEnd::new("HPBRequestOrderData"))).unwrap();
        let xml = envelope::finish(writer).unwrap();

        let keys = parse_hpb_order_data(&xml).unwrap();
        assert_eq!(keys.authentication, auth_pub);
        assert_eq!(keys.encryption, enc_pub);
    }

    #[test]
    fn parse_hpb_order_data_rejects_fewer_than_two_keys() {
        let (_priv, pub_key) = generate_keypair(1024).unwrap();
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        rsa_key_value_xml(&mut writer, &pub_key).unwrap();
        let xml = envelope::finish(writer).unwrap();
        assert!(parse_hpb_order_data(&xml).is_err());
    }

    #[test]
    fn check_success_accepts_only_000000() {
        let mut ok = envelope::ResponseFields::default();
        ok.technical_return_code = Some("000000".to_string());
        assert!(check_success(&ok).is_ok());

        let mut bad = envelope::ResponseFields::default();
        bad.technical_return_code = Some("091002".to_string());
        assert!(check_success(&bad).is_err());

        assert!(check_success(&envelope::ResponseFields::default()).is_err());
    }
}
