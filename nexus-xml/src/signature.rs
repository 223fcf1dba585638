//! Embedding and verifying the `AuthSignature` block of an EBICS envelope.
//!
//! EBICS does not use full XML-DSig: the `AuthSignature` element carries a
//! single `ds:SignatureValue` child holding the base64 A006 signature over
//! the SHA-256 digest of the canonicalized `authenticate="true"` elements.
//! There is no `ds:Reference`/`ds:SignedInfo` machinery to parse — the set
//! of signed elements is fixed by the schema, not declared in the document.

use crate::canonical::canonicalize_authenticated;
use crate::error::{Error, Result};
use nexus_crypto::digest::sha256;
use nexus_crypto::signature::{sign_digest, verify_digest};
use nexus_crypto::{RsaPrivateKey, RsaPublicKey};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Sign `xml` (an `ebicsRequest`/`ebicsResponse` document with no
/// `AuthSignature` element yet) and append the `AuthSignature` block as the
/// last child of the document's root element.
pub fn sign_and_embed(xml: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let canonical = canonicalize_authenticated(xml)?;
    let digest = sha256(&canonical);
    let signature = sign_digest(&digest, private_key)?;
    let block = build_auth_signature_block(&signature);
    Ok(insert_before_root_close(xml, &block))
}

/// Verify the `AuthSignature/ds:SignatureValue` embedded in `xml` against
/// the canonicalized `authenticate="true"` elements, using `public_key`.
pub fn verify_envelope(xml: &[u8], public_key: &RsaPublicKey) -> Result<()> {
    let signature_b64 = extract_element_text(xml, b"SignatureValue")?;
    let signature = nexus_crypto::encoding::decode(signature_b64.trim())
        .map_err(|e| Error::BadSignatureBlock(e.to_string()))?;

    let canonical = canonicalize_authenticated(xml)?;
    let digest = sha256(&canonical);
    verify_digest(&digest, &signature, public_key)?;
    Ok(())
}

fn build_auth_signature_block(signature: &[u8]) -> Vec<u8> {
    let b64 = nexus_crypto::encoding::encode(signature);
    format!("<AuthSignature><ds:SignatureValue>{b64}</ds:SignatureValue></AuthSignature>")
        .into_bytes()
}

/// Insert `block` immediately before the closing tag of the document's root
/// element, which is always the last `</...>` in a well-formed EBICS
/// envelope (there is no trailing content after the root closes).
fn insert_before_root_close(xml: &[u8], block: &[u8]) -> Vec<u8> {
    let pos = xml
        .windows(2)
        .rposition(|w| w == b"</")
        .unwrap_or(xml.len());
    let mut out = Vec::with_capacity(xml.len() + block.len());
    out.extend_from_slice(&xml[..pos]);
    out.extend_from_slice(block);
    out.extend_from_slice(&xml[pos..]);
    out
}

fn extract_element_text(xml: &[u8], local_name: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut inside = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(start) => {
                if start.name().local_name().as_ref() == local_name {
                    inside = true;
                }
            }
            Event::Text(text) if inside => {
                let unescaped = text.unescape().map_err(|e| Error::Malformed(e.to_string()))?;
                return Ok(unescaped.into_owned());
            }
            Event::End(end) => {
                if end.name().local_name().as_ref() == local_name {
                    inside = false;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Err(Error::BadSignatureBlock(format!(
        "no <{}> element found",
        String::from_utf8_lossy(local_name)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_crypto::keys::generate_keypair;

    fn sample_envelope() -> Vec<u8> {
        br#"<ebicsRequest Version="H004"><header authenticate="true"><static><HostID>NEXUS</HostID></static></header><body authenticate="true"><DataTransfer><OrderData>ZGF0YQ==</OrderData></DataTransfer></body></ebicsRequest>"#.to_vec()
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let signed = sign_and_embed(&sample_envelope(), &priv_key).unwrap();
        assert!(verify_envelope(&signed, &pub_key).is_ok());
    }

    #[test]
    fn signature_is_appended_inside_root_element() {
        let (priv_key, _pub_key) = generate_keypair(1024).unwrap();
        let signed = sign_and_embed(&sample_envelope(), &priv_key).unwrap();
        let s = String::from_utf8(signed).unwrap();
        assert!(s.contains("<AuthSignature>"));
        assert!(s.ends_with("</ebicsRequest>"));
        assert!(s.find("<AuthSignature>").unwrap() < s.find("</ebicsRequest>").unwrap());
    }

    #[test]
    fn tampered_header_fails_verification() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let signed = sign_and_embed(&sample_envelope(), &priv_key).unwrap();
        let tampered = String::from_utf8(signed)
            .unwrap()
            .replace("NEXUS", "OTHER");
        assert!(verify_envelope(tampered.as_bytes(), &pub_key).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (priv_key, _pub1) = generate_keypair(1024).unwrap();
        let (_priv2, pub2) = generate_keypair(1024).unwrap();
        let signed = sign_and_embed(&sample_envelope(), &priv_key).unwrap();
        assert!(verify_envelope(&signed, &pub2).is_err());
    }

    #[test]
    fn missing_signature_value_is_rejected() {
        let (_priv_key, pub_key) = generate_keypair(1024).unwrap();
        assert!(verify_envelope(&sample_envelope(), &pub_key).is_err());
    }
}
