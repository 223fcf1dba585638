//! Digest normalization rules shared by signing and canonicalization

use sha2::{Digest, Sha256};

/// Normalize line endings per the EBICS A006 digest rule: strip CR, leave LF.
///
/// The bank may round-trip order data through systems that normalize line
/// endings; A006 defines the signed digest over the plain order data with
/// line endings collapsed to LF *before* compression, so both sides agree on
/// the bytes that were signed regardless of what the transport did to them.
pub fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == b'\r' {
            // Drop the CR; a following LF (CRLF) is emitted on the next iteration.
            i += 1;
            continue;
        }
        out.push(b);
        i += 1;
    }
    out
}

/// SHA-256 over the normalized order data, as required before A006 signing.
pub fn order_data_digest(plain_order_data: &[u8]) -> [u8; 32] {
    let normalized = normalize_line_endings(plain_order_data);
    let mut hasher = Sha256::new();
    hasher.update(&normalized);
    hasher.finalize().into()
}

/// Plain SHA-256 over arbitrary bytes (used for DER key digests and C14N).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cr_keeps_lf() {
        let input = b"line one\r\nline two\r\nline three";
        let normalized = normalize_line_endings(input);
        assert_eq!(normalized, b"line one\nline two\nline three".to_vec());
    }

    #[test]
    fn bare_lf_is_untouched() {
        let input = b"already\nunix\nstyle";
        assert_eq!(normalize_line_endings(input), input.to_vec());
    }

    #[test]
    fn digest_is_deterministic() {
        let data = b"order data payload";
        assert_eq!(order_data_digest(data), order_data_digest(data));
    }

    #[test]
    fn crlf_and_lf_inputs_digest_equal() {
        let crlf = b"Alpha\r\nBeta\r\nGamma";
        let lf = b"Alpha\nBeta\nGamma";
        assert_eq!(order_data_digest(crlf), order_data_digest(lf));
    }
}
