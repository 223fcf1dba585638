//! A006 signing: RSA-PKCS#1-v1.5 over a SHA-256 digest of normalized order data

use crate::digest::order_data_digest;
use crate::error::{Error, Result};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Sign order data per the EBICS A006 scheme.
///
/// `order_data` is the *plain* (uncompressed, unencrypted) order data. The
/// digest rule (line-ending normalization, then SHA-256) is applied
/// internally so callers never need to remember the normalization step.
pub fn sign_a006(order_data: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let digest = order_data_digest(order_data);
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    private_key
        .sign(scheme, &digest)
        .map_err(|e| Error::CryptoFailure(format!("A006 signing failed: {e}")))
}

/// Verify an A006 signature produced by [`sign_a006`].
pub fn verify_a006(order_data: &[u8], signature: &[u8], public_key: &RsaPublicKey) -> Result<()> {
    let digest = order_data_digest(order_data);
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    public_key
        .verify(scheme, &digest, signature)
        .map_err(|_| Error::BadSignature)
}

/// Sign an already-computed digest (used by the XML C14N signature, which
/// hashes a canonicalized element set rather than raw order data).
pub fn sign_digest(digest: &[u8; 32], private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    private_key
        .sign(scheme, digest)
        .map_err(|e| Error::CryptoFailure(format!("signing failed: {e}")))
}

/// Verify an already-computed digest against a signature.
pub fn verify_digest(digest: &[u8; 32], signature: &[u8], public_key: &RsaPublicKey) -> Result<()> {
    let scheme = Pkcs1v15Sign::new::<Sha256>();
    public_key
        .verify(scheme, digest, signature)
        .map_err(|_| Error::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn sign_then_verify_succeeds() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let order_data = b"<Document>some pain.001 bytes</Document>";
        let sig = sign_a006(order_data, &priv_key).unwrap();
        assert!(verify_a006(order_data, &sig, &pub_key).is_ok());
    }

    #[test]
    fn tampered_order_data_fails_verification() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let order_data = b"original bytes";
        let sig = sign_a006(order_data, &priv_key).unwrap();
        assert!(verify_a006(b"tampered bytes", &sig, &pub_key).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (priv_key, _pub1) = generate_keypair(1024).unwrap();
        let (_priv2, pub2) = generate_keypair(1024).unwrap();
        let order_data = b"order data";
        let sig = sign_a006(order_data, &priv_key).unwrap();
        assert!(verify_a006(order_data, &sig, &pub2).is_err());
    }

    #[test]
    fn crlf_and_lf_order_data_produce_same_signature_validity() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let crlf = b"Alpha\r\nBeta\r\n";
        let lf = b"Alpha\nBeta\n";
        let sig = sign_a006(crlf, &priv_key).unwrap();
        // Signed over normalized digest, so the LF variant must verify too.
        assert!(verify_a006(lf, &sig, &pub_key).is_ok());
    }
}
