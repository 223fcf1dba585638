//! RSA key load/store for the three EBICS subscriber keys (sign, auth, enc)
//!
//! Keys are handled as PKCS#8 DER on the wire between this crate and its
//! callers; `nexus-ledger` is responsible for whatever at-rest encryption a
//! deployment wants (see DESIGN.md — Nexus does not mandate a specific
//! secrets backend, it only requires DER in and DER out).

use crate::error::{Error, Result};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Default RSA modulus size for newly generated EBICS subscriber keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Generate a fresh RSA key pair suitable for any of the three subscriber
/// roles (signing, authentication, encryption — EBICS does not constrain the
/// key size differently per role).
pub fn generate_keypair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| Error::CryptoFailure(format!("key generation failed: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

/// Serialize a private key to PKCS#8 DER for storage.
pub fn private_key_to_der(key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let doc = key.to_pkcs8_der().map_err(|e| Error::InvalidKey(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

/// Parse a private key from PKCS#8 DER.
pub fn private_key_from_der(der: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Serialize a public key to SubjectPublicKeyInfo DER for storage or for
/// transmission to the bank during INI/HIA.
pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    let doc = key.to_public_key_der().map_err(|e| Error::InvalidKey(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

/// Parse a public key from SubjectPublicKeyInfo DER.
pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// SHA-256 digest of a public key's DER encoding, used to match
/// `DataEncryptionInfo.EncryptionPubKeyDigest` / the auth key digest in an
/// EBICS request header against a locally held key.
pub fn public_key_digest(key: &RsaPublicKey) -> Result<[u8; 32]> {
    let der = public_key_to_der(key)?;
    let mut hasher = Sha256::new();
    hasher.update(&der);
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_private_key_der() {
        let (priv_key, _pub_key) = generate_keypair(1024).unwrap();
        let der = private_key_to_der(&priv_key).unwrap();
        let parsed = private_key_from_der(&der).unwrap();
        assert_eq!(priv_key.to_public_key(), parsed.to_public_key());
    }

    #[test]
    fn roundtrip_public_key_der() {
        let (_priv_key, pub_key) = generate_keypair(1024).unwrap();
        let der = public_key_to_der(&pub_key).unwrap();
        let parsed = public_key_from_der(&der).unwrap();
        assert_eq!(pub_key, parsed);
    }

    #[test]
    fn digest_is_stable_for_same_key() {
        let (_priv_key, pub_key) = generate_keypair(1024).unwrap();
        let d1 = public_key_digest(&pub_key).unwrap();
        let d2 = public_key_digest(&pub_key).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn digest_differs_across_keys() {
        let (_p1, k1) = generate_keypair(1024).unwrap();
        let (_p2, k2) = generate_keypair(1024).unwrap();
        assert_ne!(public_key_digest(&k1).unwrap(), public_key_digest(&k2).unwrap());
    }
}
