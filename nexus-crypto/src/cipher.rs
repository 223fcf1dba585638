//! E002 hybrid encryption: AES-128-CBC over a random per-transaction key,
//! the key itself RSA-wrapped to the bank's encryption public key.

use crate::error::{Error, Result};
use crate::keys::public_key_digest;
use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// The EBICS E002 scheme fixes the transaction key IV to all zero bytes —
/// the key itself is single-use, so a static IV does not weaken the scheme.
const ZERO_IV: [u8; 16] = [0u8; 16];

/// Output of [`encrypt_e002`]: what goes on the wire in `DataEncryptionInfo`
/// plus the AES-CBC ciphertext of the order data.
#[derive(Debug, Clone)]
pub struct E002Envelope {
    /// The random AES-128 transaction key, RSA-PKCS#1v1.5-wrapped to the
    /// bank's encryption public key.
    pub encrypted_transaction_key: Vec<u8>,
    /// SHA-256 digest of the bank encryption public key's DER encoding, so
    /// the counterparty can select which of its own keys unwraps the key.
    pub encryption_pub_key_digest: [u8; 32],
    /// AES-128-CBC(plain, key, iv=0) with PKCS#7 padding.
    pub ciphertext: Vec<u8>,
}

/// Generate a fresh random AES-128 transaction key.
///
/// Exposed separately from [`encrypt_e002`] so an upload transaction can
/// encrypt more than one payload (the `UserSignatureData` block and the
/// order data) under the *same* transaction key, wrapping it to the bank
/// exactly once, as EBICS upload requires.
pub fn generate_transaction_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// AES-128-CBC(plain, key, iv=0) with PKCS#7 padding, without touching the
/// key's RSA wrapping. Pair with [`wrap_transaction_key`].
pub fn encrypt_with_key(plain: &[u8], key: &[u8; 16]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), &ZERO_IV.into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
}

/// RSA-PKCS#1v1.5-wrap `key` to `bank_enc_pub`, the counterpart of the key
/// unwrap step inside [`decrypt_e002`].
pub fn wrap_transaction_key(key: &[u8; 16], bank_enc_pub: &RsaPublicKey) -> Result<Vec<u8>> {
    bank_enc_pub
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, key)
        .map_err(|e| Error::CryptoFailure(format!("key wrap failed: {e}")))
}

/// Encrypt `plain` order data under a freshly generated per-transaction key,
/// itself wrapped to `bank_enc_pub`.
pub fn encrypt_e002(plain: &[u8], bank_enc_pub: &RsaPublicKey) -> Result<E002Envelope> {
    let key = generate_transaction_key();
    let ciphertext = encrypt_with_key(plain, &key);
    let encrypted_transaction_key = wrap_transaction_key(&key, bank_enc_pub)?;
    let encryption_pub_key_digest = public_key_digest(bank_enc_pub)?;

    Ok(E002Envelope {
        encrypted_transaction_key,
        encryption_pub_key_digest,
        ciphertext,
    })
}

/// Decrypt an [`E002Envelope`]'s ciphertext. `our_priv` must be the private
/// key whose public digest matches `encrypted_transaction_key`'s wrapping
/// key — callers select it by comparing `encryption_pub_key_digest` against
/// [`crate::keys::public_key_digest`] of their own auth/enc key pairs before
/// calling this function; see DESIGN.md's resolution of the
/// encryption-vs-authentication-key Open Question.
pub fn decrypt_e002(
    ciphertext: &[u8],
    encrypted_transaction_key: &[u8],
    our_priv: &RsaPrivateKey,
) -> Result<Vec<u8>> {
    let key_bytes = our_priv
        .decrypt(Pkcs1v15Encrypt, encrypted_transaction_key)
        .map_err(|e| Error::CryptoFailure(format!("key unwrap failed: {e}")))?;
    if key_bytes.len() != 16 {
        return Err(Error::CryptoFailure(format!(
            "unwrapped transaction key has unexpected length {}",
            key_bytes.len()
        )));
    }
    let mut key = [0u8; 16];
    key.copy_from_slice(&key_bytes);

    Aes128CbcDec::new(&key.into(), &ZERO_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| Error::CryptoFailure(format!("bad padding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let plain = b"camt.053 payload bytes, arbitrary length here".to_vec();

        let envelope = encrypt_e002(&plain, &pub_key).unwrap();
        let recovered =
            decrypt_e002(&envelope.ciphertext, &envelope.encrypted_transaction_key, &priv_key)
                .unwrap();

        assert_eq!(recovered, plain);
    }

    #[test]
    fn digest_matches_bank_key() {
        let (_priv, pub_key) = generate_keypair(1024).unwrap();
        let envelope = encrypt_e002(b"data", &pub_key).unwrap();
        assert_eq!(
            envelope.encryption_pub_key_digest,
            public_key_digest(&pub_key).unwrap()
        );
    }

    #[test]
    fn wrong_private_key_fails_to_decrypt() {
        let (_priv1, pub1) = generate_keypair(1024).unwrap();
        let (priv2, _pub2) = generate_keypair(1024).unwrap();
        let envelope = encrypt_e002(b"secret payload", &pub1).unwrap();
        assert!(
            decrypt_e002(&envelope.ciphertext, &envelope.encrypted_transaction_key, &priv2)
                .is_err()
        );
    }

    #[test]
    fn each_call_uses_a_fresh_transaction_key() {
        let (_priv, pub_key) = generate_keypair(1024).unwrap();
        let e1 = encrypt_e002(b"same plaintext", &pub_key).unwrap();
        let e2 = encrypt_e002(b"same plaintext", &pub_key).unwrap();
        assert_ne!(e1.encrypted_transaction_key, e2.encrypted_transaction_key);
    }

    #[test]
    fn one_transaction_key_protects_two_payloads() {
        let (priv_key, pub_key) = generate_keypair(1024).unwrap();
        let key = generate_transaction_key();
        let wrapped = wrap_transaction_key(&key, &pub_key).unwrap();

        let sig_cipher = encrypt_with_key(b"UserSignatureData block", &key);
        let payload_cipher = encrypt_with_key(b"pain.001 order data", &key);

        let unwrapped = decrypt_e002(&sig_cipher, &wrapped, &priv_key).unwrap();
        assert_eq!(unwrapped, b"UserSignatureData block".to_vec());
        let unwrapped = decrypt_e002(&payload_cipher, &wrapped, &priv_key).unwrap();
        assert_eq!(unwrapped, b"pain.001 order data".to_vec());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(20))]

        /// E002 round-trip law: decrypt(encrypt(x)) == x for any order-data
        /// payload, holding the (expensive to generate) key pair fixed.
        #[test]
        fn decrypt_undoes_encrypt_for_any_payload(
            plain in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..2048)
        ) {
            let (priv_key, pub_key) = generate_keypair(1024).unwrap();
            let envelope = encrypt_e002(&plain, &pub_key).unwrap();
            let recovered =
                decrypt_e002(&envelope.ciphertext, &envelope.encrypted_transaction_key, &priv_key)
                    .unwrap();
            proptest::prop_assert_eq!(recovered, plain);
        }
    }
}
