//! The EBICS subscriber: identity, key material, and the per-subscriber
//! serialization lock.

use crate::error::{Error, Result};
use nexus_crypto::keys::public_key_digest;
use nexus_crypto::{RsaPrivateKey, RsaPublicKey};
use nexus_iso20022::dialect::Dialect;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// State of an INI/HIA key-management upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyManagementState {
    /// Not yet sent to the bank.
    NotSent,
    /// Sent; awaiting operator confirmation or bank-side activation.
    Sent,
    /// State could not be determined (e.g. after a transport failure whose
    /// outcome on the bank side is unknown).
    Unknown,
}

/// The subscriber's three private keys plus the bank's two public keys,
/// once HPB has completed.
pub struct SubscriberKeys {
    /// Signs order data (A006).
    pub signing_private_key: RsaPrivateKey,
    /// Signs the EBICS envelope itself.
    pub authentication_private_key: RsaPrivateKey,
    /// Unwraps E002 transaction keys the bank encrypted to us.
    pub encryption_private_key: RsaPrivateKey,
    /// Verifies the bank's envelope signatures, once known via HPB.
    pub bank_authentication_public_key: Option<RsaPublicKey>,
    /// Wraps E002 transaction keys we send to the bank, once known via HPB.
    pub bank_encryption_public_key: Option<RsaPublicKey>,
}

impl SubscriberKeys {
    /// Select the private key that unwraps a `DataEncryptionInfo` whose
    /// `EncryptionPubKeyDigest` is `digest`. EBICS always encrypts download
    /// transaction keys to our own encryption key, never our authentication
    /// key — implementations that reach for `authentication_private_key`
    /// here are bugged.
    pub fn decryption_key_for_digest(&self, digest: &[u8; 32]) -> Result<&RsaPrivateKey> {
        let ours = public_key_digest(&self.encryption_private_key.to_public_key())?;
        if &ours != digest {
            return Err(Error::Framing(
                "DataEncryptionInfo digest does not match our encryption key".into(),
            ));
        }
        Ok(&self.encryption_private_key)
    }
}

/// One EBICS connection's subscriber: identity plus keys plus the
/// serialization lock that keeps at most one transaction in flight.
pub struct EbicsSubscriber {
    /// Bank's EBICS endpoint URL.
    pub url: String,
    /// `HostID`.
    pub host_id: String,
    /// `PartnerID`.
    pub partner_id: String,
    /// `UserID`.
    pub user_id: String,
    /// H004 or H005.
    pub dialect: Dialect,
    /// Key material.
    pub keys: SubscriberKeys,
    /// INI upload state.
    pub ini_state: KeyManagementState,
    /// HIA upload state.
    pub hia_state: KeyManagementState,
    lock: Mutex<()>,
    order_id_counter: AtomicU32,
}

/// Base-36 alphanumeric order ID space: 26 letters + 10 digits per
/// character over 6 characters.
const ORDER_ID_SPACE: u32 = 26 * 26 * 10 * 10 * 10 * 10;

impl EbicsSubscriber {
    /// Construct a subscriber with fresh (not-yet-confirmed) key management
    /// state.
    pub fn new(
        url: String,
        host_id: String,
        partner_id: String,
        user_id: String,
        dialect: Dialect,
        keys: SubscriberKeys,
    ) -> Self {
        EbicsSubscriber {
            url,
            host_id,
            partner_id,
            user_id,
            dialect,
            keys,
            ini_state: KeyManagementState::NotSent,
            hia_state: KeyManagementState::NotSent,
            lock: Mutex::new(()),
            order_id_counter: AtomicU32::new(0),
        }
    }

    /// Acquire the subscriber's transaction lock. The whole EBICS
    /// transaction must run while holding the returned guard: EBICS permits
    /// at most one in-flight transaction per subscriber.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Allocate the next 6-character alphanumeric order ID for an upload.
    /// Returns [`Error::OrderIdOverflow`] once the rolling counter wraps
    /// rather than silently reusing an ID.
    pub fn next_order_id(&self) -> Result<String> {
        let n = self.order_id_counter.fetch_add(1, Ordering::SeqCst);
        if n >= ORDER_ID_SPACE {
            return Err(Error::OrderIdOverflow);
        }
        Ok(encode_order_id(n))
    }
}

fn encode_order_id(mut n: u32) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut out = [b'A'; 6];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8(out.to_vec()).expect("alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_increment_distinctly() {
        let a = encode_order_id(0);
        let b = encode_order_id(1);
        assert_ne!(a, b);
    }

    #[test]
    fn order_id_overflow_is_detected() {
        let counter = AtomicU32::new(ORDER_ID_SPACE);
        let n = counter.fetch_add(1, Ordering::SeqCst);
        assert!(n >= ORDER_ID_SPACE);
    }
}
