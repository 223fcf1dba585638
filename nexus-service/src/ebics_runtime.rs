//! Bridges the persisted [`nexus_ledger::types::EbicsSubscriber`] row to the
//! runtime [`nexus_ebics::subscriber::EbicsSubscriber`] the protocol engine
//! operates on.
//!
//! Key material is stored as PKCS#8 DER exactly as `nexus-crypto` produces
//! it; at-rest encryption of the three private-key columns is left to the
//! deployment (see DESIGN.md) rather than handled here.

use crate::error::ServiceError;
use nexus_crypto::keys;
use nexus_ebics::subscriber::{EbicsSubscriber as RuntimeSubscriber, KeyManagementState as RuntimeKeyState, SubscriberKeys};
use nexus_iso20022::dialect::Dialect;
use nexus_ledger::types::{EbicsSubscriber as StoredSubscriber, KeyManagementState as StoredKeyState};

fn map_state(state: StoredKeyState) -> RuntimeKeyState {
    match state {
        StoredKeyState::NotSent => RuntimeKeyState::NotSent,
        StoredKeyState::Sent => RuntimeKeyState::Sent,
        StoredKeyState::Unknown => RuntimeKeyState::Unknown,
    }
}

fn parse_dialect(tag: &str) -> Dialect {
    if tag.eq_ignore_ascii_case("H005") {
        Dialect::H005
    } else {
        Dialect::H004
    }
}

/// Build a runtime subscriber (with its fresh transaction lock and order-id
/// counter) out of a persisted row and its connection's dialect tag.
pub fn load_runtime_subscriber(
    stored: &StoredSubscriber,
    dialect_tag: &str,
) -> Result<RuntimeSubscriber, ServiceError> {
    let signing_private_key = keys::private_key_from_der(&stored.signing_private_key_der)?;
    let authentication_private_key = keys::private_key_from_der(&stored.authentication_private_key_der)?;
    let encryption_private_key = keys::private_key_from_der(&stored.encryption_private_key_der)?;

    let bank_authentication_public_key = stored
        .bank_authentication_public_key_der
        .as_deref()
        .map(keys::public_key_from_der)
        .transpose()?;
    let bank_encryption_public_key = stored
        .bank_encryption_public_key_der
        .as_deref()
        .map(keys::public_key_from_der)
        .transpose()?;

    let subscriber_keys = SubscriberKeys {
        signing_private_key,
        authentication_private_key,
        encryption_private_key,
        bank_authentication_public_key,
        bank_encryption_public_key,
    };

    let mut runtime = RuntimeSubscriber::new(
        stored.url.clone(),
        stored.host_id.clone(),
        stored.partner_id.clone(),
        stored.user_id.clone(),
        parse_dialect(dialect_tag),
        subscriber_keys,
    );
    runtime.ini_state = map_state(stored.ini_state);
    runtime.hia_state = map_state(stored.hia_state);
    Ok(runtime)
}

impl From<nexus_crypto::Error> for ServiceError {
    fn from(e: nexus_crypto::Error) -> Self {
        ServiceError::Internal(e.into())
    }
}
