//! Connection lifecycle: key generation, the INI/HIA/HPB handshake, and
//! HTD-driven account discovery/import (spec.md §4.2/§6.3's
//! `bank-connections` endpoints).

use crate::ebics_runtime::load_runtime_subscriber;
use crate::error::{AppError, ServiceError};
use crate::state::AppState;
use nexus_crypto::keys;
use nexus_ebics::accountinfo;
use nexus_ebics::keymgmt;
use nexus_ebics::order::OrderType;
use nexus_ebics::transaction::{self, OrderSelector};
use nexus_ledger::types::{BankAccount, BankConnection, OfferedBankAccount};

/// Generate a fresh signing/authentication/encryption keypair and persist a
/// new `BankConnection` + `EbicsSubscriber` under `name`.
#[allow(clippy::too_many_arguments)]
pub async fn create_connection(
    state: &AppState,
    name: &str,
    dialect: &str,
    owner: &str,
    url: &str,
    host_id: &str,
    partner_id: &str,
    user_id: &str,
) -> Result<BankConnection, ServiceError> {
    let (signing_priv, _) = keys::generate_keypair(2048)?;
    let (auth_priv, _) = keys::generate_keypair(2048)?;
    let (enc_priv, _) = keys::generate_keypair(2048)?;

    let (connection, _subscriber) = state
        .db
        .create_ebics_connection(
            name,
            dialect,
            owner,
            url,
            host_id,
            partner_id,
            user_id,
            &keys::private_key_to_der(&signing_priv)?,
            &keys::private_key_to_der(&auth_priv)?,
            &keys::private_key_to_der(&enc_priv)?,
        )
        .await?;
    Ok(connection)
}

/// Run INI, then HIA, then HPB against `connection`'s bank, updating key
/// management state as each step succeeds. Steps already marked `Sent` are
/// skipped, so this is safe to call again after a partial failure.
pub async fn connect(state: &AppState, connection: &BankConnection) -> Result<(), ServiceError> {
    let stored_subscriber = state.db.get_subscriber(connection.id).await?;
    let runtime_subscriber = load_runtime_subscriber(&stored_subscriber, &connection.dialect)?;

    if stored_subscriber.ini_state != nexus_ledger::types::KeyManagementState::Sent {
        keymgmt::send_ini(&state.transport, &runtime_subscriber).await?;
        state.db.mark_ini_sent(connection.id).await?;
    }

    if stored_subscriber.hia_state != nexus_ledger::types::KeyManagementState::Sent {
        keymgmt::send_hia(&state.transport, &runtime_subscriber).await?;
        state.db.mark_hia_sent(connection.id).await?;
    }

    let bank_keys = keymgmt::send_hpb(
        &state.transport,
        &runtime_subscriber,
        &runtime_subscriber.keys.authentication_private_key,
    )
    .await?;

    state
        .db
        .set_bank_keys(
            connection.id,
            &keys::public_key_to_der(&bank_keys.authentication)?,
            &keys::public_key_to_der(&bank_keys.encryption)?,
        )
        .await?;

    Ok(())
}

/// Download the subscriber's authorized accounts via HTD and refresh the
/// connection's `OfferedBankAccount` rows.
pub async fn fetch_accounts(state: &AppState, connection: &BankConnection) -> Result<Vec<OfferedBankAccount>, ServiceError> {
    let stored_subscriber = state.db.get_subscriber(connection.id).await?;
    let runtime_subscriber = load_runtime_subscriber(&stored_subscriber, &connection.dialect)?;

    let _guard = runtime_subscriber.lock().await;
    let result = transaction::run_download(
        &state.transport,
        &runtime_subscriber,
        OrderSelector::OrderType(OrderType::Htd),
        None,
    )
    .await?;

    if result.no_data_available {
        return Ok(Vec::new());
    }

    let xml = String::from_utf8(result.order_data)
        .map_err(|e| anyhow::anyhow!("HTD order data is not valid UTF-8: {e}"))?;
    let offered = accountinfo::parse(&xml)?;

    let mut rows = Vec::with_capacity(offered.len());
    for account in offered {
        rows.push(
            state
                .db
                .upsert_offered_account(connection.id, &account.remote_account_id, &account.iban, &account.bank_code, &account.holder_name)
                .await?,
        );
    }
    Ok(rows)
}

/// Bind one offered account to a new `BankAccount` under `label`, defaulting
/// its connection to the one it was offered on.
pub async fn import_account(
    state: &AppState,
    connection: &BankConnection,
    offered: &OfferedBankAccount,
    label: &str,
) -> Result<BankAccount, ServiceError> {
    if offered.imported_account_id.is_some() {
        return Err(AppError::conflict(format!("offered account {} already imported", offered.id)).into());
    }

    let account = state
        .db
        .create_account(label, &offered.holder_name, &offered.iban, &offered.bank_code, Some(connection.id))
        .await?;
    state.db.mark_offered_account_imported(offered.id, account.id).await?;
    Ok(account)
}
