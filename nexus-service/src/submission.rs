//! `PaymentInitiation` → pain.001 → EBICS upload (spec.md §4.4): one
//! initiation per upload transaction, no batching in this version.

use crate::ebics_runtime::load_runtime_subscriber;
use crate::error::{AppError, ServiceError};
use crate::state::AppState;
use chrono::Utc;
use nexus_ebics::order::{Btf, OrderType};
use nexus_ebics::transaction::{self, OrderSelector};
use nexus_iso20022::pain001::{self, GeneratedIdentifiers, Party, PaymentInitiationData};
use nexus_ledger::types::{BankAccount, BankConnection, PaymentInitiation};

/// Build and upload the pain.001 document for one prepared initiation.
/// Leaves `submitted=false` on any failure so the caller (or the next
/// scheduler tick) can retry.
pub async fn submit_one(state: &AppState, initiation: &PaymentInitiation) -> Result<(), ServiceError> {
    let account = state
        .db
        .list_accounts()
        .await?
        .into_iter()
        .find(|a| a.id == initiation.bank_account_id)
        .ok_or_else(|| AppError::not_found(format!("bank account {}", initiation.bank_account_id)))?;

    let connection_id = account
        .default_connection_id
        .ok_or_else(|| AppError::bad_request("bank account has no default connection"))?;
    let connection: BankConnection = state.db.get_connection_by_id(connection_id).await?;
    let stored_subscriber = state.db.get_subscriber(connection.id).await?;
    let runtime_subscriber = load_runtime_subscriber(&stored_subscriber, &connection.dialect)?;

    // `pain_counter` only matters for identifier derivation, and these
    // identifiers were already fixed at creation time (see
    // `create_initiation`) — reuse them verbatim via `build_with_identifiers`
    // rather than re-deriving a (necessarily different) counter here.
    let data = PaymentInitiationData {
        bank_account_id: account.id,
        debtor: Party { iban: account.iban.clone(), bic: Some(account.bank_code.clone()), name: account.holder_name.clone() },
        creditor: Party {
            iban: initiation.creditor_iban.clone(),
            bic: initiation.creditor_bic.clone(),
            name: initiation.creditor_name.clone(),
        },
        amount: initiation.amount,
        currency: initiation.currency.clone(),
        subject: initiation.subject.clone(),
        requested_execution_date: Utc::now().date_naive(),
        pain_counter: 0,
        prepared_at: initiation.prepared_at,
    };
    let ids = GeneratedIdentifiers {
        end_to_end_id: initiation.end_to_end_id.clone(),
        message_id: initiation.message_id.clone(),
        payment_information_id: initiation.payment_information_id.clone(),
        instruction_id: initiation.instruction_id.clone(),
    };

    let xml = pain001::build_with_identifiers(runtime_subscriber.dialect, &data, &ids)
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let _guard = runtime_subscriber.lock().await;
    let selector = match runtime_subscriber.dialect {
        nexus_iso20022::dialect::Dialect::H004 => OrderSelector::OrderType(OrderType::Cct),
        nexus_iso20022::dialect::Dialect::H005 => OrderSelector::Btf(Btf::pain001()),
    };

    match transaction::run_upload(&state.transport, &runtime_subscriber, selector, xml.as_bytes()).await {
        Ok(_result) => {
            state.db.mark_initiation_submitted(initiation.id).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Build, validate (amount precision), and persist one `PaymentInitiation`
/// against `account`, idempotent on `(account, uid)`.
#[allow(clippy::too_many_arguments)]
pub async fn create_initiation(
    state: &AppState,
    account: &BankAccount,
    uid: Option<&str>,
    amount: rust_decimal::Decimal,
    currency: &str,
    subject: &str,
    creditor_iban: &str,
    creditor_bic: Option<&str>,
    creditor_name: &str,
) -> Result<PaymentInitiation, ServiceError> {
    pain001::validate_amount_precision(amount)
        .map_err(|e| AppError::bad_request(format!("amount precision: {e}")))?;

    let mut tx = state.db.begin().await?;
    let pain_counter = state.db.next_pain001_counter_tx(&mut tx, account.id).await?;
    let prepared_at = state.clock.now();

    // Reuse pain001's own identifier template rather than re-deriving it by
    // hand. These ids are persisted and final; `submit_one` renders the
    // document from them directly instead of regenerating a new quadruple.
    let data = PaymentInitiationData {
        bank_account_id: account.id,
        debtor: Party { iban: account.iban.clone(), bic: Some(account.bank_code.clone()), name: account.holder_name.clone() },
        creditor: Party { iban: creditor_iban.to_string(), bic: creditor_bic.map(str::to_string), name: creditor_name.to_string() },
        amount,
        currency: currency.to_string(),
        subject: subject.to_string(),
        requested_execution_date: prepared_at.date_naive(),
        pain_counter,
        prepared_at,
    };
    let ids = pain001::generate_identifiers(&data);

    let initiation = state
        .db
        .create_initiation_tx(
            &mut tx,
            account.id,
            uid,
            amount,
            currency,
            &ids.end_to_end_id,
            &ids.message_id,
            &ids.payment_information_id,
            &ids.instruction_id,
            subject,
            creditor_iban,
            creditor_bic,
            creditor_name,
        )
        .await?;
    tx.commit().await?;

    // Idempotency of initiation creation (spec.md §4.4/§9, Scenario F): the
    // store returns whatever row already exists for (bank_account, uid) on a
    // duplicate `uid`, which is only a legitimate replay if every other
    // client-supplied field matches. A fresh insert trivially passes this
    // check since the returned row is exactly what was just submitted.
    if uid.is_some()
        && (initiation.amount != amount
            || initiation.currency != currency
            || initiation.subject != subject
            || initiation.creditor_iban != creditor_iban
            || initiation.creditor_bic.as_deref() != creditor_bic
            || initiation.creditor_name != creditor_name)
    {
        return Err(AppError::conflict(format!(
            "payment initiation with uid {:?} already exists with different fields",
            uid.unwrap()
        ))
        .into());
    }

    Ok(initiation)
}

/// Submit every `submitted=false, invalid=false` initiation for `account`,
/// one upload transaction at a time. A single failure is logged and does
/// not stop the rest (spec.md §4.4/§7).
pub async fn submit_all_pending(state: &AppState, account_id: uuid::Uuid) -> Result<(), ServiceError> {
    let pending = state.db.list_pending_initiations(account_id).await?;
    for initiation in pending {
        if let Err(e) = submit_one(state, &initiation).await {
            tracing::warn!(initiation_id = %initiation.id, error = ?e, "submission failed, left unsubmitted for retry");
        }
    }
    Ok(())
}
