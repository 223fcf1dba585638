//! `bank-accounts` endpoints (spec.md §6.3): payment initiation creation and
//! submission, transaction fetch and long-polled listing, and scheduling.

use crate::auth::Principal;
use crate::error::{AppError, ServiceError};
use crate::ingestion::{self, FetchParams};
use crate::state::AppState;
use crate::submission;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use nexus_ledger::types::{BankTransactionEntry, PaymentInitiation, TaskType};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// `Router` for every `/bank-accounts/*` route.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bank-accounts/:a/payment-initiations", post(create_initiation))
        .route("/bank-accounts/:a/payment-initiations/:uuid/submit", post(submit_initiation))
        .route("/bank-accounts/:a/submit-all-payment-initiations", post(submit_all))
        .route("/bank-accounts/:a/fetch-transactions", post(fetch_transactions))
        .route("/bank-accounts/:a/transactions", get(list_transactions))
        .route("/bank-accounts/:a/schedule", post(schedule_task))
}

async fn account_by_label(state: &AppState, label: &str) -> Result<nexus_ledger::types::BankAccount, ServiceError> {
    Ok(state.db.get_account_by_label(label).await?)
}

#[derive(Debug, Deserialize)]
struct CreateInitiationBody {
    iban: String,
    bic: Option<String>,
    name: String,
    amount: Decimal,
    currency: Option<String>,
    subject: String,
    uid: Option<String>,
}

async fn create_initiation(
    State(state): State<AppState>,
    _principal: Principal,
    Path(label): Path<String>,
    Json(body): Json<CreateInitiationBody>,
) -> Result<Json<PaymentInitiation>, ServiceError> {
    let account = account_by_label(&state, &label).await?;
    let currency = body.currency.unwrap_or_else(|| "EUR".to_string());

    let initiation = submission::create_initiation(
        &state,
        &account,
        body.uid.as_deref(),
        body.amount,
        &currency,
        &body.subject,
        &body.iban,
        body.bic.as_deref(),
        &body.name,
    )
    .await?;
    Ok(Json(initiation))
}

async fn submit_initiation(
    State(state): State<AppState>,
    principal: Principal,
    Path((label, id)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    principal.require_superuser()?;
    let account = account_by_label(&state, &label).await?;
    let pending = state.db.list_pending_initiations(account.id).await?;
    let initiation =
        pending.into_iter().find(|i| i.id == id).ok_or_else(|| AppError::not_found(format!("payment initiation {id}")))?;

    submission::submit_one(&state, &initiation).await?;
    Ok(Json(serde_json::json!({"submitted": true})))
}

async fn submit_all(
    State(state): State<AppState>,
    principal: Principal,
    Path(label): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    principal.require_superuser()?;
    let account = account_by_label(&state, &label).await?;
    submission::submit_all_pending(&state, account.id).await?;
    Ok(Json(serde_json::json!({"submitted": true})))
}

async fn fetch_transactions(
    State(state): State<AppState>,
    principal: Principal,
    Path(label): Path<String>,
    Json(params): Json<FetchParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    principal.require_superuser()?;
    let account = account_by_label(&state, &label).await?;
    let outcome = ingestion::fetch_transactions(&state, &account, &params).await?;
    Ok(Json(serde_json::json!({"newTransactions": outcome.new_transactions})))
}

#[derive(Debug, Deserialize)]
struct ListTransactionsQuery {
    /// Exclusive lower bound on `BankTransactionEntry.id`; only entries
    /// newer than this are returned.
    #[serde(default)]
    after: i64,
    /// How long to long-poll for a new entry before returning an empty
    /// list, in seconds. Capped at 60.
    #[serde(default = "default_long_poll_seconds")]
    long_poll_seconds: u64,
}

fn default_long_poll_seconds() -> u64 {
    0
}

/// List entries newer than `after`, optionally blocking up to
/// `long_poll_seconds` until one appears (spec.md §9's long-polling design
/// note), backed by a per-account [`crate::notify::AccountNotifiers`].
async fn list_transactions(
    State(state): State<AppState>,
    _principal: Principal,
    Path(label): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<BankTransactionEntry>>, ServiceError> {
    let account = account_by_label(&state, &label).await?;
    let wait = Duration::from_secs(query.long_poll_seconds.min(60));

    // Register interest before re-checking, so an insert racing with this
    // request's first read still wakes the `notified()` wait below instead
    // of being missed between the check and the subscribe.
    let notify = state.notifiers.get(account.id);
    let notified = notify.notified();

    let entries = state.db.list_entries_since(account.id, query.after).await?;
    if !entries.is_empty() || wait.is_zero() {
        return Ok(Json(entries));
    }

    let _ = tokio::time::timeout(wait, notified).await;
    let entries = state.db.list_entries_since(account.id, query.after).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    name: String,
    cronspec: String,
    #[serde(rename = "type")]
    task_type: ScheduleTaskType,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScheduleTaskType {
    Fetch,
    Submit,
}

impl From<ScheduleTaskType> for TaskType {
    fn from(t: ScheduleTaskType) -> Self {
        match t {
            ScheduleTaskType::Fetch => TaskType::Fetch,
            ScheduleTaskType::Submit => TaskType::Submit,
        }
    }
}

async fn schedule_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(label): Path<String>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    principal.require_superuser()?;
    let account = account_by_label(&state, &label).await?;

    let spec = nexus_scheduler::CronSpec::parse(&body.cronspec)
        .map_err(|e| AppError::bad_request(format!("invalid cronspec: {e}")))?;
    let next = spec.next_after(state.clock.now());

    let task = state
        .db
        .upsert_task(
            "bank-account",
            account.id,
            &body.name,
            body.task_type.into(),
            &body.cronspec,
            body.params,
            next.timestamp(),
        )
        .await?;

    Ok(Json(serde_json::json!({"taskId": task.id})))
}
