//! `bank-connections` endpoints (spec.md §6.3): create, connect, discover,
//! and import offered accounts. Every one of these is superuser-only.

use crate::auth::Principal;
use crate::error::{AppError, ServiceError};
use crate::keymanagement;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use nexus_ledger::types::BankAccount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `Router` for every `/bank-connections/*` route.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bank-connections", post(create_connection))
        .route("/bank-connections/:n/connect", post(connect))
        .route("/bank-connections/:n/fetch-accounts", post(fetch_accounts))
        .route("/bank-connections/:n/import-account", post(import_account))
}

#[derive(Debug, Deserialize)]
struct CreateConnectionBody {
    name: String,
    #[serde(rename = "type")]
    connection_type: String,
    data: CreateConnectionData,
}

#[derive(Debug, Deserialize)]
struct CreateConnectionData {
    #[serde(rename = "ebicsURL")]
    ebics_url: String,
    #[serde(rename = "hostID")]
    host_id: String,
    #[serde(rename = "partnerID")]
    partner_id: String,
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(default = "default_dialect")]
    dialect: String,
}

fn default_dialect() -> String {
    "H004".to_string()
}

#[derive(Debug, Serialize)]
struct ConnectionView {
    id: Uuid,
    name: String,
    dialect: String,
}

async fn create_connection(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateConnectionBody>,
) -> Result<Json<ConnectionView>, ServiceError> {
    principal.require_superuser()?;
    if body.connection_type != "ebics" {
        return Err(AppError::bad_request(format!("unsupported connection type '{}'", body.connection_type)).into());
    }

    let connection = keymanagement::create_connection(
        &state,
        &body.name,
        &body.data.dialect,
        &principal.username,
        &body.data.ebics_url,
        &body.data.host_id,
        &body.data.partner_id,
        &body.data.user_id,
    )
    .await?;

    Ok(Json(ConnectionView { id: connection.id, name: connection.name, dialect: connection.dialect }))
}

async fn connect(
    State(state): State<AppState>,
    principal: Principal,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    principal.require_superuser()?;
    let connection = state.db.get_connection_by_name(&name).await?;
    keymanagement::connect(&state, &connection).await?;
    Ok(Json(serde_json::json!({"connected": true})))
}

#[derive(Debug, Serialize)]
struct OfferedAccountView {
    #[serde(rename = "offeredAccountId")]
    offered_account_id: Uuid,
    iban: String,
    #[serde(rename = "bankCode")]
    bank_code: String,
    #[serde(rename = "holderName")]
    holder_name: String,
    imported: bool,
}

async fn fetch_accounts(
    State(state): State<AppState>,
    principal: Principal,
    Path(name): Path<String>,
) -> Result<Json<Vec<OfferedAccountView>>, ServiceError> {
    principal.require_superuser()?;
    let connection = state.db.get_connection_by_name(&name).await?;
    let offered = keymanagement::fetch_accounts(&state, &connection).await?;

    Ok(Json(
        offered
            .into_iter()
            .map(|o| OfferedAccountView {
                offered_account_id: o.id,
                iban: o.iban,
                bank_code: o.bank_code,
                holder_name: o.holder_name,
                imported: o.imported_account_id.is_some(),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct ImportAccountBody {
    #[serde(rename = "offeredAccountId")]
    offered_account_id: Uuid,
    #[serde(rename = "nexusBankAccountId")]
    nexus_bank_account_id: String,
}

async fn import_account(
    State(state): State<AppState>,
    principal: Principal,
    Path(name): Path<String>,
    Json(body): Json<ImportAccountBody>,
) -> Result<Json<BankAccount>, ServiceError> {
    principal.require_superuser()?;
    let connection = state.db.get_connection_by_name(&name).await?;
    let offered = state
        .db
        .list_offered_accounts(connection.id)
        .await?
        .into_iter()
        .find(|o| o.id == body.offered_account_id)
        .ok_or_else(|| AppError::not_found(format!("offered account {}", body.offered_account_id)))?;

    let account = keymanagement::import_account(&state, &connection, &offered, &body.nexus_bank_account_id).await?;
    Ok(Json(account))
}
