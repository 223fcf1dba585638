//! The HTTP API surface (spec.md §6.3), split by resource the way the
//! teacher's `ibank-service::routes` module is split.

pub mod accounts;
pub mod connections;

use crate::state::AppState;
use axum::Router;

/// The full router: every `bank-connections` and `bank-accounts` route,
/// merged under one `AppState`.
pub fn router() -> Router<AppState> {
    Router::new().merge(connections::router()).merge(accounts::router())
}
