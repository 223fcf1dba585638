//! The service root: one `AppState`, cloned into every Axum handler and
//! into the scheduler, carrying the database pool, the EBICS transport, the
//! injected clock, and the facade bus — the same "one struct, `Clone`,
//! `FromRef` per field" shape as the teacher's `token-engine::AppState`.

use crate::clock::Clock;
use axum::extract::FromRef;
use nexus_ebics::EbicsTransport;
use nexus_ledger::{Database, FacadeBus};
use sqlx::PgPool;
use std::sync::Arc;

use crate::notify::AccountNotifiers;

/// Shared, cloneable application state.
#[derive(Clone)]
pub struct AppState {
    /// The ledger and initiation store.
    pub db: Database,
    /// The EBICS HTTP transport, shared across every connection.
    pub transport: EbicsTransport,
    /// The time source; swappable in tests via [`crate::clock::TestClock`].
    pub clock: Arc<dyn Clock>,
    /// The registered facade bus, or [`nexus_ledger::NoopFacadeBus`] when
    /// none is configured.
    pub facade_bus: Arc<dyn FacadeBus>,
    /// Per-bank-account condition variables backing long-polling `GET
    /// /bank-accounts/{a}/transactions`.
    pub notifiers: AccountNotifiers,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}
