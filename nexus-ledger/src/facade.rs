//! The generic facade-bus contract (spec.md §4.6): a narrow, pluggable
//! extension point invoked after ingestion and before initiation, shaped
//! after the teacher's `adapters::connector::BankConnector` trait — small,
//! `Send + Sync`, one method per hook.

use crate::error::Result;
use crate::types::BankTransactionEntry;
use async_trait::async_trait;
use nexus_iso20022::pain001::PaymentInitiationData;

/// Implemented by a facade (e.g. a Taler Wire Gateway) that layers domain
/// semantics on top of the generic ledger. Facades are otherwise out of
/// scope for this crate; this trait is the whole of the contract.
#[async_trait]
pub trait FacadeBus: Send + Sync {
    /// Invoked once per newly inserted row, with the ingesting transaction
    /// still holding an advisory lock on the bank account. Implementations
    /// may insert facade-specific rows (e.g. classifying a reserve public
    /// key subject) but MUST NOT re-fetch from the bank.
    async fn on_ingested(&self, entry: &BankTransactionEntry) -> Result<()>;

    /// Invoked by API routes that book a payment on behalf of this facade,
    /// e.g. the Taler Wire Gateway's `/transfer` endpoint. Returns the
    /// initiations this facade wants prepared and submitted.
    async fn select_initiations_for(&self, facade: &str) -> Result<Vec<PaymentInitiationData>>;

    /// A short, stable name for logging and routing, e.g. `"taler-wire-gateway"`.
    fn name(&self) -> &str;
}

/// Used when no facade is registered: ingestion proceeds, nothing is ever
/// selected for initiation.
pub struct NoopFacadeBus;

#[async_trait]
impl FacadeBus for NoopFacadeBus {
    async fn on_ingested(&self, _entry: &BankTransactionEntry) -> Result<()> {
        Ok(())
    }

    async fn select_initiations_for(&self, _facade: &str) -> Result<Vec<PaymentInitiationData>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BankTransactionEntry, CreditDebitIndicator, EntryStatus};

    #[tokio::test]
    async fn noop_bus_ignores_ingestion_and_selects_nothing() {
        let bus = NoopFacadeBus;
        let entry = BankTransactionEntry {
            id: 1,
            bank_account_id: uuid::Uuid::new_v4(),
            transaction_id: "AcctSvcrRef:abc".into(),
            credit_debit_indicator: CreditDebitIndicator::Credit,
            currency: "EUR".into(),
            amount: rust_decimal::Decimal::new(100, 2),
            status: EntryStatus::Book,
            transaction_json: serde_json::json!({}),
            updated_by: None,
            created_at: chrono::Utc::now(),
        };
        assert!(bus.on_ingested(&entry).await.is_ok());
        assert!(bus.select_initiations_for("taler-wire-gateway").await.unwrap().is_empty());
        assert_eq!(bus.name(), "noop");
    }
}
