//! The canonical, storage-ready shape of a single ingested booking entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `CdtDbtInd` — direction of money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditDebitIndicator {
    /// Money moved into the account.
    Credit,
    /// Money moved out of the account.
    Debit,
}

/// `Sts` — booking status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Booked, final.
    Book,
    /// Pending, not yet final.
    Pending,
    /// Informational only.
    Info,
}

/// A single booking entry, canonicalized out of a camt.05x `Ntry`.
///
/// `transaction_json` carries the full parsed `Ntry` (see [`crate::camt::RawEntry`])
/// so that nothing the bank sent is lost even though only a handful of
/// fields are promoted to dedicated columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransactionEntry {
    /// The bank-assigned `AcctSvcrRef`, prefixed per the dedup key scheme.
    pub transaction_id: String,
    /// `CdtDbtInd`.
    pub credit_debit_indicator: CreditDebitIndicator,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Decimal amount, always positive.
    pub amount: Decimal,
    /// `Sts`.
    pub status: EntryStatus,
    /// The full parsed entry, preserved for facades and forensics.
    pub transaction_json: serde_json::Value,
    /// A `PaymentInformationId` discovered in `TxDtls/Refs`, if this entry
    /// is a debit confirming a prior initiation.
    pub payment_information_id: Option<String>,
}

impl BankTransactionEntry {
    /// The dedup key under which this entry is unique per bank account:
    /// `"AcctSvcrRef:" + ref`.
    pub fn dedup_key(acct_svcr_ref: &str) -> String {
        format!("AcctSvcrRef:{acct_svcr_ref}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Invariant 1 (spec.md §8): distinct `AcctSvcrRef`s never collide on
        /// the dedup key, and the same ref always maps back to itself.
        #[test]
        fn dedup_key_is_injective(a in "[A-Za-z0-9-]{1,40}", b in "[A-Za-z0-9-]{1,40}") {
            if a == b {
                prop_assert_eq!(BankTransactionEntry::dedup_key(&a), BankTransactionEntry::dedup_key(&b));
            } else {
                prop_assert_ne!(BankTransactionEntry::dedup_key(&a), BankTransactionEntry::dedup_key(&b));
            }
        }

        #[test]
        fn dedup_key_always_carries_the_prefix(r in "[A-Za-z0-9-]{1,40}") {
            prop_assert!(BankTransactionEntry::dedup_key(&r).starts_with("AcctSvcrRef:"));
        }
    }
}
