//! Per-bank-account condition variables backing long-polling `GET
//! /bank-accounts/{a}/transactions` (spec.md §9: "a test asserts that the
//! endpoint blocks until a new row appears").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

/// A registry of one [`Notify`] per bank account, created lazily.
#[derive(Clone, Default)]
pub struct AccountNotifiers {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Notify>>>>,
}

impl AccountNotifiers {
    /// The `Notify` for `account_id`, creating it on first use.
    pub fn get(&self, account_id: Uuid) -> Arc<Notify> {
        let mut map = self.inner.lock().expect("notifier map poisoned");
        map.entry(account_id).or_insert_with(|| Arc::new(Notify::new())).clone()
    }

    /// Wake every waiter on `account_id`; called after a successful
    /// ingestion commit.
    pub fn notify(&self, account_id: Uuid) {
        self.get(account_id).notify_waiters();
    }
}
