//! Bridges [`nexus_scheduler::TaskHandler`] to this crate's ingestion and
//! submission business logic, so the scheduler loop can stay ignorant of
//! EBICS/pain.001 entirely (spec.md §4.5).

use crate::ingestion::{self, FetchParams};
use crate::state::AppState;
use crate::submission;
use async_trait::async_trait;
use nexus_scheduler::error::{Error as SchedulerError, Result as SchedulerResult};
use nexus_scheduler::TaskHandler;
use uuid::Uuid;

/// Adapts a cloned [`AppState`] to [`TaskHandler`].
pub struct ServiceTaskHandler {
    state: AppState,
}

impl ServiceTaskHandler {
    /// Wrap `state` for use as the scheduler's dispatch target.
    pub fn new(state: AppState) -> Self {
        ServiceTaskHandler { state }
    }
}

#[async_trait]
impl TaskHandler for ServiceTaskHandler {
    async fn fetch(&self, resource_id: Uuid, params: &serde_json::Value) -> SchedulerResult<()> {
        let params: FetchParams = serde_json::from_value(params.clone())
            .map_err(|e| SchedulerError::Dispatch(format!("malformed fetch params: {e}")))?;
        let account = self
            .state
            .db
            .list_accounts()
            .await
            .map_err(SchedulerError::Ledger)?
            .into_iter()
            .find(|a| a.id == resource_id)
            .ok_or_else(|| SchedulerError::Dispatch(format!("bank account {resource_id} not found")))?;

        ingestion::fetch_transactions(&self.state, &account, &params)
            .await
            .map_err(|e| SchedulerError::Dispatch(format!("{e:?}")))?;
        Ok(())
    }

    async fn submit(&self, resource_id: Uuid) -> SchedulerResult<()> {
        submission::submit_all_pending(&self.state, resource_id)
            .await
            .map_err(|e| SchedulerError::Dispatch(format!("{e:?}")))?;
        Ok(())
    }
}
