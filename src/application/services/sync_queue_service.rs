use super::sync_context::SyncContext;
use crate::application::ports::local_store::LocalStore;
use crate::domain::entities::{IntakeRecord, SyncQueueEntry, SyncQueueEntryDraft};
use crate::domain::value_objects::{RecordId, SyncOperation, SyncQueueId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The per-record deduplicating operation log in front of the local store.
#[derive(Clone)]
pub struct SyncQueueService {
    store: Arc<dyn LocalStore>,
    ctx: Arc<SyncContext>,
}

impl SyncQueueService {
    pub fn new(store: Arc<dyn LocalStore>, ctx: Arc<SyncContext>) -> Self {
        Self { store, ctx }
    }

    /// Appends an entry, superseding anything already queued for the same record.
    pub async fn enqueue(
        &self,
        operation: SyncOperation,
        record_id: RecordId,
        payload: Option<IntakeRecord>,
    ) -> Result<SyncQueueEntry, AppError> {
        let now = self.ctx.now();
        let draft = match (operation.carries_payload(), payload) {
            (true, Some(payload)) => {
                if payload.id != record_id {
                    return Err(AppError::InvalidInput(format!(
                        "payload id {} does not match queued record {record_id}",
                        payload.id
                    )));
                }
                SyncQueueEntryDraft::upsert(operation, payload, now)
            }
            (true, None) => {
                return Err(AppError::InvalidInput(format!(
                    "{operation} requires a record payload"
                )));
            }
            (false, _) => SyncQueueEntryDraft::delete(record_id, now),
        };

        let entry = self.store.replace_entries(draft).await?;
        self.refresh_pending_count().await?;
        Ok(entry)
    }

    pub async fn list_pending(&self) -> Result<Vec<SyncQueueEntry>, AppError> {
        self.store.list_pending().await
    }

    pub async fn entries_for_record(
        &self,
        record_id: &RecordId,
    ) -> Result<Vec<SyncQueueEntry>, AppError> {
        self.store.entries_for_record(record_id).await
    }

    pub async fn remove(&self, entry_id: SyncQueueId) -> Result<(), AppError> {
        self.store.remove_entry(entry_id).await
    }

    pub async fn drop_for_record(&self, record_id: &RecordId) -> Result<u64, AppError> {
        self.store.remove_entries_for_record(record_id).await
    }

    pub async fn record_failure(
        &self,
        entry_id: SyncQueueId,
        error: &str,
    ) -> Result<Option<SyncQueueEntry>, AppError> {
        self.record_failure_at(entry_id, error, self.ctx.now()).await
    }

    pub async fn record_failure_at(
        &self,
        entry_id: SyncQueueId,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> Result<Option<SyncQueueEntry>, AppError> {
        self.store.record_failure(entry_id, error, attempted_at).await
    }

    pub async fn pending_count(&self) -> Result<u32, AppError> {
        self.store.pending_count().await
    }

    /// Publishes the current queue length on the status feed.
    pub async fn refresh_pending_count(&self) -> Result<u32, AppError> {
        let count = self.store.pending_count().await?;
        self.ctx.update_status(|status| status.pending_count = count);
        Ok(count)
    }
}
