use crate::domain::entities::{LocalRecord, SyncQueueEntry, SyncQueueEntryDraft};
use crate::domain::value_objects::{RecordId, RecordStatus, SyncQueueId, SyncState};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<RecordStatus>,
    pub sync_state: Option<SyncState>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: RecordStatus) -> Self {
        Self {
            status: Some(status),
            sync_state: None,
        }
    }
}

/// Durable on-device storage: the records table, the sync queue and a small
/// key-value settings table. Never performs network I/O.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Upserts by record id. Later writes fully replace earlier ones.
    async fn put_record(&self, record: &LocalRecord) -> Result<(), AppError>;
    async fn get_record(&self, id: &RecordId) -> Result<Option<LocalRecord>, AppError>;
    async fn find_by_remote_id(&self, remote_id: &RecordId)
    -> Result<Option<LocalRecord>, AppError>;
    /// Most recently modified first.
    async fn list_records(&self, filter: RecordFilter) -> Result<Vec<LocalRecord>, AppError>;
    /// Removing an absent id is a successful no-op.
    async fn remove_record(&self, id: &RecordId) -> Result<(), AppError>;
    /// Empties records and the sync queue together.
    async fn clear(&self) -> Result<(), AppError>;

    /// Atomically drops every queued entry for the draft's record and appends the draft.
    async fn replace_entries(&self, draft: SyncQueueEntryDraft)
    -> Result<SyncQueueEntry, AppError>;
    /// Oldest first.
    async fn list_pending(&self) -> Result<Vec<SyncQueueEntry>, AppError>;
    async fn entries_for_record(&self, id: &RecordId) -> Result<Vec<SyncQueueEntry>, AppError>;
    async fn remove_entry(&self, id: SyncQueueId) -> Result<(), AppError>;
    async fn remove_entries_for_record(&self, id: &RecordId) -> Result<u64, AppError>;
    /// Bumps the retry counter and stamps the attempt; returns the updated entry if it still exists.
    async fn record_failure(
        &self,
        id: SyncQueueId,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> Result<Option<SyncQueueEntry>, AppError>;
    async fn pending_count(&self) -> Result<u32, AppError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), AppError>;
}
