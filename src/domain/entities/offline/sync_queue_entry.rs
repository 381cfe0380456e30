use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::{RecordId, SyncOperation, SyncQueueId};
use crate::shared::config::SyncConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: SyncQueueId,
    pub operation: SyncOperation,
    pub record_id: RecordId,
    /// Snapshot at enqueue time; `None` for deletes.
    pub payload: Option<IntakeRecord>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncQueueEntryDraft {
    pub operation: SyncOperation,
    pub record_id: RecordId,
    pub payload: Option<IntakeRecord>,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncQueueEntry {
    pub fn was_attempted(&self) -> bool {
        self.last_attempt_at.is_some()
    }

    pub fn has_reached_cap(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Earliest instant the entry may be retried, or `None` if it never failed.
    pub fn next_attempt_at(&self, config: &SyncConfig) -> Option<DateTime<Utc>> {
        let last = self.last_attempt_at?;
        let delay = Duration::from_std(config.backoff_for(self.retry_count))
            .unwrap_or_else(|_| Duration::zero());
        Some(last + delay)
    }

    pub fn is_due(&self, now: DateTime<Utc>, config: &SyncConfig) -> bool {
        self.next_attempt_at(config).is_none_or(|due| now >= due)
    }
}

impl SyncQueueEntryDraft {
    pub fn upsert(operation: SyncOperation, payload: IntakeRecord, now: DateTime<Utc>) -> Self {
        Self {
            operation,
            record_id: payload.id.clone(),
            payload: Some(payload),
            enqueued_at: now,
        }
    }

    pub fn delete(record_id: RecordId, now: DateTime<Utc>) -> Self {
        Self {
            operation: SyncOperation::Delete,
            record_id,
            payload: None,
            enqueued_at: now,
        }
    }
}
