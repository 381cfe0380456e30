use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::{RecordId, SyncState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as held on the device, plus its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub record: IntakeRecord,
    pub sync_state: SyncState,
    /// Wall-clock time of the local write that produced the current value.
    pub local_modified_at: DateTime<Utc>,
    /// Set once the remote has acknowledged the record at least once.
    pub remote_id: Option<RecordId>,
    pub last_error: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalRecord {
    pub fn pending(record: IntakeRecord, local_modified_at: DateTime<Utc>) -> Self {
        Self {
            record,
            sync_state: SyncState::Pending,
            local_modified_at,
            remote_id: None,
            last_error: None,
            synced_at: None,
        }
    }

    /// A copy of a remote row accepted as authoritative.
    pub fn from_remote(record: IntakeRecord, now: DateTime<Utc>) -> Self {
        Self {
            remote_id: Some(record.id.clone()),
            local_modified_at: record.updated_at,
            record,
            sync_state: SyncState::Synced,
            last_error: None,
            synced_at: Some(now),
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.record.id
    }

    pub fn has_unpushed_changes(&self) -> bool {
        self.sync_state.has_unpushed_changes()
    }

    pub fn was_ever_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Latest write from either side that produced the current value.
    pub fn last_write_at(&self) -> DateTime<Utc> {
        self.local_modified_at.max(self.record.updated_at)
    }
}
