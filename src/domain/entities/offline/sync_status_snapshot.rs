use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The value published on the status feed after every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusSnapshot {
    pub online: bool,
    pub syncing: bool,
    pub pending_count: u32,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_pull_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Queue entries abandoned after exhausting their retries since startup.
    pub discarded_count: u32,
}
