use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: String,
    pub record_status: String,
    pub sync_state: String,
    pub data: String,
    pub local_modified_at: i64,
    pub remote_id: Option<String>,
    pub last_error: Option<String>,
    pub synced_at: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SyncQueueRow {
    pub id: i64,
    pub operation: String,
    pub record_id: String,
    pub payload: Option<String>,
    pub enqueued_at: i64,
    pub retry_count: i64,
    pub last_attempt_at: Option<i64>,
    pub last_error: Option<String>,
}
