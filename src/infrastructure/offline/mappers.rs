use super::rows::{RecordRow, SyncQueueRow};
use crate::domain::entities::{IntakeRecord, LocalRecord, SyncQueueEntry};
use crate::domain::value_objects::{RecordId, SyncOperation, SyncQueueId, SyncState};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub fn to_micros(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

pub fn from_micros(value: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_micros(value)
        .ok_or_else(|| AppError::Storage(format!("Timestamp out of range: {value}")))
}

pub fn serialize_record(record: &IntakeRecord) -> Result<String, AppError> {
    serde_json::to_string(record).map_err(|err| AppError::SerializationError(err.to_string()))
}

fn deserialize_record(data: &str) -> Result<IntakeRecord, AppError> {
    serde_json::from_str(data).map_err(|err| AppError::DeserializationError(err.to_string()))
}

pub fn local_record_from_row(row: RecordRow) -> Result<LocalRecord, AppError> {
    let record = deserialize_record(&row.data)?;
    if record.id.as_str() != row.id {
        return Err(AppError::Storage(format!(
            "Record payload id {} does not match row key {}",
            record.id, row.id
        )));
    }

    let sync_state = row
        .sync_state
        .parse::<SyncState>()
        .map_err(AppError::Storage)?;

    Ok(LocalRecord {
        record,
        sync_state,
        local_modified_at: from_micros(row.local_modified_at)?,
        remote_id: row.remote_id.map(RecordId::from_trusted),
        last_error: row.last_error,
        synced_at: row.synced_at.map(from_micros).transpose()?,
    })
}

pub fn queue_entry_from_row(row: SyncQueueRow) -> Result<SyncQueueEntry, AppError> {
    let operation = row
        .operation
        .parse::<SyncOperation>()
        .map_err(AppError::Storage)?;
    let payload = row
        .payload
        .as_deref()
        .map(deserialize_record)
        .transpose()?;

    Ok(SyncQueueEntry {
        id: SyncQueueId::new(row.id).map_err(AppError::Storage)?,
        operation,
        record_id: RecordId::from_trusted(row.record_id),
        payload,
        enqueued_at: from_micros(row.enqueued_at)?,
        retry_count: u32::try_from(row.retry_count.max(0)).unwrap_or(u32::MAX),
        last_attempt_at: row.last_attempt_at.map(from_micros).transpose()?,
        last_error: row.last_error,
    })
}
