use super::mappers::{
    local_record_from_row, queue_entry_from_row, serialize_record, to_micros,
};
use super::queries::{
    COUNT_QUEUE_ENTRIES, DELETE_ALL_QUEUE_ENTRIES, DELETE_ALL_RECORDS, DELETE_ALL_SETTINGS,
    DELETE_QUEUE_ENTRIES_FOR_RECORD, DELETE_QUEUE_ENTRY, DELETE_RECORD, INSERT_QUEUE_ENTRY,
    RECORD_QUEUE_FAILURE, SELECT_PENDING_QUEUE, SELECT_QUEUE_ENTRY_BY_ID,
    SELECT_QUEUE_FOR_RECORD, SELECT_RECORD_BY_ID, SELECT_RECORD_BY_REMOTE_ID,
    SELECT_RECORD_COLUMNS, SELECT_SETTING, UPSERT_RECORD, UPSERT_SETTING,
};
use super::rows::{RecordRow, SyncQueueRow};
use crate::application::ports::local_store::{LocalStore, RecordFilter};
use crate::domain::entities::{LocalRecord, SyncQueueEntry, SyncQueueEntryDraft};
use crate::domain::value_objects::{RecordId, SyncQueueId};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

pub struct SqliteLocalStore {
    pool: ConnectionPool,
}

impl SqliteLocalStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Opens the pool and applies embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = ConnectionPool::new(database_url, max_connections).await?;
        pool.migrate().await?;
        Ok(Self::new(pool))
    }

    pub async fn in_memory() -> Result<Self, AppError> {
        let pool = ConnectionPool::from_memory().await?;
        pool.migrate().await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn put_record(&self, record: &LocalRecord) -> Result<(), AppError> {
        let data = serialize_record(&record.record)?;

        sqlx::query(UPSERT_RECORD)
            .bind(record.id().as_str())
            .bind(record.record.status.as_str())
            .bind(record.sync_state.as_str())
            .bind(&data)
            .bind(to_micros(record.local_modified_at))
            .bind(record.remote_id.as_ref().map(|id| id.as_str()))
            .bind(record.last_error.as_deref())
            .bind(record.synced_at.map(to_micros))
            .execute(self.pool.get_pool())
            .await?;

        tracing::trace!(
            target: "offline::store",
            record_id = %record.id(),
            sync_state = %record.sync_state,
            "record written"
        );
        Ok(())
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<LocalRecord>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(SELECT_RECORD_BY_ID)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(local_record_from_row).transpose()
    }

    async fn find_by_remote_id(
        &self,
        remote_id: &RecordId,
    ) -> Result<Option<LocalRecord>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(SELECT_RECORD_BY_REMOTE_ID)
            .bind(remote_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(local_record_from_row).transpose()
    }

    async fn list_records(&self, filter: RecordFilter) -> Result<Vec<LocalRecord>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_RECORD_COLUMNS);
        builder.push(" WHERE 1 = 1");
        if let Some(status) = filter.status {
            builder.push(" AND record_status = ").push_bind(status.as_str());
        }
        if let Some(sync_state) = filter.sync_state {
            builder.push(" AND sync_state = ").push_bind(sync_state.as_str());
        }
        builder.push(" ORDER BY local_modified_at DESC, id ASC");

        let rows = builder
            .build_query_as::<RecordRow>()
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(local_record_from_row).collect()
    }

    async fn remove_record(&self, id: &RecordId) -> Result<(), AppError> {
        sqlx::query(DELETE_RECORD)
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        sqlx::query(DELETE_ALL_QUEUE_ENTRIES).execute(&mut *tx).await?;
        sqlx::query(DELETE_ALL_RECORDS).execute(&mut *tx).await?;
        sqlx::query(DELETE_ALL_SETTINGS).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(target: "offline::store", "local store cleared");
        Ok(())
    }

    async fn replace_entries(
        &self,
        draft: SyncQueueEntryDraft,
    ) -> Result<SyncQueueEntry, AppError> {
        let payload = draft.payload.as_ref().map(serialize_record).transpose()?;

        let mut tx = self.pool.get_pool().begin().await?;
        let superseded = sqlx::query(DELETE_QUEUE_ENTRIES_FOR_RECORD)
            .bind(draft.record_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let result = sqlx::query(INSERT_QUEUE_ENTRY)
            .bind(draft.operation.as_str())
            .bind(draft.record_id.as_str())
            .bind(payload.as_deref())
            .bind(to_micros(draft.enqueued_at))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let id = SyncQueueId::new(result.last_insert_rowid()).map_err(AppError::Storage)?;
        tracing::debug!(
            target: "offline::store",
            entry_id = %id,
            record_id = %draft.record_id,
            operation = %draft.operation,
            superseded,
            "sync queue entry enqueued"
        );

        Ok(SyncQueueEntry {
            id,
            operation: draft.operation,
            record_id: draft.record_id,
            payload: draft.payload,
            enqueued_at: draft.enqueued_at,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        })
    }

    async fn list_pending(&self) -> Result<Vec<SyncQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(SELECT_PENDING_QUEUE)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(queue_entry_from_row).collect()
    }

    async fn entries_for_record(&self, id: &RecordId) -> Result<Vec<SyncQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(SELECT_QUEUE_FOR_RECORD)
            .bind(id.as_str())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(queue_entry_from_row).collect()
    }

    async fn remove_entry(&self, id: SyncQueueId) -> Result<(), AppError> {
        sqlx::query(DELETE_QUEUE_ENTRY)
            .bind(id.value())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn remove_entries_for_record(&self, id: &RecordId) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_QUEUE_ENTRIES_FOR_RECORD)
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn record_failure(
        &self,
        id: SyncQueueId,
        error: &str,
        attempted_at: DateTime<Utc>,
    ) -> Result<Option<SyncQueueEntry>, AppError> {
        sqlx::query(RECORD_QUEUE_FAILURE)
            .bind(id.value())
            .bind(to_micros(attempted_at))
            .bind(error)
            .execute(self.pool.get_pool())
            .await?;

        let row = sqlx::query_as::<_, SyncQueueRow>(SELECT_QUEUE_ENTRY_BY_ID)
            .bind(id.value())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(queue_entry_from_row).transpose()
    }

    async fn pending_count(&self) -> Result<u32, AppError> {
        let row = sqlx::query(COUNT_QUEUE_ENTRIES)
            .fetch_one(self.pool.get_pool())
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query(SELECT_SETTING)
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(AppError::from)
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(UPSERT_SETTING)
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp_micros())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
