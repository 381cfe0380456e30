use super::push_service::LAST_SYNC_SETTING;
use super::sync_context::SyncContext;
use super::sync_queue_service::SyncQueueService;
use crate::application::ports::local_store::{LocalStore, RecordFilter};
use crate::domain::entities::{IntakeRecord, LocalRecord, SyncStatusSnapshot};
use crate::domain::value_objects::{RecordId, RecordStatus, SyncOperation};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// The record CRUD surface. Every call resolves against the local store and returns
/// before any network activity.
#[derive(Clone)]
pub struct RecordService {
    ctx: Arc<SyncContext>,
    store: Arc<dyn LocalStore>,
    queue: SyncQueueService,
}

impl RecordService {
    pub fn new(ctx: Arc<SyncContext>, store: Arc<dyn LocalStore>) -> Self {
        let queue = SyncQueueService::new(Arc::clone(&store), Arc::clone(&ctx));
        Self { ctx, store, queue }
    }

    /// Restores the persisted status fields. Call once at startup.
    pub async fn load_status(&self) -> Result<(), AppError> {
        let last_sync_time = self
            .store
            .get_setting(LAST_SYNC_SETTING)
            .await?
            .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
            .map(|value| value.with_timezone(&Utc));
        self.queue.refresh_pending_count().await?;
        self.ctx.update_status(|status| {
            if status.last_sync_time.is_none() {
                status.last_sync_time = last_sync_time;
            }
        });
        Ok(())
    }

    pub async fn save_record(&self, record: IntakeRecord) -> Result<RecordId, AppError> {
        if record.id.is_blank() {
            return Err(AppError::InvalidInput("record id is required".to_string()));
        }

        let id = record.id.clone();
        {
            let _gate = self.ctx.write_gate().await;
            let now = self.ctx.now();
            let existing = self.store.get_record(&id).await?;
            let remote_id = existing.and_then(|local| local.remote_id);
            let operation = if remote_id.is_some() {
                SyncOperation::Update
            } else {
                SyncOperation::Create
            };

            let mut snapshot = record.clone();
            snapshot.updated_at = now;

            let mut local = LocalRecord::pending(record, now);
            local.remote_id = remote_id;
            self.store.put_record(&local).await?;
            self.queue
                .enqueue(operation, id.clone(), Some(snapshot))
                .await?;

            tracing::debug!(
                target: "sync::records",
                record_id = %id,
                %operation,
                "record saved locally"
            );
        }

        self.ctx.request_push();
        Ok(id)
    }

    pub async fn load_record(&self, id: &RecordId) -> Result<Option<IntakeRecord>, AppError> {
        Ok(self.store.get_record(id).await?.map(|local| local.record))
    }

    /// The record together with its sync metadata.
    pub async fn load_local(&self, id: &RecordId) -> Result<Option<LocalRecord>, AppError> {
        self.store.get_record(id).await
    }

    /// Most recently modified first.
    pub async fn list_records(
        &self,
        status: Option<RecordStatus>,
    ) -> Result<Vec<LocalRecord>, AppError> {
        self.store
            .list_records(RecordFilter {
                status,
                ..RecordFilter::all()
            })
            .await
    }

    /// Removes the record locally and queues a remote delete when the remote may hold it.
    /// Deleting an absent record is a no-op.
    pub async fn delete_record(&self, id: &RecordId) -> Result<(), AppError> {
        let enqueued = {
            let writes = self.ctx.write_gate().await;
            let existing = self.store.get_record(id).await?;
            let entries = self.queue.entries_for_record(id).await?;

            if existing.is_none()
                && entries
                    .iter()
                    .all(|entry| entry.operation == SyncOperation::Delete)
            {
                return Ok(());
            }

            let remote_may_hold_it = writes.is_sending(id)
                || existing
                    .as_ref()
                    .is_some_and(LocalRecord::was_ever_synced)
                || entries.iter().any(|entry| entry.was_attempted());

            if remote_may_hold_it {
                self.queue
                    .enqueue(SyncOperation::Delete, id.clone(), None)
                    .await?;
            } else {
                self.queue.drop_for_record(id).await?;
                self.queue.refresh_pending_count().await?;
            }
            self.store.remove_record(id).await?;

            tracing::debug!(
                target: "sync::records",
                record_id = %id,
                remote_delete = remote_may_hold_it,
                "record deleted locally"
            );
            remote_may_hold_it
        };

        if enqueued {
            self.ctx.request_push();
        }
        Ok(())
    }

    /// Wipes every record, the sync queue and persisted settings.
    pub async fn clear_all(&self) -> Result<(), AppError> {
        let _gate = self.ctx.write_gate().await;
        self.store.clear().await?;
        self.ctx.update_status(|status| {
            status.pending_count = 0;
            status.last_sync_time = None;
            status.last_pull_time = None;
            status.last_error = None;
        });
        tracing::info!(target: "sync::records", "all local data cleared");
        Ok(())
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        self.ctx.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatusSnapshot> {
        self.ctx.subscribe()
    }

    pub async fn pending_count(&self) -> Result<u32, AppError> {
        self.queue.pending_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::LineItem;
    use crate::domain::value_objects::SyncState;
    use crate::infrastructure::offline::SqliteLocalStore;
    use crate::shared::config::SyncConfig;

    async fn setup() -> (RecordService, Arc<SqliteLocalStore>) {
        let store = Arc::new(SqliteLocalStore::in_memory().await.unwrap());
        let ctx = Arc::new(SyncContext::new(SyncConfig::default(), false));
        (RecordService::new(ctx, store.clone()), store)
    }

    fn id(value: &str) -> RecordId {
        RecordId::new(value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn saved_record_loads_back_unchanged() {
        let (service, _) = setup().await;
        let mut record = IntakeRecord::for_new_consigner(id("f1"), "Jane Doe");
        record.items.push(
            LineItem::default()
                .with_field("description", "Lamp")
                .with_image("data:image/png;base64,AAAA"),
        );

        let saved_id = service.save_record(record.clone()).await.unwrap();
        let loaded = service.load_record(&saved_id).await.unwrap().unwrap();

        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn save_marks_pending_and_enqueues_create() {
        let (service, store) = setup().await;
        service
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane Doe"))
            .await
            .unwrap();

        let listed = service.list_records(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sync_state, SyncState::Pending);
        assert_eq!(service.status().pending_count, 1);

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending[0].operation, SyncOperation::Create);
        assert_eq!(
            pending[0].payload.as_ref().unwrap().updated_at,
            listed[0].local_modified_at
        );
    }

    #[tokio::test]
    async fn repeated_saves_keep_one_entry() {
        let (service, _) = setup().await;
        let mut record = IntakeRecord::for_new_consigner(id("f1"), "Jane");
        for name in ["Ja", "Jan", "Jane"] {
            record.consigner_name = name.to_string();
            service.save_record(record.clone()).await.unwrap();
        }

        assert_eq!(service.pending_count().await.unwrap(), 1);
        assert_eq!(
            service.load_record(&id("f1")).await.unwrap().unwrap().consigner_name,
            "Jane"
        );
    }

    #[tokio::test]
    async fn blank_id_is_rejected() {
        let (service, _) = setup().await;
        let mut record = IntakeRecord::for_new_consigner(id("f1"), "Jane");
        record.id = RecordId::from_trusted(" ".to_string());

        let err = service.save_record(record).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deleting_unsynced_record_leaves_no_entries() {
        let (service, _) = setup().await;
        service
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        service.delete_record(&id("f1")).await.unwrap();

        assert!(service.load_record(&id("f1")).await.unwrap().is_none());
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(service.status().pending_count, 0);
    }

    #[tokio::test]
    async fn deleting_synced_record_enqueues_one_delete() {
        let (service, store) = setup().await;
        let synced = LocalRecord::from_remote(
            IntakeRecord::for_new_consigner(id("f1"), "Jane"),
            Utc::now(),
        );
        store.put_record(&synced).await.unwrap();

        service.delete_record(&id("f1")).await.unwrap();
        service.delete_record(&id("f1")).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, SyncOperation::Delete);
        assert!(service.load_record(&id("f1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_nonexistent_record_is_a_no_op() {
        let (service, _) = setup().await;
        service.delete_record(&id("nonexistent")).await.unwrap();
        service.delete_record(&id("nonexistent")).await.unwrap();
        assert_eq!(service.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (service, _) = setup().await;
        let mut signed = IntakeRecord::for_new_consigner(id("s1"), "Signer");
        signed.status = RecordStatus::Signed;
        service.save_record(signed).await.unwrap();
        service
            .save_record(IntakeRecord::for_new_consigner(id("d1"), "Drafter"))
            .await
            .unwrap();

        let signed_only = service
            .list_records(Some(RecordStatus::Signed))
            .await
            .unwrap();
        assert_eq!(signed_only.len(), 1);
        assert_eq!(signed_only[0].id().as_str(), "s1");
    }

    #[tokio::test]
    async fn clear_all_empties_records_and_queue() {
        let (service, _) = setup().await;
        service
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        service.clear_all().await.unwrap();

        assert!(service.list_records(None).await.unwrap().is_empty());
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(service.status().pending_count, 0);
    }
}
