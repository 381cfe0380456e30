use super::sync_context::SyncContext;
use super::sync_queue_service::SyncQueueService;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::remote_store::{RemoteStore, RemoteStoreError};
use crate::domain::entities::{
    IntakeRecord, PushOutcome, PushSkipReason, SyncQueueEntry,
};
use crate::domain::value_objects::{SyncOperation, SyncState};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::sync::Arc;

pub(crate) const LAST_SYNC_SETTING: &str = "last_sync_at";

/// Drains the sync queue against the remote table.
#[derive(Clone)]
pub struct PushService {
    ctx: Arc<SyncContext>,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    queue: SyncQueueService,
}

enum EntryResult {
    Pushed,
    /// Replaced or dropped by a local mutation after the queue was read.
    Superseded,
    Failed { error: String, discarded: bool },
}

impl PushService {
    pub fn new(
        ctx: Arc<SyncContext>,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let queue = SyncQueueService::new(Arc::clone(&store), Arc::clone(&ctx));
        Self {
            ctx,
            store,
            remote,
            queue,
        }
    }

    /// Runs one drain pass, or joins the pass already in flight.
    pub async fn push(&self) -> PushOutcome {
        self.push_at(self.ctx.now()).await
    }

    /// Like [`Self::push`], evaluating backoff windows against `now`.
    pub async fn push_at(&self, now: DateTime<Utc>) -> PushOutcome {
        let pass = {
            let mut slot = self.ctx.push_slot().lock().await;
            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::debug!(target: "sync::push", "joining in-flight push");
                    in_flight.clone()
                }
                None => {
                    let service = self.clone();
                    let task = tokio::spawn(async move {
                        let outcome = service.drain(now).await;
                        service.ctx.push_slot().lock().await.take();
                        outcome
                    });
                    let pass = async move {
                        task.await.unwrap_or_else(|err| PushOutcome {
                            last_error: Some(format!("push pass aborted: {err}")),
                            ..PushOutcome::default()
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pass.clone());
                    pass
                }
            }
        };
        pass.await
    }

    async fn drain(&self, now: DateTime<Utc>) -> PushOutcome {
        if !self.ctx.is_online() {
            return self.skip(PushSkipReason::Offline).await;
        }
        if !self.remote.is_configured() {
            return self.skip(PushSkipReason::RemoteUnconfigured).await;
        }

        let _pass = self.ctx.begin_pass();
        let entries = match self.queue.list_pending().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(target: "sync::push", error = %err, "cannot read sync queue");
                let mut outcome = PushOutcome::skipped(PushSkipReason::LocalStoreUnavailable);
                outcome.last_error = Some(err.to_string());
                self.publish(&mut outcome, now).await;
                return outcome;
            }
        };

        tracing::debug!(target: "sync::push", entries = entries.len(), "push pass started");
        let max_retries = self.ctx.config().max_retries;
        let mut outcome = PushOutcome::default();

        for entry in entries {
            if entry.has_reached_cap(max_retries) {
                let reason = entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "retry limit reached".to_string());
                match self.discard(&entry, &reason).await {
                    Ok(message) => {
                        outcome.discarded += 1;
                        outcome.last_error = Some(message);
                        continue;
                    }
                    Err(err) => {
                        self.abort_on_storage_error(&mut outcome, err);
                        break;
                    }
                }
            }

            if !entry.is_due(now, self.ctx.config()) {
                outcome.backing_off += 1;
                continue;
            }

            match self.process(&entry, now).await {
                Ok(EntryResult::Pushed) => outcome.succeeded += 1,
                Ok(EntryResult::Superseded) => {}
                Ok(EntryResult::Failed { error, discarded }) => {
                    outcome.failed += 1;
                    if discarded {
                        outcome.discarded += 1;
                    }
                    outcome.last_error = Some(error);
                }
                Err(err) => {
                    self.abort_on_storage_error(&mut outcome, err);
                    break;
                }
            }
        }

        self.publish(&mut outcome, now).await;
        tracing::info!(
            target: "sync::push",
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            backing_off = outcome.backing_off,
            discarded = outcome.discarded,
            remaining = outcome.remaining,
            "push pass finished"
        );
        outcome
    }

    async fn skip(&self, reason: PushSkipReason) -> PushOutcome {
        tracing::debug!(target: "sync::push", ?reason, "push skipped");
        let mut outcome = PushOutcome::skipped(reason);
        if let Ok(remaining) = self.queue.refresh_pending_count().await {
            outcome.remaining = remaining;
        }
        outcome
    }

    fn abort_on_storage_error(&self, outcome: &mut PushOutcome, err: AppError) {
        tracing::error!(target: "sync::push", error = %err, "local store failed during push");
        outcome.failed += 1;
        outcome.last_error = Some(err.to_string());
    }

    /// Validates, transmits and settles one entry. `Err` only for local storage failures.
    async fn process(
        &self,
        entry: &SyncQueueEntry,
        now: DateTime<Utc>,
    ) -> Result<EntryResult, AppError> {
        if !self.claim(entry).await? {
            tracing::debug!(
                target: "sync::push",
                record_id = %entry.record_id,
                entry_id = %entry.id,
                "entry superseded before send"
            );
            return Ok(EntryResult::Superseded);
        }

        let payload = match Self::validated_payload(entry) {
            Ok(payload) => payload,
            Err(message) => return self.fail(entry, message, now).await,
        };

        match self.transmit(entry, payload).await {
            Ok(()) => {
                self.acknowledge(entry, now).await?;
                tracing::debug!(
                    target: "sync::push",
                    record_id = %entry.record_id,
                    operation = %entry.operation,
                    "entry pushed"
                );
                Ok(EntryResult::Pushed)
            }
            Err(err) => {
                tracing::warn!(
                    target: "sync::push",
                    record_id = %entry.record_id,
                    operation = %entry.operation,
                    retry_count = entry.retry_count + 1,
                    error = %err,
                    "entry push failed"
                );
                self.fail(entry, format!("record {}: {err}", entry.record_id), now)
                    .await
            }
        }
    }

    /// Marks the record as on the wire if `entry` is still queued.
    async fn claim(&self, entry: &SyncQueueEntry) -> Result<bool, AppError> {
        let mut writes = self.ctx.write_gate().await;
        let still_queued = self
            .queue
            .entries_for_record(&entry.record_id)
            .await?
            .iter()
            .any(|queued| queued.id == entry.id);
        if still_queued {
            writes.begin_send(entry.record_id.clone());
        }
        Ok(still_queued)
    }

    fn validated_payload(entry: &SyncQueueEntry) -> Result<Option<&IntakeRecord>, String> {
        if entry.record_id.is_blank() {
            return Err("validation failed: record id is required".to_string());
        }
        if !entry.operation.carries_payload() {
            return Ok(None);
        }
        let payload = entry.payload.as_ref().ok_or_else(|| {
            format!(
                "validation failed for record {}: queued {} has no payload",
                entry.record_id, entry.operation
            )
        })?;
        payload
            .validate_for_sync()
            .map_err(|reason| format!("validation failed for record {}: {reason}", entry.record_id))?;
        Ok(Some(payload))
    }

    async fn transmit(
        &self,
        entry: &SyncQueueEntry,
        payload: Option<&IntakeRecord>,
    ) -> Result<(), RemoteStoreError> {
        match (entry.operation, payload) {
            (SyncOperation::Create, Some(record)) => match self.remote.insert(record).await {
                Ok(_) => Ok(()),
                Err(RemoteStoreError::Conflict(_)) => {
                    tracing::debug!(
                        target: "sync::push",
                        record_id = %record.id,
                        "row already exists; replaying create as upsert"
                    );
                    self.remote.upsert(record).await.map(|_| ())
                }
                Err(err) => Err(err),
            },
            (SyncOperation::Update, Some(record)) => self.remote.upsert(record).await.map(|_| ()),
            (SyncOperation::Delete, _) => {
                let existed = self.remote.delete(&entry.record_id).await?;
                if !existed {
                    tracing::debug!(
                        target: "sync::push",
                        record_id = %entry.record_id,
                        "remote row already absent"
                    );
                }
                Ok(())
            }
            (_, None) => Err(RemoteStoreError::Decode("missing payload".to_string())),
        }
    }

    async fn acknowledge(&self, entry: &SyncQueueEntry, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut writes = self.ctx.write_gate().await;
        writes.finish_send(&entry.record_id);
        self.queue.remove(entry.id).await?;

        let Some(pushed) = entry.payload.as_ref() else {
            return Ok(());
        };
        let Some(mut local) = self.store.get_record(&entry.record_id).await? else {
            return Ok(());
        };

        local.remote_id = Some(pushed.id.clone());
        if local.local_modified_at == pushed.updated_at {
            local.sync_state = SyncState::Synced;
            local.last_error = None;
            local.synced_at = Some(now);
            local.record.updated_at = pushed.updated_at;
        }
        self.store.put_record(&local).await
    }

    async fn fail(
        &self,
        entry: &SyncQueueEntry,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<EntryResult, AppError> {
        let updated = {
            let mut writes = self.ctx.write_gate().await;
            writes.finish_send(&entry.record_id);
            let updated = self.queue.record_failure_at(entry.id, &message, now).await?;
            if updated.is_some() {
                self.mark_record_error(entry, &message).await?;
            }
            updated
        };

        let max_retries = self.ctx.config().max_retries;
        match updated {
            Some(updated) if updated.has_reached_cap(max_retries) => {
                let abandoned = self.discard(&updated, &message).await?;
                Ok(EntryResult::Failed {
                    error: abandoned,
                    discarded: true,
                })
            }
            _ => Ok(EntryResult::Failed {
                error: message,
                discarded: false,
            }),
        }
    }

    /// Drops an entry that exhausted its retries and flags the local record.
    async fn discard(&self, entry: &SyncQueueEntry, reason: &str) -> Result<String, AppError> {
        let message = format!(
            "sync abandoned after {} attempts: {reason}",
            entry.retry_count
        );
        {
            let _gate = self.ctx.write_gate().await;
            self.queue.remove(entry.id).await?;
            self.mark_record_error(entry, &message).await?;
        }
        let total = self.ctx.record_discard();
        tracing::error!(
            target: "sync::push",
            record_id = %entry.record_id,
            operation = %entry.operation,
            attempts = entry.retry_count,
            discarded_total = total,
            reason,
            "sync queue entry discarded"
        );
        Ok(message)
    }

    /// Caller holds the write gate.
    async fn mark_record_error(&self, entry: &SyncQueueEntry, message: &str) -> Result<(), AppError> {
        if !entry.operation.carries_payload() {
            return Ok(());
        }
        let Some(mut local) = self.store.get_record(&entry.record_id).await? else {
            return Ok(());
        };
        let snapshot_is_current = entry
            .payload
            .as_ref()
            .is_none_or(|payload| payload.updated_at == local.local_modified_at);
        if !snapshot_is_current {
            return Ok(());
        }
        local.sync_state = SyncState::Error;
        local.last_error = Some(message.to_string());
        self.store.put_record(&local).await
    }

    async fn publish(&self, outcome: &mut PushOutcome, now: DateTime<Utc>) {
        let remaining = match self.queue.pending_count().await {
            Ok(remaining) => {
                outcome.remaining = remaining;
                Some(remaining)
            }
            Err(err) => {
                tracing::error!(target: "sync::push", error = %err, "cannot count sync queue");
                None
            }
        };

        if outcome.succeeded > 0
            && let Err(err) = self
                .store
                .put_setting(LAST_SYNC_SETTING, &now.to_rfc3339())
                .await
        {
            tracing::warn!(target: "sync::push", error = %err, "cannot persist last sync time");
        }

        let clean = outcome.is_clean();
        self.ctx.update_status(|status| {
            if let Some(remaining) = remaining {
                status.pending_count = remaining;
            }
            if outcome.succeeded > 0 {
                status.last_sync_time = Some(now);
            }
            if let Some(error) = &outcome.last_error {
                status.last_error = Some(error.clone());
            } else if clean {
                status.last_error = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::RecordService;
    use crate::domain::value_objects::RecordId;
    use crate::infrastructure::offline::SqliteLocalStore;
    use crate::infrastructure::remote::InMemoryRemoteStore;
    use crate::shared::config::SyncConfig;
    use chrono::Duration;

    struct Harness {
        ctx: Arc<SyncContext>,
        store: Arc<SqliteLocalStore>,
        remote: Arc<InMemoryRemoteStore>,
        records: RecordService,
        push: PushService,
    }

    async fn harness(online: bool) -> Harness {
        let store = Arc::new(SqliteLocalStore::in_memory().await.unwrap());
        let remote = Arc::new(InMemoryRemoteStore::new());
        let ctx = Arc::new(SyncContext::new(SyncConfig::default(), online));
        Harness {
            records: RecordService::new(ctx.clone(), store.clone()),
            push: PushService::new(ctx.clone(), store.clone(), remote.clone()),
            ctx,
            store,
            remote,
        }
    }

    fn id(value: &str) -> RecordId {
        RecordId::new(value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn offline_push_processes_nothing() {
        let h = harness(false).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        let outcome = h.push.push().await;

        assert_eq!(outcome.skipped, Some(PushSkipReason::Offline));
        assert_eq!(outcome.processed(), 0);
        assert_eq!(outcome.remaining, 1);
        assert_eq!(h.remote.write_calls(), 0);
    }

    #[tokio::test]
    async fn successful_push_marks_record_synced() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        let outcome = h.push.push().await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.remaining, 0);
        let local = h.store.get_record(&id("f1")).await.unwrap().unwrap();
        assert_eq!(local.sync_state, SyncState::Synced);
        assert_eq!(local.remote_id, Some(id("f1")));
        assert!(h.remote.row(&id("f1")).await.is_some());

        let status = h.ctx.snapshot();
        assert_eq!(status.pending_count, 0);
        assert!(status.last_sync_time.is_some());
        assert!(status.last_error.is_none());
        assert!(h.store.get_setting(LAST_SYNC_SETTING).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_entry_waits_for_backoff_window() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();
        let start = h.ctx.now();

        h.remote.fail_next_writes(1);
        let first = h.push.push_at(start).await;
        assert_eq!(first.failed, 1);

        // retry_count is 1 now, so the window is the second schedule step (5s).
        let early = h.push.push_at(start + Duration::seconds(4)).await;
        assert_eq!(early.backing_off, 1);
        assert_eq!(early.processed(), 0);
        assert_eq!(h.remote.write_calls(), 1);

        let due = h.push.push_at(start + Duration::seconds(5)).await;
        assert_eq!(due.succeeded, 1);
        assert_eq!(h.ctx.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn entry_is_discarded_after_max_retries() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();
        h.remote.fail_writes_for(id("f1")).await;

        let mut now = h.ctx.now();
        for attempt in 1..=5 {
            let outcome = h.push.push_at(now).await;
            assert_eq!(outcome.failed, 1, "attempt {attempt}");
            now += Duration::seconds(301);
        }

        assert!(h.store.list_pending().await.unwrap().is_empty());
        let local = h.store.get_record(&id("f1")).await.unwrap().unwrap();
        assert_eq!(local.sync_state, SyncState::Error);
        assert!(
            local
                .last_error
                .as_deref()
                .unwrap()
                .starts_with("sync abandoned after 5 attempts")
        );

        let status = h.ctx.snapshot();
        assert_eq!(status.discarded_count, 1);
        assert_eq!(status.pending_count, 0);
        assert!(status.last_error.unwrap().contains("abandoned"));
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_block_others() {
        let h = harness(true).await;
        for name in ["a", "b", "c"] {
            h.records
                .save_record(IntakeRecord::for_new_consigner(id(name), "Jane"))
                .await
                .unwrap();
        }
        h.remote.fail_writes_for(id("b")).await;

        let outcome = h.push.push().await;

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.remaining, 1);
        assert!(h.remote.row(&id("a")).await.is_some());
        assert!(h.remote.row(&id("c")).await.is_some());
        assert_eq!(h.ctx.snapshot().pending_count, 1);
    }

    #[tokio::test]
    async fn invalid_payload_gets_an_error_attached() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), ""))
            .await
            .unwrap();

        let outcome = h.push.push().await;

        assert_eq!(outcome.failed, 1);
        assert_eq!(h.remote.write_calls(), 0);
        let pending = h.store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(
            pending[0]
                .last_error
                .as_deref()
                .unwrap()
                .contains("new consigner requires a name")
        );
        let local = h.store.get_record(&id("f1")).await.unwrap().unwrap();
        assert_eq!(local.sync_state, SyncState::Error);
    }

    #[tokio::test]
    async fn replayed_create_falls_back_to_upsert() {
        let h = harness(true).await;
        let record = IntakeRecord::for_new_consigner(id("f1"), "Jane");
        h.remote.apply_external_write(record.clone()).await;
        h.records.save_record(record).await.unwrap();

        let outcome = h.push.push().await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(h.remote.row_count().await, 1);
    }

    #[tokio::test]
    async fn delete_of_absent_row_counts_as_success() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();
        h.push.push().await;
        h.remote.apply_external_delete(&id("f1")).await;

        h.records.delete_record(&id("f1")).await.unwrap();
        let outcome = h.push.push().await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.remaining, 0);
    }

    #[tokio::test]
    async fn concurrent_pushes_share_one_pass() {
        let h = harness(true).await;
        h.remote.set_latency(std::time::Duration::from_millis(50)).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        let (first, second) = tokio::join!(h.push.push(), h.push.push());

        assert_eq!(first, second);
        assert_eq!(first.succeeded, 1);
        assert_eq!(h.remote.write_calls(), 1);
    }

    #[tokio::test]
    async fn delete_while_create_is_sent_queues_remote_delete() {
        let h = harness(true).await;
        h.remote.set_latency(std::time::Duration::from_millis(100)).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();

        let push = h.push.clone();
        let in_flight = tokio::spawn(async move { push.push().await });
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        h.records.delete_record(&id("f1")).await.unwrap();

        let first = in_flight.await.unwrap();
        assert_eq!(first.succeeded, 1);
        let pending = h.store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, SyncOperation::Delete);

        let second = h.push.push().await;
        assert_eq!(second.succeeded, 1);
        assert!(h.remote.row(&id("f1")).await.is_none());
        assert!(h.store.get_record(&id("f1")).await.unwrap().is_none());
        assert_eq!(h.ctx.snapshot().pending_count, 0);
    }

    #[tokio::test]
    async fn entry_dropped_before_send_is_skipped() {
        let h = harness(true).await;
        h.records
            .save_record(IntakeRecord::for_new_consigner(id("f1"), "Jane"))
            .await
            .unwrap();
        let stale = h.store.list_pending().await.unwrap().remove(0);
        h.records.delete_record(&id("f1")).await.unwrap();

        let result = h.push.process(&stale, h.ctx.now()).await.unwrap();

        assert!(matches!(result, EntryResult::Superseded));
        assert_eq!(h.remote.write_calls(), 0);
        assert!(!h.ctx.write_gate().await.is_sending(&id("f1")));
    }

    #[tokio::test]
    async fn edit_during_push_stays_pending() {
        let h = harness(true).await;
        h.remote.set_latency(std::time::Duration::from_millis(50)).await;
        let mut record = IntakeRecord::for_new_consigner(id("f1"), "Jane");
        h.records.save_record(record.clone()).await.unwrap();

        let push = h.push.clone();
        let in_flight = tokio::spawn(async move { push.push().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        record.consigner_name = "Janet".into();
        h.records.save_record(record).await.unwrap();
        in_flight.await.unwrap();

        let local = h.store.get_record(&id("f1")).await.unwrap().unwrap();
        assert_eq!(local.sync_state, SyncState::Pending);
        assert_eq!(local.record.consigner_name, "Janet");
        assert_eq!(h.store.list_pending().await.unwrap().len(), 1);
    }
}
