use super::sync_context::SyncContext;
use super::sync_queue_service::SyncQueueService;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::remote_store::{RemoteChange, RemoteStore};
use crate::domain::entities::{IntakeRecord, LocalRecord, MergeDecision, PullOutcome};
use crate::domain::value_objects::SyncOperation;
use crate::shared::error::AppError;
use std::sync::Arc;

/// Imports remote rows into the local store without clobbering newer local work.
#[derive(Clone)]
pub struct PullService {
    ctx: Arc<SyncContext>,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    queue: SyncQueueService,
}

impl PullService {
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

    /// Fetches every remote row and merges each one. Failures land on the status feed.
    pub async fn pull_all(&self) -> PullOutcome {
        let mut outcome = PullOutcome::default();
        if !self.ctx.is_online() || !self.remote.is_configured() {
            tracing::debug!(target: "sync::pull", "pull skipped");
            return outcome;
        }

        let _pass = self.ctx.begin_pass();
        let rows = match self.remote.select_all().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(target: "sync::pull", error = %err, "remote fetch failed");
                let message = format!("pull failed: {err}");
                self.ctx
                    .update_status(|status| status.last_error = Some(message));
                outcome.failed += 1;
                return outcome;
            }
        };

        outcome.fetched = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let mut last_error = None;
        for row in rows {
            let id = row.id.clone();
            match self.merge_one(row).await {
                Ok(decision) => outcome.record(decision),
                Err(err) => {
                    tracing::error!(
                        target: "sync::pull",
                        record_id = %id,
                        error = %err,
                        "merge failed"
                    );
                    outcome.failed += 1;
                    last_error = Some(format!("merge of record {id} failed: {err}"));
                }
            }
        }

        let now = self.ctx.now();
        let pending = self.queue.pending_count().await.ok();
        self.ctx.update_status(|status| {
            status.last_pull_time = Some(now);
            if let Some(pending) = pending {
                status.pending_count = pending;
            }
            if let Some(error) = last_error {
                status.last_error = Some(error);
            }
        });

        tracing::info!(
            target: "sync::pull",
            fetched = outcome.fetched,
            inserted = outcome.inserted,
            overwritten = outcome.overwritten,
            kept_local = outcome.kept_local,
            kept_signed = outcome.kept_signed,
            failed = outcome.failed,
            "pull finished"
        );
        outcome
    }

    /// Resolves one incoming remote record against the local copy, last writer wins.
    pub async fn merge_one(&self, remote: IntakeRecord) -> Result<MergeDecision, AppError> {
        if remote.id.is_blank() {
            return Err(AppError::ValidationError(
                "remote record has no id".to_string(),
            ));
        }

        let _gate = self.ctx.write_gate().await;
        let now = self.ctx.now();

        let local = match self.store.get_record(&remote.id).await? {
            Some(local) => Some(local),
            None => self.store.find_by_remote_id(&remote.id).await?,
        };

        let Some(local) = local else {
            let delete_pending = self
                .queue
                .entries_for_record(&remote.id)
                .await?
                .iter()
                .any(|entry| entry.operation == SyncOperation::Delete);
            if delete_pending {
                tracing::debug!(
                    target: "sync::pull",
                    record_id = %remote.id,
                    "remote row awaiting local delete; ignored"
                );
                return Ok(MergeDecision::KeptLocal);
            }
            self.store
                .put_record(&LocalRecord::from_remote(remote, now))
                .await?;
            return Ok(MergeDecision::Inserted);
        };

        if local.record.status.is_signed()
            && !remote.status.is_signed()
            && remote.updated_at < local.last_write_at()
        {
            tracing::debug!(
                target: "sync::pull",
                record_id = %local.id(),
                "stale remote draft ignored for signed record"
            );
            return Ok(MergeDecision::KeptSigned);
        }

        if local.has_unpushed_changes() && local.local_modified_at > remote.updated_at {
            tracing::debug!(
                target: "sync::pull",
                record_id = %local.id(),
                local_modified_at = %local.local_modified_at,
                remote_updated_at = %remote.updated_at,
                "local pending change is newer; remote version ignored"
            );
            return Ok(MergeDecision::KeptLocal);
        }

        if local.has_unpushed_changes() {
            let dropped = self.queue.drop_for_record(local.id()).await?;
            tracing::warn!(
                target: "sync::pull",
                record_id = %local.id(),
                dropped_entries = dropped,
                "remote version is newer; unpushed local edit lost"
            );
        }

        let mut merged = LocalRecord::from_remote(remote, now);
        merged.record.id = local.record.id.clone();
        self.store.put_record(&merged).await?;
        Ok(MergeDecision::Overwrote)
    }

    /// Applies one realtime event. Remote deletions are never applied locally.
    pub async fn apply_realtime_change(&self, change: RemoteChange) -> Option<MergeDecision> {
        let record = match change {
            RemoteChange::Inserted(record) | RemoteChange::Updated(record) => record,
            RemoteChange::Deleted(id) => {
                tracing::debug!(
                    target: "sync::realtime",
                    record_id = %id,
                    "ignoring remote delete event"
                );
                return None;
            }
        };

        let id = record.id.clone();
        match self.merge_one(record).await {
            Ok(decision) => {
                tracing::debug!(
                    target: "sync::realtime",
                    record_id = %id,
                    ?decision,
                    "realtime change merged"
                );
                if let Ok(pending) = self.queue.pending_count().await {
                    self.ctx.update_status(|status| status.pending_count = pending);
                }
                Some(decision)
            }
            Err(err) => {
                tracing::error!(
                    target: "sync::realtime",
                    record_id = %id,
                    error = %err,
                    "realtime merge failed"
                );
                let message = format!("realtime merge of record {id} failed: {err}");
                self.ctx
                    .update_status(|status| status.last_error = Some(message));
                None
            }
        }
    }
}
