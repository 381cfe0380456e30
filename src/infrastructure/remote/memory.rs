use crate::application::ports::remote_store::{
    RemoteChange, RemoteStore, RemoteStoreError, Subscription,
};
use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::RecordId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, mpsc};

const CHANGE_BUFFER: usize = 256;

/// Process-local stand-in for the hosted table.
///
/// Writes are broadcast to every subscriber, including the writer's own, exactly as
/// the hosted realtime channel does. Reachability, latency and per-record failures can be
/// switched at runtime to exercise the sync engine.
pub struct InMemoryRemoteStore {
    rows: RwLock<HashMap<RecordId, IntakeRecord>>,
    changes: broadcast::Sender<RemoteChange>,
    reachable: AtomicBool,
    configured: AtomicBool,
    fail_next_writes: AtomicU32,
    failing_ids: RwLock<HashSet<RecordId>>,
    latency: RwLock<Duration>,
    write_calls: AtomicUsize,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            rows: RwLock::new(HashMap::new()),
            changes,
            reachable: AtomicBool::new(true),
            configured: AtomicBool::new(true),
            fail_next_writes: AtomicU32::new(0),
            failing_ids: RwLock::new(HashSet::new()),
            latency: RwLock::new(Duration::ZERO),
            write_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    /// The next `count` insert/upsert/delete calls fail with a 503 rejection.
    pub fn fail_next_writes(&self, count: u32) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    /// Every write touching `id` fails until [`Self::clear_failures`] is called.
    pub async fn fail_writes_for(&self, id: RecordId) {
        self.failing_ids.write().await.insert(id);
    }

    pub async fn clear_failures(&self) {
        self.failing_ids.write().await.clear();
        self.fail_next_writes.store(0, Ordering::SeqCst);
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Number of insert/upsert/delete calls that reached the store.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub async fn row(&self, id: &RecordId) -> Option<IntakeRecord> {
        self.rows.read().await.get(id).cloned()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Applies a write as if another device had made it, bypassing failure switches.
    pub async fn apply_external_write(&self, record: IntakeRecord) {
        let previous = self
            .rows
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        self.publish(if previous.is_some() {
            RemoteChange::Updated(record)
        } else {
            RemoteChange::Inserted(record)
        });
    }

    pub async fn apply_external_delete(&self, id: &RecordId) {
        if self.rows.write().await.remove(id).is_some() {
            self.publish(RemoteChange::Deleted(id.clone()));
        }
    }

    fn publish(&self, change: RemoteChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    async fn begin_request(&self) -> Result<(), RemoteStoreError> {
        if !self.configured.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::NotConfigured);
        }
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unreachable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    async fn begin_write(&self, id: &RecordId) -> Result<(), RemoteStoreError> {
        self.begin_request().await?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || self.failing_ids.read().await.contains(id) {
            return Err(RemoteStoreError::Rejected {
                status: 503,
                body: format!("service unavailable for {id}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn insert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        self.begin_write(&record.id).await?;
        {
            let mut rows = self.rows.write().await;
            if rows.contains_key(&record.id) {
                return Err(RemoteStoreError::Conflict(format!(
                    "duplicate key value violates unique constraint: {}",
                    record.id
                )));
            }
            rows.insert(record.id.clone(), record.clone());
        }
        self.publish(RemoteChange::Inserted(record.clone()));
        Ok(record.clone())
    }

    async fn upsert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        self.begin_write(&record.id).await?;
        let previous = self
            .rows
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        self.publish(if previous.is_some() {
            RemoteChange::Updated(record.clone())
        } else {
            RemoteChange::Inserted(record.clone())
        });
        Ok(record.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteStoreError> {
        self.begin_write(id).await?;
        let removed = self.rows.write().await.remove(id).is_some();
        if removed {
            self.publish(RemoteChange::Deleted(id.clone()));
        }
        Ok(removed)
    }

    async fn select_all(&self) -> Result<Vec<IntakeRecord>, RemoteStoreError> {
        self.begin_request().await?;
        let mut rows: Vec<IntakeRecord> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<RemoteChange>,
    ) -> Result<Subscription, RemoteStoreError> {
        if !self.is_configured() {
            return Err(RemoteStoreError::NotConfigured);
        }
        let mut changes = self.changes.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if sink.send(change).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "sync::realtime", skipped, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(task))
    }
}
