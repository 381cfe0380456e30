use crate::domain::entities::{PushOutcome, SyncStatusSnapshot};
use crate::domain::value_objects::RecordId;
use crate::shared::config::SyncConfig;
use chrono::{DateTime, SubsecRound, Utc};
use futures::future::{BoxFuture, Shared};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard, Notify, watch};

pub(crate) type InFlightPush = Shared<BoxFuture<'static, PushOutcome>>;

/// State guarded by the write gate: records whose queue entry is on the wire.
#[derive(Debug, Default)]
pub struct LocalWrites {
    sending: HashSet<RecordId>,
}

impl LocalWrites {
    /// True while a push for `id` has been claimed and not yet settled. The remote may
    /// already hold the row.
    pub fn is_sending(&self, id: &RecordId) -> bool {
        self.sending.contains(id)
    }

    pub(crate) fn begin_send(&mut self, id: RecordId) {
        self.sending.insert(id);
    }

    pub(crate) fn finish_send(&mut self, id: &RecordId) {
        self.sending.remove(id);
    }
}

/// Process-scoped sync state shared by the record API, the push and pull engines and
/// the scheduler. Created once at startup and torn down with the [`super::SyncService`].
pub struct SyncContext {
    config: SyncConfig,
    status: watch::Sender<SyncStatusSnapshot>,
    online: AtomicBool,
    active_passes: AtomicUsize,
    discarded: AtomicU32,
    write_gate: Mutex<LocalWrites>,
    in_flight_push: Mutex<Option<InFlightPush>>,
    push_requested: Notify,
}

impl SyncContext {
    pub fn new(config: SyncConfig, online: bool) -> Self {
        let (status, _) = watch::channel(SyncStatusSnapshot {
            online,
            ..SyncStatusSnapshot::default()
        });
        Self {
            config,
            status,
            online: AtomicBool::new(online),
            active_passes: AtomicUsize::new(0),
            discarded: AtomicU32::new(0),
            write_gate: Mutex::new(LocalWrites::default()),
            in_flight_push: Mutex::new(None),
            push_requested: Notify::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Wall clock at the precision the local store persists (microseconds).
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the previous connectivity state.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            self.update_status(|status| status.online = online);
        }
        previous
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatusSnapshot> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> SyncStatusSnapshot {
        self.status.borrow().clone()
    }

    /// Applies `change` and notifies subscribers if anything actually changed.
    pub fn update_status(&self, change: impl FnOnce(&mut SyncStatusSnapshot)) {
        self.status.send_if_modified(|status| {
            let before = status.clone();
            change(status);
            *status != before
        });
    }

    /// Serializes local mutations across the record API, merges and push acknowledgements.
    pub async fn write_gate(&self) -> MutexGuard<'_, LocalWrites> {
        self.write_gate.lock().await
    }

    pub(crate) fn push_slot(&self) -> &Mutex<Option<InFlightPush>> {
        &self.in_flight_push
    }

    pub fn begin_pass(&self) -> PassGuard<'_> {
        if self.active_passes.fetch_add(1, Ordering::SeqCst) == 0 {
            self.update_status(|status| status.syncing = true);
        }
        PassGuard { ctx: self }
    }

    pub fn record_discard(&self) -> u32 {
        let total = self.discarded.fetch_add(1, Ordering::SeqCst) + 1;
        self.update_status(|status| status.discarded_count = total);
        total
    }

    /// Wakes the scheduler so it pushes soon after a local mutation.
    pub fn request_push(&self) {
        self.push_requested.notify_one();
    }

    pub async fn push_requested(&self) {
        self.push_requested.notified().await;
    }
}

/// Keeps `syncing` raised while any push or pull pass runs.
pub struct PassGuard<'a> {
    ctx: &'a SyncContext,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.ctx.active_passes.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.ctx.update_status(|status| status.syncing = false);
        }
    }
}
