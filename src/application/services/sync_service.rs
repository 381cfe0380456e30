use super::pull_service::PullService;
use super::push_service::PushService;
use super::sync_context::SyncContext;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::remote_store::{RemoteChange, RemoteStore, Subscription};
use crate::domain::entities::{SyncReport, SyncStatusSnapshot};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Default)]
struct Runtime {
    scheduler: Option<JoinHandle<()>>,
    realtime_consumer: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

/// Connectivity tracking, the periodic sync timer and the realtime consumer.
#[derive(Clone)]
pub struct SyncService {
    ctx: Arc<SyncContext>,
    remote: Arc<dyn RemoteStore>,
    push: PushService,
    pull: PullService,
    runtime: Arc<Mutex<Runtime>>,
}

impl SyncService {
    pub fn new(
        ctx: Arc<SyncContext>,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let push = PushService::new(Arc::clone(&ctx), Arc::clone(&store), Arc::clone(&remote));
        let pull = PullService::new(Arc::clone(&ctx), store, Arc::clone(&remote));
        Self {
            ctx,
            remote,
            push,
            pull,
            runtime: Arc::new(Mutex::new(Runtime::default())),
        }
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        self.ctx.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatusSnapshot> {
        self.ctx.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.ctx.is_online()
    }

    /// Records a connectivity change. Coming back online runs a full sync and returns its
    /// report; every other transition only updates the status feed.
    pub async fn set_online(&self, online: bool) -> Option<SyncReport> {
        let was_online = self.ctx.set_online(online);
        tracing::info!(target: "sync::scheduler", online, was_online, "connectivity changed");
        if online && !was_online {
            Some(self.full_sync().await)
        } else {
            None
        }
    }

    /// Manual "sync now". Safe to call alongside the timer and reconnect triggers.
    pub async fn sync_now(&self) -> SyncReport {
        self.full_sync().await
    }

    /// Push, then pull if the push ran against a reachable remote.
    pub async fn full_sync(&self) -> SyncReport {
        let push = self.push.push().await;
        let pull = if self.ctx.is_online() && self.remote.is_configured() {
            Some(self.pull.pull_all().await)
        } else {
            None
        };
        SyncReport { push, pull }
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.scheduler.is_some()
    }

    /// Starts the sync timer and, when enabled, the realtime subscription. Idempotent.
    pub async fn start(&self) {
        let mut runtime = self.runtime.lock().await;
        if runtime.scheduler.is_some() {
            return;
        }

        runtime.scheduler = Some(self.spawn_scheduler());

        if self.ctx.config().realtime_enabled && self.remote.is_configured() {
            let (tx, rx) = mpsc::unbounded_channel();
            match self.remote.subscribe(tx).await {
                Ok(subscription) => {
                    runtime.subscription = Some(subscription);
                    runtime.realtime_consumer = Some(self.spawn_realtime_consumer(rx));
                }
                Err(err) => {
                    tracing::warn!(
                        target: "sync::realtime",
                        error = %err,
                        "realtime subscription unavailable"
                    );
                }
            }
        }

        tracing::info!(
            target: "sync::scheduler",
            interval_secs = self.ctx.config().sync_interval_secs,
            "sync scheduler started"
        );
    }

    /// Stops the timer and the realtime channel. A pass already running completes.
    pub async fn stop(&self) {
        let mut runtime = self.runtime.lock().await;
        if let Some(scheduler) = runtime.scheduler.take() {
            scheduler.abort();
        }
        if let Some(subscription) = runtime.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(consumer) = runtime.realtime_consumer.take() {
            consumer.abort();
        }
        tracing::info!(target: "sync::scheduler", "sync scheduler stopped");
    }

    fn spawn_scheduler(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.ctx.config().sync_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if service.ctx.is_online() && service.ctx.config().auto_sync {
                            tracing::debug!(target: "sync::scheduler", "timer sync");
                            service.full_sync().await;
                        }
                    }
                    _ = service.ctx.push_requested() => {
                        if service.ctx.is_online() && service.ctx.config().auto_sync {
                            service.push.push().await;
                        }
                    }
                }
            }
        })
    }

    fn spawn_realtime_consumer(
        &self,
        mut changes: mpsc::UnboundedReceiver<RemoteChange>,
    ) -> JoinHandle<()> {
        let pull = self.pull.clone();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                pull.apply_realtime_change(change).await;
            }
            tracing::debug!(target: "sync::realtime", "realtime stream ended");
        })
    }
}
