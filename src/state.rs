use crate::application::ports::{LocalStore, RemoteStore};
use crate::application::services::{RecordService, SyncContext, SyncService};
use crate::infrastructure::offline::SqliteLocalStore;
use crate::infrastructure::remote::{RestRemoteStore, UnconfiguredRemoteStore};
use crate::shared::config::{AppConfig, SyncConfig};
use crate::shared::error::AppError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything the application needs, wired once at startup.
pub struct AppState {
    pub records: RecordService,
    pub sync: SyncService,
}

impl AppState {
    /// Opens the SQLite store and the configured remote. Starts online when a remote exists.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(AppError::ConfigurationError)?;
        ensure_database_dir(&config.database.url)?;

        let store: Arc<dyn LocalStore> = Arc::new(
            SqliteLocalStore::connect(&config.database.url, config.database.max_connections)
                .await?,
        );
        let remote: Arc<dyn RemoteStore> = if config.remote.is_configured() {
            Arc::new(RestRemoteStore::new(
                &config.remote,
                Duration::from_secs(config.sync.realtime_reconnect_secs),
            )?)
        } else {
            tracing::warn!("no remote configured; running local-only");
            Arc::new(UnconfiguredRemoteStore)
        };

        let online = remote.is_configured();
        Ok(Self::with_stores(config.sync, store, remote, online).await?)
    }

    pub async fn with_stores(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        online: bool,
    ) -> Result<Self, AppError> {
        let ctx = Arc::new(SyncContext::new(config, online));
        let records = RecordService::new(Arc::clone(&ctx), Arc::clone(&store));
        let sync = SyncService::new(ctx, store, remote);
        records.load_status().await?;

        Ok(Self { records, sync })
    }

    pub async fn shutdown(&self) {
        self.sync.stop().await;
    }
}

fn ensure_database_dir(url: &str) -> std::io::Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
