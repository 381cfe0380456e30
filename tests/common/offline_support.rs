use std::sync::Arc;

use intake_sync::application::ports::{LocalStore, RemoteStore};
use intake_sync::domain::entities::IntakeRecord;
use intake_sync::domain::value_objects::RecordId;
use intake_sync::infrastructure::offline::SqliteLocalStore;
use intake_sync::infrastructure::remote::InMemoryRemoteStore;
use intake_sync::shared::config::SyncConfig;
use intake_sync::AppState;

pub struct EngineTestContext {
    pub state: AppState,
    pub store: Arc<SqliteLocalStore>,
    pub remote: Arc<InMemoryRemoteStore>,
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        auto_sync: false,
        ..SyncConfig::default()
    }
}

pub async fn setup_engine(online: bool) -> EngineTestContext {
    setup_engine_with(sync_config(), online).await
}

pub async fn setup_engine_with(config: SyncConfig, online: bool) -> EngineTestContext {
    let store = Arc::new(SqliteLocalStore::in_memory().await.expect("in-memory sqlite"));
    let remote = Arc::new(InMemoryRemoteStore::new());
    let state = AppState::with_stores(
        config,
        store.clone() as Arc<dyn LocalStore>,
        remote.clone() as Arc<dyn RemoteStore>,
        online,
    )
    .await
    .expect("app state");

    EngineTestContext {
        state,
        store,
        remote,
    }
}

pub async fn setup_with_remote(remote: Arc<dyn RemoteStore>, online: bool) -> AppState {
    let store = Arc::new(SqliteLocalStore::in_memory().await.expect("in-memory sqlite"));
    AppState::with_stores(sync_config(), store, remote, online)
        .await
        .expect("app state")
}

pub fn record_id(value: &str) -> RecordId {
    RecordId::new(value.to_string()).expect("record id")
}

pub fn new_consigner(id: &str, name: &str) -> IntakeRecord {
    IntakeRecord::for_new_consigner(record_id(id), name)
}
