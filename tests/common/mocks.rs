use async_trait::async_trait;
use mockall::mock;
use tokio::sync::mpsc;

use intake_sync::application::ports::remote_store::{
    RemoteChange, RemoteStore, RemoteStoreError, Subscription,
};
use intake_sync::domain::entities::IntakeRecord;
use intake_sync::domain::value_objects::RecordId;

mock! {
    pub RemoteStorePort {}

    #[async_trait]
    impl RemoteStore for RemoteStorePort {
        fn is_configured(&self) -> bool;
        async fn insert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError>;
        async fn upsert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError>;
        async fn delete(&self, id: &RecordId) -> Result<bool, RemoteStoreError>;
        async fn select_all(&self) -> Result<Vec<IntakeRecord>, RemoteStoreError>;
        async fn subscribe(
            &self,
            sink: mpsc::UnboundedSender<RemoteChange>,
        ) -> Result<Subscription, RemoteStoreError>;
    }
}

pub type MockRemoteStore = MockRemoteStorePort;
