use crate::application::ports::remote_store::{
    RemoteChange, RemoteStore, RemoteStoreError, Subscription,
};
use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::RecordId;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Used when no remote URL is configured. The engine runs local-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredRemoteStore;

#[async_trait]
impl RemoteStore for UnconfiguredRemoteStore {
    fn is_configured(&self) -> bool {
        false
    }

    async fn insert(&self, _record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        Err(RemoteStoreError::NotConfigured)
    }

    async fn upsert(&self, _record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        Err(RemoteStoreError::NotConfigured)
    }

    async fn delete(&self, _id: &RecordId) -> Result<bool, RemoteStoreError> {
        Err(RemoteStoreError::NotConfigured)
    }

    async fn select_all(&self) -> Result<Vec<IntakeRecord>, RemoteStoreError> {
        Err(RemoteStoreError::NotConfigured)
    }

    async fn subscribe(
        &self,
        _sink: mpsc::UnboundedSender<RemoteChange>,
    ) -> Result<Subscription, RemoteStoreError> {
        Ok(Subscription::inert())
    }
}
