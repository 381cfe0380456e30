use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::RecordId;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteStoreError {
    #[error("remote store is not configured")]
    NotConfigured,

    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("row already exists: {0}")]
    Conflict(String),

    #[error("remote rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode remote response: {0}")]
    Decode(String),

    #[error("realtime channel error: {0}")]
    Realtime(String),
}

/// A row change pushed by the remote for the intake table.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    Inserted(IntakeRecord),
    Updated(IntakeRecord),
    Deleted(RecordId),
}

/// Handle for a live realtime subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A subscription that never delivers anything.
    pub fn inert() -> Self {
        Self { task: None }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The hosted table holding intake records. Implementations translate between
/// [`IntakeRecord`] and their own row shape; the row shape never crosses this trait.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Fails with [`RemoteStoreError::Conflict`] when the id already exists.
    async fn insert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError>;
    async fn upsert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError>;
    /// Returns `false` when the row was already absent.
    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteStoreError>;
    /// Every row, ordered by last modification ascending.
    async fn select_all(&self) -> Result<Vec<IntakeRecord>, RemoteStoreError>;
    /// Streams row changes into `sink` until the returned handle is dropped.
    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<RemoteChange>,
    ) -> Result<Subscription, RemoteStoreError>;
}
