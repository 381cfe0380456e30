pub mod sync_operation;
pub mod sync_queue_id;
pub mod sync_state;

pub use sync_operation::SyncOperation;
pub use sync_queue_id::SyncQueueId;
pub use sync_state::SyncState;
