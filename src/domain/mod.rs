pub mod entities;
pub mod value_objects;

pub use entities::{IntakeRecord, LineItem, LocalRecord, SyncQueueEntry, SyncStatusSnapshot};
pub use value_objects::{ConsignerType, RecordId, RecordStatus, SyncOperation, SyncState};
