pub mod consigner_type;
pub mod offline;
pub mod record_id;
pub mod record_status;

pub use consigner_type::ConsignerType;
pub use offline::{SyncOperation, SyncQueueId, SyncState};
pub use record_id::RecordId;
pub use record_status::RecordStatus;
