pub mod local_record;
pub mod sync_outcome;
pub mod sync_queue_entry;
pub mod sync_status_snapshot;

pub use local_record::LocalRecord;
pub use sync_outcome::{MergeDecision, PullOutcome, PushOutcome, PushSkipReason, SyncReport};
pub use sync_queue_entry::{SyncQueueEntry, SyncQueueEntryDraft};
pub use sync_status_snapshot::SyncStatusSnapshot;
