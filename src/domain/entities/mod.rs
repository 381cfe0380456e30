pub mod intake_record;
pub mod offline;

pub use intake_record::{IntakeRecord, LineItem};
pub use offline::{
    LocalRecord, MergeDecision, PullOutcome, PushOutcome, PushSkipReason, SyncQueueEntry,
    SyncQueueEntryDraft, SyncReport, SyncStatusSnapshot,
};
