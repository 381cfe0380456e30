pub mod pull_service;
pub mod push_service;
pub mod record_service;
pub mod sync_context;
pub mod sync_queue_service;
pub mod sync_service;

pub use pull_service::PullService;
pub use push_service::PushService;
pub use record_service::RecordService;
pub use sync_context::SyncContext;
pub use sync_queue_service::SyncQueueService;
pub use sync_service::SyncService;
