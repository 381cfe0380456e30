//! Offline-first local cache and synchronization engine for consignment intake records.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::services::{RecordService, SyncService};
pub use domain::{IntakeRecord, LineItem, RecordId, RecordStatus, SyncStatusSnapshot};
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;
