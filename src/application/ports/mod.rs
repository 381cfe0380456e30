pub mod local_store;
pub mod remote_store;

pub use local_store::{LocalStore, RecordFilter};
pub use remote_store::{RemoteChange, RemoteStore, RemoteStoreError, Subscription};
