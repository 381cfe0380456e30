pub mod codec;
pub mod memory;
pub mod realtime;
pub mod rest_client;
pub mod unconfigured;

pub use codec::{RemoteRow, to_local_shape, to_remote_shape};
pub use memory::InMemoryRemoteStore;
pub use realtime::{RealtimeClient, RealtimeConfig};
pub use rest_client::RestRemoteStore;
pub use unconfigured::UnconfiguredRemoteStore;
