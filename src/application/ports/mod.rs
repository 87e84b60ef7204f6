pub mod local_store;
pub mod remote_transport;

pub use local_store::LocalStore;
pub use remote_transport::{AccountStatus, RemoteTransport};
