pub mod client;
pub mod codec;
pub mod memory;
pub mod predicate;
pub mod record;

pub use client::RemoteSyncClient;
pub use codec::RecordCodec;
pub use memory::InMemoryTransport;
pub use predicate::Predicate;
pub use record::{RecordReference, RemoteRecord};
