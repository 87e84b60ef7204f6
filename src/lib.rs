//! Local-first synchronization engine for the TribeBoard family organizer.
//!
//! Keeps an on-device SQLite store and a remote record store consistent
//! under unreliable connectivity, concurrent local/remote mutation, and
//! partial failure. Conflict resolution is last-writer-wins per record;
//! delivery to the remote store is at-least-once with idempotent upsert.

pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{AccountStatus, LocalStore, RemoteTransport};
pub use application::services::{
    ChangeReason, ConnectivityEvent, ConnectivityMonitor, FamilyService, RemoteNotification,
    SyncEvent, SyncOrchestrator, SyncStatus,
};
pub use domain::entities::{Family, Membership, SyncEntity, SyncMeta, UserProfile};
pub use domain::value_objects::{
    EntityKind, FamilyId, InviteCode, MemberRole, MembershipId, MembershipStatus, ProfileId,
    RecordVersion, SyncMode,
};
pub use engine::SyncEngine;
pub use infrastructure::database::SqliteLocalStore;
pub use infrastructure::remote::{
    InMemoryTransport, Predicate, RecordCodec, RecordReference, RemoteRecord, RemoteSyncClient,
};
pub use shared::config::SyncConfig;
pub use shared::error::{RemoteError, StoreError, SyncError};
pub use shared::validation::{BasicValidator, FieldValidator};

/// Initializes tracing output. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tribeboard_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
