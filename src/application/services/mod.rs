pub mod connectivity;
pub mod events;
pub mod family_service;
pub mod sync_orchestrator;

pub use connectivity::ConnectivityMonitor;
pub use events::{ChangeReason, ConnectivityEvent, RemoteNotification, SyncEvent, SyncStatus};
pub use family_service::FamilyService;
pub use sync_orchestrator::SyncOrchestrator;
