use crate::domain::value_objects::{EntityKind, SyncMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a change notification fired. The payload carries no field data; the
/// receiver re-fetches the record by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Created,
    Updated,
    Deleted,
}

/// Inbound change notification handed to the engine by the app's
/// notification layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNotification {
    pub kind: EntityKind,
    pub record_id: Uuid,
    pub reason: ChangeReason,
}

/// Connectivity transitions, published on a broadcast channel alongside the
/// watch-channel mode value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivityEvent {
    /// Connectivity was lost; `pending` is the dirty-record count at the
    /// moment of the transition, for the user-facing notification.
    WentOffline { pending: u64 },
    WentOnline,
}

/// Ephemeral, process-wide sync state. `Completed` and `Failed` reset to
/// `Idle` after a short display window.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing {
        /// Fraction of the pass completed, across the three entity phases.
        progress: f32,
    },
    Completed,
    Failed(String),
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing { .. })
    }
}

/// Typed event stream owned by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ModeChanged(SyncMode),
    StatusChanged(SyncStatus),
    /// A local record was overwritten from a remote copy.
    RecordChanged { kind: EntityKind, record_id: Uuid },
    PassCompleted { uploaded: usize, failed: usize },
}
