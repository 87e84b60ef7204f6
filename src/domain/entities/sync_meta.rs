use crate::domain::value_objects::RecordVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync bookkeeping carried by every syncable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// True whenever local state has diverged from the last known remote
    /// state. Cleared only after the corresponding remote write succeeds.
    pub needs_sync: bool,
    /// Timestamp of the last successful upload or confirmed-matching
    /// download. Only ever moves forward.
    pub last_sync_date: Option<DateTime<Utc>>,
    /// Monotonic counter bumped on every local write.
    pub local_version: RecordVersion,
}

impl SyncMeta {
    /// Metadata for a freshly created (never uploaded) record.
    pub fn dirty() -> Self {
        Self {
            needs_sync: true,
            last_sync_date: None,
            local_version: RecordVersion::initial(),
        }
    }

    /// Metadata for a record whose state matches the remote copy as of
    /// `synced_at`.
    pub fn synced(synced_at: DateTime<Utc>, version: RecordVersion) -> Self {
        Self {
            needs_sync: false,
            last_sync_date: Some(synced_at),
            local_version: version,
        }
    }
}
