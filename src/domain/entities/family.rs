use crate::domain::entities::SyncMeta;
use crate::domain::value_objects::{FamilyId, InviteCode, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A family group, the parent entity every membership references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    pub code: InviteCode,
    pub created_by: ProfileId,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMeta,
}

impl Family {
    pub fn new(name: String, code: InviteCode, created_by: ProfileId) -> Self {
        Self {
            id: FamilyId::generate(),
            name,
            code,
            created_by,
            created_at: Utc::now(),
            sync: SyncMeta::dirty(),
        }
    }
}
