use crate::domain::entities::SyncMeta;
use crate::domain::value_objects::{FamilyId, MemberRole, MembershipId, MembershipStatus, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a profile to a family with a role. Removal is a soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub family_id: FamilyId,
    pub profile_id: ProfileId,
    pub role: MemberRole,
    pub status: MembershipStatus,
    pub joined_at: DateTime<Utc>,
    pub last_role_change_at: Option<DateTime<Utc>>,
    pub sync: SyncMeta,
}

impl Membership {
    pub fn new(
        family_id: FamilyId,
        profile_id: ProfileId,
        role: MemberRole,
        status: MembershipStatus,
    ) -> Self {
        Self {
            id: MembershipId::generate(),
            family_id,
            profile_id,
            role,
            status,
            joined_at: Utc::now(),
            last_role_change_at: None,
            sync: SyncMeta::dirty(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}
