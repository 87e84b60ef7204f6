use crate::domain::entities::{Family, Membership, SyncMeta, UserProfile};
use crate::domain::value_objects::{EntityKind, RecordVersion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniform envelope over the three syncable entity types, so the
/// orchestrator's pass loop is a compile-time-checked list instead of a
/// runtime type check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEntity {
    Family(Family),
    Membership(Membership),
    Profile(UserProfile),
}

impl SyncEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            SyncEntity::Family(_) => EntityKind::Family,
            SyncEntity::Membership(_) => EntityKind::Membership,
            SyncEntity::Profile(_) => EntityKind::Profile,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            SyncEntity::Family(f) => f.id.as_uuid(),
            SyncEntity::Membership(m) => m.id.as_uuid(),
            SyncEntity::Profile(p) => p.id.as_uuid(),
        }
    }

    pub fn sync(&self) -> &SyncMeta {
        match self {
            SyncEntity::Family(f) => &f.sync,
            SyncEntity::Membership(m) => &m.sync,
            SyncEntity::Profile(p) => &p.sync,
        }
    }

    pub fn version(&self) -> RecordVersion {
        self.sync().local_version
    }
}

impl From<Family> for SyncEntity {
    fn from(value: Family) -> Self {
        SyncEntity::Family(value)
    }
}

impl From<Membership> for SyncEntity {
    fn from(value: Membership) -> Self {
        SyncEntity::Membership(value)
    }
}

impl From<UserProfile> for SyncEntity {
    fn from(value: UserProfile) -> Self {
        SyncEntity::Profile(value)
    }
}
