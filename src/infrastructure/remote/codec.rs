use crate::domain::entities::{Family, Membership, SyncEntity, SyncMeta, UserProfile};
use crate::domain::value_objects::{
    EntityKind, FamilyId, InviteCode, MemberRole, MembershipId, MembershipStatus, ProfileId,
    RecordVersion,
};
use crate::shared::error::StoreError;
use chrono::{DateTime, Utc};

use super::record::{RecordReference, RemoteRecord};

/// Bidirectional mapping between domain entities and remote records.
///
/// Encoding assigns every record to the configured zone and turns
/// relationship fields into zone-qualified references. Decoding tolerates
/// missing optional fields; transient local-only state (`needs_sync`,
/// `local_version`) never crosses the wire.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    zone: String,
}

impl RecordCodec {
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn encode(&self, entity: &SyncEntity) -> RemoteRecord {
        match entity {
            SyncEntity::Family(family) => self.encode_family(family),
            SyncEntity::Membership(membership) => self.encode_membership(membership),
            SyncEntity::Profile(profile) => self.encode_profile(profile),
        }
    }

    pub fn decode(&self, record: &RemoteRecord) -> Result<SyncEntity, StoreError> {
        match record.kind {
            EntityKind::Family => self.decode_family(record).map(SyncEntity::Family),
            EntityKind::Membership => self.decode_membership(record).map(SyncEntity::Membership),
            EntityKind::Profile => self.decode_profile(record).map(SyncEntity::Profile),
        }
    }

    fn encode_family(&self, family: &Family) -> RemoteRecord {
        let mut record = RemoteRecord::new(
            EntityKind::Family,
            family.id.as_uuid(),
            Some(self.zone.clone()),
        );
        record.set("name", family.name.clone().into());
        record.set("code", family.code.as_str().into());
        record.set_reference(
            "createdByUserId",
            RecordReference::new(family.created_by.as_uuid(), Some(self.zone.clone())),
        );
        record.set("createdAt", family.created_at.timestamp_millis().into());
        record
    }

    fn encode_membership(&self, membership: &Membership) -> RemoteRecord {
        let mut record = RemoteRecord::new(
            EntityKind::Membership,
            membership.id.as_uuid(),
            Some(self.zone.clone()),
        );
        record.set("role", membership.role.as_str().into());
        record.set("status", membership.status.as_str().into());
        record.set("joinedAt", membership.joined_at.timestamp_millis().into());
        if let Some(changed) = membership.last_role_change_at {
            record.set("lastRoleChangeAt", changed.timestamp_millis().into());
        }
        record.set_reference(
            "groupRef",
            RecordReference::new(membership.family_id.as_uuid(), Some(self.zone.clone())),
        );
        record.set_reference(
            "userRef",
            RecordReference::new(membership.profile_id.as_uuid(), Some(self.zone.clone())),
        );
        record
    }

    fn encode_profile(&self, profile: &UserProfile) -> RemoteRecord {
        let mut record = RemoteRecord::new(
            EntityKind::Profile,
            profile.id.as_uuid(),
            Some(self.zone.clone()),
        );
        record.set("displayName", profile.display_name.clone().into());
        record.set("externalIdHash", profile.external_id_hash.clone().into());
        if let Some(url) = &profile.avatar_url {
            record.set("avatarUrl", url.clone().into());
        }
        record.set("createdAt", profile.created_at.timestamp_millis().into());
        record
    }

    fn decode_family(&self, record: &RemoteRecord) -> Result<Family, StoreError> {
        let name = required_str(record, "name")?.to_string();
        let code = InviteCode::new(required_str(record, "code")?.to_string())
            .map_err(StoreError::InvalidData)?;
        let created_by = required_reference(record, "createdByUserId")?;
        let created_at = required_timestamp(record, "createdAt")?;

        Ok(Family {
            id: FamilyId::from_uuid(record.record_id),
            name,
            code,
            created_by: ProfileId::from_uuid(created_by.record_id),
            created_at,
            sync: remote_sync_meta(record),
        })
    }

    fn decode_membership(&self, record: &RemoteRecord) -> Result<Membership, StoreError> {
        let role: MemberRole = required_str(record, "role")?
            .parse()
            .map_err(StoreError::InvalidData)?;
        let status: MembershipStatus = required_str(record, "status")?
            .parse()
            .map_err(StoreError::InvalidData)?;
        let joined_at = required_timestamp(record, "joinedAt")?;
        let last_role_change_at = optional_timestamp(record, "lastRoleChangeAt")?;
        let group_ref = required_reference(record, "groupRef")?;
        let user_ref = required_reference(record, "userRef")?;

        Ok(Membership {
            id: MembershipId::from_uuid(record.record_id),
            family_id: FamilyId::from_uuid(group_ref.record_id),
            profile_id: ProfileId::from_uuid(user_ref.record_id),
            role,
            status,
            joined_at,
            last_role_change_at,
            sync: remote_sync_meta(record),
        })
    }

    fn decode_profile(&self, record: &RemoteRecord) -> Result<UserProfile, StoreError> {
        let display_name = required_str(record, "displayName")?.to_string();
        let external_id_hash = required_str(record, "externalIdHash")?.to_string();
        let avatar_url = record.get_str("avatarUrl").map(str::to_string);
        let created_at = required_timestamp(record, "createdAt")?;

        Ok(UserProfile {
            id: ProfileId::from_uuid(record.record_id),
            display_name,
            external_id_hash,
            avatar_url,
            created_at,
            sync: remote_sync_meta(record),
        })
    }
}

/// A decoded record matches the remote copy by construction.
fn remote_sync_meta(record: &RemoteRecord) -> SyncMeta {
    SyncMeta::synced(record.modified_at, RecordVersion::initial())
}

fn required_str<'a>(record: &'a RemoteRecord, name: &str) -> Result<&'a str, StoreError> {
    record
        .get_str(name)
        .ok_or_else(|| StoreError::InvalidData(format!("Remote record missing field {name}")))
}

fn required_timestamp(record: &RemoteRecord, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let millis = record
        .get_i64(name)
        .ok_or_else(|| StoreError::InvalidData(format!("Remote record missing field {name}")))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("Field {name} is out of range")))
}

fn optional_timestamp(
    record: &RemoteRecord,
    name: &str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    match record.get_i64(name) {
        Some(millis) => DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| StoreError::InvalidData(format!("Field {name} is out of range"))),
        None => Ok(None),
    }
}

fn required_reference(record: &RemoteRecord, name: &str) -> Result<RecordReference, StoreError> {
    record
        .get_reference(name)
        .ok_or_else(|| StoreError::InvalidData(format!("Remote record missing reference {name}")))
}
