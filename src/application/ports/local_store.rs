use crate::domain::entities::{Family, Membership, SyncEntity, UserProfile};
use crate::domain::value_objects::{
    EntityKind, FamilyId, InviteCode, MemberRole, MembershipId, MembershipStatus, ProfileId,
    RecordVersion,
};
use crate::shared::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The on-device durable store: validated CRUD plus the sync bookkeeping
/// the orchestrator drives.
///
/// Fetches return `Ok(None)` for "not found"; errors are reserved for
/// validation, constraint, and storage failures. The implementation is the
/// single writer for all local state.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn create_family(&self, name: &str, created_by: ProfileId) -> StoreResult<Family>;

    async fn create_profile(
        &self,
        display_name: &str,
        external_id_hash: &str,
        avatar_url: Option<&str>,
    ) -> StoreResult<UserProfile>;

    /// Creates a membership. An active primary role is rejected with
    /// `ConstraintViolation` when the family already has an active holder.
    async fn create_membership(
        &self,
        family_id: FamilyId,
        profile_id: ProfileId,
        role: MemberRole,
        status: MembershipStatus,
    ) -> StoreResult<Membership>;

    async fn fetch_family(&self, id: FamilyId) -> StoreResult<Option<Family>>;
    async fn fetch_family_by_code(&self, code: &InviteCode) -> StoreResult<Option<Family>>;
    async fn fetch_profile(&self, id: ProfileId) -> StoreResult<Option<UserProfile>>;
    async fn fetch_membership(&self, id: MembershipId) -> StoreResult<Option<Membership>>;
    async fn fetch_memberships_for_family(
        &self,
        family_id: FamilyId,
    ) -> StoreResult<Vec<Membership>>;

    async fn update_family_name(&self, id: FamilyId, name: &str) -> StoreResult<Family>;

    async fn update_profile(
        &self,
        id: ProfileId,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> StoreResult<UserProfile>;

    /// Changes a membership's role, enforcing the single-primary-holder
    /// invariant; the check and write are one transaction.
    async fn assign_role(&self, id: MembershipId, role: MemberRole) -> StoreResult<Membership>;

    /// Sets the status to removed rather than deleting, and dirties the
    /// row so the removal propagates remotely.
    async fn soft_delete_membership(&self, id: MembershipId) -> StoreResult<Membership>;

    /// All records of a type with `needs_sync` set. Safe to call while a
    /// pass is concurrently clearing flags on other records.
    async fn fetch_dirty(&self, kind: EntityKind) -> StoreResult<Vec<SyncEntity>>;

    /// Fetches one record as a sync envelope, whatever its kind.
    async fn fetch_entity(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<SyncEntity>>;

    /// Clears the dirty flag and advances `last_sync_date`, but only when
    /// the stored version still equals `version`, so an upload of a stale
    /// version is a no-op. Returns whether the flag was cleared. Idempotent.
    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: Uuid,
        version: RecordVersion,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Overwrites local fields from a remote copy that won conflict
    /// resolution: clears `needs_sync` and moves `last_sync_date` forward
    /// to the remote modification time.
    async fn apply_remote(&self, entity: SyncEntity, modified_at: DateTime<Utc>)
        -> StoreResult<()>;

    /// Count of dirty records across all entity types.
    async fn pending_count(&self) -> StoreResult<u64>;

    /// Commit point for callers that batch mutations. Mutations here commit
    /// immediately, so this never errors, including on an empty commit.
    async fn save(&self) -> StoreResult<()>;
}
