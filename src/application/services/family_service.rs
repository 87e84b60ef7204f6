use crate::application::ports::LocalStore;
use crate::domain::entities::{Family, Membership};
use crate::domain::value_objects::{InviteCode, MemberRole, MembershipStatus, ProfileId};
use crate::shared::error::{StoreError, StoreResult};
use std::sync::Arc;
use tracing::info;

/// High-level family flows composed from the store operations: creating a
/// family with its admin, and joining one by invite code.
pub struct FamilyService {
    store: Arc<dyn LocalStore>,
}

impl FamilyService {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Creates a family and makes the creator its active primary admin.
    pub async fn create_family(
        &self,
        name: &str,
        creator: ProfileId,
    ) -> StoreResult<(Family, Membership)> {
        let family = self.store.create_family(name, creator).await?;
        let membership = self
            .store
            .create_membership(
                family.id,
                creator,
                MemberRole::ParentAdmin,
                MembershipStatus::Active,
            )
            .await?;
        info!(family_id = %family.id, code = %family.code, "Family created with admin");
        Ok((family, membership))
    }

    /// Looks up a family by invite code and creates a pending membership
    /// for the joining profile. The membership is dirty and propagates on
    /// the next pass; activation is an explicit role/status change later.
    pub async fn join_family(
        &self,
        code: &InviteCode,
        profile_id: ProfileId,
        role: MemberRole,
    ) -> StoreResult<Membership> {
        let family = self
            .store
            .fetch_family_by_code(code)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("No family with code {code}")))?;
        let membership = self
            .store
            .create_membership(family.id, profile_id, role, MembershipStatus::Pending)
            .await?;
        info!(family_id = %family.id, membership_id = %membership.id, "Joined family");
        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::SqliteLocalStore;
    use crate::shared::validation::BasicValidator;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> (Arc<SqliteLocalStore>, FamilyService) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Arc::new(SqliteLocalStore::new(pool, Arc::new(BasicValidator)));
        store.initialize().await.unwrap();
        let service = FamilyService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_create_family_makes_creator_admin() {
        let (store, service) = service().await;
        let creator = store.create_profile("Maria", "hash", None).await.unwrap();

        let (family, membership) = service.create_family("Lopez", creator.id).await.unwrap();
        assert_eq!(membership.family_id, family.id);
        assert_eq!(membership.role, MemberRole::ParentAdmin);
        assert_eq!(membership.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn test_join_family_creates_pending_membership() {
        let (store, service) = service().await;
        let creator = store.create_profile("Maria", "hash-m", None).await.unwrap();
        let (family, _) = service.create_family("Lopez", creator.id).await.unwrap();

        let joiner = store.create_profile("Diego", "hash-d", None).await.unwrap();
        let membership = service
            .join_family(&family.code, joiner.id, MemberRole::Parent)
            .await
            .unwrap();

        assert_eq!(membership.family_id, family.id);
        assert_eq!(membership.status, MembershipStatus::Pending);
        assert!(membership.sync.needs_sync);
    }

    #[tokio::test]
    async fn test_join_family_rejects_unknown_code() {
        let (store, service) = service().await;
        let joiner = store.create_profile("Diego", "hash-d", None).await.unwrap();
        let code = InviteCode::new("ZZ99YY".to_string()).unwrap();

        let err = service
            .join_family(&code, joiner.id, MemberRole::Parent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
