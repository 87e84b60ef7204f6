use crate::application::ports::LocalStore;
use crate::domain::entities::{Family, Membership, SyncEntity, SyncMeta, UserProfile};
use crate::domain::value_objects::{
    EntityKind, FamilyId, InviteCode, MemberRole, MembershipId, MembershipStatus, ProfileId,
    RecordVersion,
};
use crate::shared::error::{StoreError, StoreResult};
use crate::shared::validation::FieldValidator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::schema;

const CODE_ALLOCATION_ATTEMPTS: u32 = 8;

/// SQLite-backed [`LocalStore`]. Owns the store handle and is the single
/// writer for all local state; every mutation bumps `local_version` and
/// sets `needs_sync` in the same statement.
pub struct SqliteLocalStore {
    pool: Pool<Sqlite>,
    validator: Arc<dyn FieldValidator>,
}

impl SqliteLocalStore {
    pub fn new(pool: Pool<Sqlite>, validator: Arc<dyn FieldValidator>) -> Self {
        Self { pool, validator }
    }

    /// Applies the schema. Safe to call on every start.
    pub async fn initialize(&self) -> StoreResult<()> {
        schema::apply(&self.pool).await
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn validate_fields(&self, fields: &[(&str, &str)]) -> StoreResult<()> {
        let mut messages = Vec::new();
        for (field, value) in fields {
            if let Err(message) = self.validator.validate(field, value) {
                messages.push(message);
            }
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(StoreError::ValidationFailed(messages))
        }
    }

    async fn allocate_code(&self) -> StoreResult<InviteCode> {
        for _ in 0..CODE_ALLOCATION_ATTEMPTS {
            let code = InviteCode::generate();
            let taken = sqlx::query("SELECT 1 FROM families WHERE code = ?1")
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await?;
            if taken.is_none() {
                return Ok(code);
            }
        }
        Err(StoreError::ConstraintViolation(
            "Could not allocate a unique invite code".to_string(),
        ))
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("Timestamp out of range: {millis}")))
}

fn from_opt_millis(millis: Option<i64>) -> StoreResult<Option<DateTime<Utc>>> {
    millis.map(from_millis).transpose()
}

fn sync_meta_from_row(row: &SqliteRow) -> StoreResult<SyncMeta> {
    Ok(SyncMeta {
        needs_sync: row.try_get::<i64, _>("needs_sync")? != 0,
        last_sync_date: from_opt_millis(row.try_get::<Option<i64>, _>("last_sync_date")?)?,
        local_version: RecordVersion::from(row.try_get::<i64, _>("local_version")?),
    })
}

fn family_from_row(row: &SqliteRow) -> StoreResult<Family> {
    Ok(Family {
        id: FamilyId::parse(&row.try_get::<String, _>("id")?).map_err(StoreError::InvalidData)?,
        name: row.try_get("name")?,
        code: InviteCode::new(row.try_get::<String, _>("code")?)
            .map_err(StoreError::InvalidData)?,
        created_by: ProfileId::parse(&row.try_get::<String, _>("created_by")?)
            .map_err(StoreError::InvalidData)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        sync: sync_meta_from_row(row)?,
    })
}

fn profile_from_row(row: &SqliteRow) -> StoreResult<UserProfile> {
    Ok(UserProfile {
        id: ProfileId::parse(&row.try_get::<String, _>("id")?).map_err(StoreError::InvalidData)?,
        display_name: row.try_get("display_name")?,
        external_id_hash: row.try_get("external_id_hash")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        sync: sync_meta_from_row(row)?,
    })
}

fn membership_from_row(row: &SqliteRow) -> StoreResult<Membership> {
    Ok(Membership {
        id: MembershipId::parse(&row.try_get::<String, _>("id")?)
            .map_err(StoreError::InvalidData)?,
        family_id: FamilyId::parse(&row.try_get::<String, _>("family_id")?)
            .map_err(StoreError::InvalidData)?,
        profile_id: ProfileId::parse(&row.try_get::<String, _>("profile_id")?)
            .map_err(StoreError::InvalidData)?,
        role: MemberRole::from_str(&row.try_get::<String, _>("role")?)
            .map_err(StoreError::InvalidData)?,
        status: MembershipStatus::from_str(&row.try_get::<String, _>("status")?)
            .map_err(StoreError::InvalidData)?,
        joined_at: from_millis(row.try_get("joined_at")?)?,
        last_role_change_at: from_opt_millis(row.try_get("last_role_change_at")?)?,
        sync: sync_meta_from_row(row)?,
    })
}

fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Family => "families",
        EntityKind::Membership => "memberships",
        EntityKind::Profile => "profiles",
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn create_family(&self, name: &str, created_by: ProfileId) -> StoreResult<Family> {
        self.validate_fields(&[("family_name", name)])?;
        let code = self.allocate_code().await?;
        let family = Family::new(name.trim().to_string(), code, created_by);

        sqlx::query(
            r#"
            INSERT INTO families (id, name, code, created_by, created_at, needs_sync, last_sync_date, local_version)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, NULL, 1)
            "#,
        )
        .bind(family.id.to_string())
        .bind(&family.name)
        .bind(family.code.as_str())
        .bind(family.created_by.to_string())
        .bind(to_millis(family.created_at))
        .execute(&self.pool)
        .await?;

        debug!(family_id = %family.id, code = %family.code, "Created family");
        Ok(family)
    }

    async fn create_profile(
        &self,
        display_name: &str,
        external_id_hash: &str,
        avatar_url: Option<&str>,
    ) -> StoreResult<UserProfile> {
        self.validate_fields(&[
            ("display_name", display_name),
            ("external_id_hash", external_id_hash),
            ("avatar_url", avatar_url.unwrap_or("")),
        ])?;
        let profile = UserProfile::new(
            display_name.trim().to_string(),
            external_id_hash.to_string(),
            avatar_url.map(str::to_string),
        );

        sqlx::query(
            r#"
            INSERT INTO profiles (id, display_name, external_id_hash, avatar_url, created_at, needs_sync, last_sync_date, local_version)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, NULL, 1)
            "#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.display_name)
        .bind(&profile.external_id_hash)
        .bind(&profile.avatar_url)
        .bind(to_millis(profile.created_at))
        .execute(&self.pool)
        .await?;

        debug!(profile_id = %profile.id, "Created profile");
        Ok(profile)
    }

    async fn create_membership(
        &self,
        family_id: FamilyId,
        profile_id: ProfileId,
        role: MemberRole,
        status: MembershipStatus,
    ) -> StoreResult<Membership> {
        // IMMEDIATE takes the write lock before the holder check runs, so
        // two racing writers serialize and the loser sees the committed row.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let family_exists = sqlx::query("SELECT 1 FROM families WHERE id = ?1")
            .bind(family_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if family_exists.is_none() {
            return Err(StoreError::NotFound(format!("Family {family_id}")));
        }

        let duplicate = sqlx::query(
            r#"
            SELECT 1 FROM memberships
            WHERE family_id = ?1 AND profile_id = ?2 AND status != 'removed'
            "#,
        )
        .bind(family_id.to_string())
        .bind(profile_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        if duplicate.is_some() {
            return Err(StoreError::ConstraintViolation(format!(
                "Profile {profile_id} is already a member of family {family_id}"
            )));
        }

        if role.is_primary() && status == MembershipStatus::Active {
            let holder = sqlx::query(
                r#"
                SELECT 1 FROM memberships
                WHERE family_id = ?1 AND role = ?2 AND status = 'active'
                "#,
            )
            .bind(family_id.to_string())
            .bind(role.as_str())
            .fetch_optional(&mut *tx)
            .await?;
            if holder.is_some() {
                return Err(StoreError::ConstraintViolation(format!(
                    "Family {family_id} already has an active {role}"
                )));
            }
        }

        let membership = Membership::new(family_id, profile_id, role, status);
        sqlx::query(
            r#"
            INSERT INTO memberships (id, family_id, profile_id, role, status, joined_at, last_role_change_at, needs_sync, last_sync_date, local_version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 1, NULL, 1)
            "#,
        )
        .bind(membership.id.to_string())
        .bind(membership.family_id.to_string())
        .bind(membership.profile_id.to_string())
        .bind(membership.role.as_str())
        .bind(membership.status.as_str())
        .bind(to_millis(membership.joined_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(membership_id = %membership.id, role = %membership.role, "Created membership");
        Ok(membership)
    }

    async fn fetch_family(&self, id: FamilyId) -> StoreResult<Option<Family>> {
        let row = sqlx::query("SELECT * FROM families WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(family_from_row).transpose()
    }

    async fn fetch_family_by_code(&self, code: &InviteCode) -> StoreResult<Option<Family>> {
        let row = sqlx::query("SELECT * FROM families WHERE code = ?1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(family_from_row).transpose()
    }

    async fn fetch_profile(&self, id: ProfileId) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn fetch_membership(&self, id: MembershipId) -> StoreResult<Option<Membership>> {
        let row = sqlx::query("SELECT * FROM memberships WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn fetch_memberships_for_family(
        &self,
        family_id: FamilyId,
    ) -> StoreResult<Vec<Membership>> {
        let rows = sqlx::query(
            "SELECT * FROM memberships WHERE family_id = ?1 ORDER BY joined_at ASC",
        )
        .bind(family_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn update_family_name(&self, id: FamilyId, name: &str) -> StoreResult<Family> {
        self.validate_fields(&[("family_name", name)])?;
        let result = sqlx::query(
            r#"
            UPDATE families
            SET name = ?1, needs_sync = 1, local_version = local_version + 1
            WHERE id = ?2
            "#,
        )
        .bind(name.trim())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Family {id}")));
        }
        self.fetch_family(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Family {id}")))
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> StoreResult<UserProfile> {
        self.validate_fields(&[
            ("display_name", display_name),
            ("avatar_url", avatar_url.unwrap_or("")),
        ])?;
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET display_name = ?1, avatar_url = ?2, needs_sync = 1, local_version = local_version + 1
            WHERE id = ?3
            "#,
        )
        .bind(display_name.trim())
        .bind(avatar_url)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Profile {id}")));
        }
        self.fetch_profile(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Profile {id}")))
    }

    async fn assign_role(&self, id: MembershipId, role: MemberRole) -> StoreResult<Membership> {
        // IMMEDIATE takes the write lock before the holder check runs, so
        // two racing writers serialize and the loser sees the committed row.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let row = sqlx::query("SELECT * FROM memberships WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let membership = match row.as_ref() {
            Some(row) => membership_from_row(row)?,
            None => return Err(StoreError::NotFound(format!("Membership {id}"))),
        };

        if role.is_primary() {
            let holder = sqlx::query(
                r#"
                SELECT 1 FROM memberships
                WHERE family_id = ?1 AND role = ?2 AND status = 'active' AND id != ?3
                "#,
            )
            .bind(membership.family_id.to_string())
            .bind(role.as_str())
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
            if holder.is_some() {
                return Err(StoreError::ConstraintViolation(format!(
                    "Family {} already has an active {role}",
                    membership.family_id
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE memberships
            SET role = ?1, last_role_change_at = ?2, needs_sync = 1, local_version = local_version + 1
            WHERE id = ?3
            "#,
        )
        .bind(role.as_str())
        .bind(to_millis(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(membership_id = %id, role = %role, "Changed membership role");
        self.fetch_membership(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Membership {id}")))
    }

    async fn soft_delete_membership(&self, id: MembershipId) -> StoreResult<Membership> {
        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET status = 'removed', needs_sync = 1, local_version = local_version + 1
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Membership {id}")));
        }
        debug!(membership_id = %id, "Soft-deleted membership");
        self.fetch_membership(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Membership {id}")))
    }

    async fn fetch_dirty(&self, kind: EntityKind) -> StoreResult<Vec<SyncEntity>> {
        match kind {
            EntityKind::Family => {
                let rows =
                    sqlx::query("SELECT * FROM families WHERE needs_sync = 1 ORDER BY created_at")
                        .fetch_all(&self.pool)
                        .await?;
                rows.iter()
                    .map(|row| family_from_row(row).map(SyncEntity::Family))
                    .collect()
            }
            EntityKind::Membership => {
                let rows = sqlx::query(
                    "SELECT * FROM memberships WHERE needs_sync = 1 ORDER BY joined_at",
                )
                .fetch_all(&self.pool)
                .await?;
                rows.iter()
                    .map(|row| membership_from_row(row).map(SyncEntity::Membership))
                    .collect()
            }
            EntityKind::Profile => {
                let rows =
                    sqlx::query("SELECT * FROM profiles WHERE needs_sync = 1 ORDER BY created_at")
                        .fetch_all(&self.pool)
                        .await?;
                rows.iter()
                    .map(|row| profile_from_row(row).map(SyncEntity::Profile))
                    .collect()
            }
        }
    }

    async fn fetch_entity(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<SyncEntity>> {
        match kind {
            EntityKind::Family => Ok(self
                .fetch_family(FamilyId::from_uuid(id))
                .await?
                .map(SyncEntity::Family)),
            EntityKind::Membership => Ok(self
                .fetch_membership(MembershipId::from_uuid(id))
                .await?
                .map(SyncEntity::Membership)),
            EntityKind::Profile => Ok(self
                .fetch_profile(ProfileId::from_uuid(id))
                .await?
                .map(SyncEntity::Profile)),
        }
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: Uuid,
        version: RecordVersion,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // The version guard makes an upload of a stale version a no-op: a
        // local edit after upload initiation bumps local_version, and the
        // row no longer matches.
        let sql = format!(
            r#"
            UPDATE {table}
            SET needs_sync = 0, last_sync_date = MAX(COALESCE(last_sync_date, 0), ?1)
            WHERE id = ?2 AND local_version = ?3
            "#,
            table = table_for(kind)
        );
        let result = sqlx::query(&sql)
            .bind(to_millis(at))
            .bind(id.to_string())
            .bind(version.as_i64())
            .execute(&self.pool)
            .await?;
        let cleared = result.rows_affected() > 0;
        if !cleared {
            debug!(kind = %kind, id = %id, version = %version, "mark_synced skipped: version moved");
        }
        Ok(cleared)
    }

    async fn apply_remote(
        &self,
        entity: SyncEntity,
        modified_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        match &entity {
            SyncEntity::Family(family) => {
                sqlx::query(
                    r#"
                    INSERT INTO families (id, name, code, created_by, created_at, needs_sync, last_sync_date, local_version)
                    VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 1)
                    ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        code = excluded.code,
                        created_by = excluded.created_by,
                        created_at = excluded.created_at,
                        needs_sync = 0,
                        last_sync_date = MAX(COALESCE(families.last_sync_date, 0), excluded.last_sync_date),
                        local_version = families.local_version + 1
                    "#,
                )
                .bind(family.id.to_string())
                .bind(&family.name)
                .bind(family.code.as_str())
                .bind(family.created_by.to_string())
                .bind(to_millis(family.created_at))
                .bind(to_millis(modified_at))
                .execute(&self.pool)
                .await?;
            }
            SyncEntity::Membership(membership) => {
                sqlx::query(
                    r#"
                    INSERT INTO memberships (id, family_id, profile_id, role, status, joined_at, last_role_change_at, needs_sync, last_sync_date, local_version)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, 1)
                    ON CONFLICT(id) DO UPDATE SET
                        family_id = excluded.family_id,
                        profile_id = excluded.profile_id,
                        role = excluded.role,
                        status = excluded.status,
                        joined_at = excluded.joined_at,
                        last_role_change_at = excluded.last_role_change_at,
                        needs_sync = 0,
                        last_sync_date = MAX(COALESCE(memberships.last_sync_date, 0), excluded.last_sync_date),
                        local_version = memberships.local_version + 1
                    "#,
                )
                .bind(membership.id.to_string())
                .bind(membership.family_id.to_string())
                .bind(membership.profile_id.to_string())
                .bind(membership.role.as_str())
                .bind(membership.status.as_str())
                .bind(to_millis(membership.joined_at))
                .bind(membership.last_role_change_at.map(to_millis))
                .bind(to_millis(modified_at))
                .execute(&self.pool)
                .await?;
            }
            SyncEntity::Profile(profile) => {
                sqlx::query(
                    r#"
                    INSERT INTO profiles (id, display_name, external_id_hash, avatar_url, created_at, needs_sync, last_sync_date, local_version)
                    VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 1)
                    ON CONFLICT(id) DO UPDATE SET
                        display_name = excluded.display_name,
                        external_id_hash = excluded.external_id_hash,
                        avatar_url = excluded.avatar_url,
                        created_at = excluded.created_at,
                        needs_sync = 0,
                        last_sync_date = MAX(COALESCE(profiles.last_sync_date, 0), excluded.last_sync_date),
                        local_version = profiles.local_version + 1
                    "#,
                )
                .bind(profile.id.to_string())
                .bind(&profile.display_name)
                .bind(&profile.external_id_hash)
                .bind(&profile.avatar_url)
                .bind(to_millis(profile.created_at))
                .bind(to_millis(modified_at))
                .execute(&self.pool)
                .await?;
            }
        }
        debug!(kind = %entity.kind(), id = %entity.id(), "Applied remote record locally");
        Ok(())
    }

    async fn pending_count(&self) -> StoreResult<u64> {
        let mut total: i64 = 0;
        for kind in EntityKind::UPLOAD_ORDER {
            let sql = format!(
                "SELECT COUNT(*) AS count FROM {} WHERE needs_sync = 1",
                table_for(kind)
            );
            let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
            total += row.try_get::<i64, _>("count")?;
        }
        Ok(total as u64)
    }

    async fn save(&self) -> StoreResult<()> {
        // Mutations commit statement-by-statement; nothing is buffered.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::validation::BasicValidator;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn store() -> Arc<SqliteLocalStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteLocalStore::new(pool, Arc::new(BasicValidator));
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    // File-backed with several connections, so concurrent callers really do
    // run their transactions on separate connections.
    async fn file_backed_store(dir: &TempDir) -> Arc<SqliteLocalStore> {
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("store.db").display()
        );
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        let store = SqliteLocalStore::new(pool, Arc::new(BasicValidator));
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    async fn seed_family(store: &SqliteLocalStore) -> (Family, UserProfile) {
        let profile = store
            .create_profile("Maria", "hash-maria", None)
            .await
            .unwrap();
        let family = store.create_family("Lopez", profile.id).await.unwrap();
        (family, profile)
    }

    #[tokio::test]
    async fn test_create_family_is_dirty_and_fetchable() {
        let store = store().await;
        let (family, _) = seed_family(&store).await;

        let fetched = store.fetch_family(family.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Lopez");
        assert!(fetched.sync.needs_sync);
        assert_eq!(fetched.sync.local_version, RecordVersion::initial());
        assert!(fetched.sync.last_sync_date.is_none());

        let by_code = store
            .fetch_family_by_code(&family.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, family.id);
    }

    #[tokio::test]
    async fn test_create_family_rejects_invalid_name() {
        let store = store().await;
        let profile = store.create_profile("Maria", "h", None).await.unwrap();
        let err = store.create_family("   ", profile.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_second_primary_role_rejected() {
        let store = store().await;
        let (family, profile) = seed_family(&store).await;
        store
            .create_membership(family.id, profile.id, MemberRole::ParentAdmin, MembershipStatus::Active)
            .await
            .unwrap();

        let other = store
            .create_profile("Diego", "hash-diego", None)
            .await
            .unwrap();
        let err = store
            .create_membership(family.id, other.id, MemberRole::ParentAdmin, MembershipStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_membership_rejected() {
        let store = store().await;
        let (family, profile) = seed_family(&store).await;
        store
            .create_membership(family.id, profile.id, MemberRole::Parent, MembershipStatus::Active)
            .await
            .unwrap();
        let err = store
            .create_membership(family.id, profile.id, MemberRole::Child, MembershipStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_primary_promotion_admits_one() {
        let dir = TempDir::new().unwrap();
        let store = file_backed_store(&dir).await;

        // Several rounds so the two writers actually overlap at least once.
        for round in 0..5 {
            let creator = store
                .create_profile("Maria", &format!("hash-maria-{round}"), None)
                .await
                .unwrap();
            let family = store
                .create_family(&format!("Lopez{round}"), creator.id)
                .await
                .unwrap();
            let other = store
                .create_profile("Diego", &format!("hash-diego-{round}"), None)
                .await
                .unwrap();
            let first = store
                .create_membership(family.id, creator.id, MemberRole::Parent, MembershipStatus::Active)
                .await
                .unwrap();
            let second = store
                .create_membership(family.id, other.id, MemberRole::Parent, MembershipStatus::Active)
                .await
                .unwrap();

            let a = {
                let store = store.clone();
                tokio::spawn(
                    async move { store.assign_role(first.id, MemberRole::ParentAdmin).await },
                )
            };
            let b = {
                let store = store.clone();
                tokio::spawn(
                    async move { store.assign_role(second.id, MemberRole::ParentAdmin).await },
                )
            };
            let results = [a.await.unwrap(), b.await.unwrap()];
            let wins = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(wins, 1, "round {round}: {results:?}");
            let loser = results.iter().find(|r| r.is_err()).unwrap();
            assert!(
                matches!(loser, Err(StoreError::ConstraintViolation(_))),
                "round {round}: loser must hit the single-holder constraint, got {loser:?}"
            );

            let members = store.fetch_memberships_for_family(family.id).await.unwrap();
            let admins = members
                .iter()
                .filter(|m| m.role == MemberRole::ParentAdmin)
                .count();
            assert_eq!(admins, 1);
        }
    }

    #[tokio::test]
    async fn test_mark_synced_skips_stale_version() {
        let store = store().await;
        let (family, _) = seed_family(&store).await;
        let uploaded_version = family.sync.local_version;

        // A local edit lands between upload initiation and confirmation.
        store
            .update_family_name(family.id, "Lopez-Martinez")
            .await
            .unwrap();

        let cleared = store
            .mark_synced(
                EntityKind::Family,
                family.id.as_uuid(),
                uploaded_version,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!cleared);

        let current = store.fetch_family(family.id).await.unwrap().unwrap();
        assert!(current.sync.needs_sync);
        assert_eq!(current.sync.local_version, uploaded_version.next());

        let cleared = store
            .mark_synced(
                EntityKind::Family,
                family.id.as_uuid(),
                current.sync.local_version,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(cleared);
        let current = store.fetch_family(family.id).await.unwrap().unwrap();
        assert!(!current.sync.needs_sync);
        assert!(current.sync.last_sync_date.is_some());
    }

    #[tokio::test]
    async fn test_mark_synced_is_idempotent() {
        let store = store().await;
        let (family, _) = seed_family(&store).await;
        let at = Utc::now();
        for _ in 0..2 {
            let cleared = store
                .mark_synced(
                    EntityKind::Family,
                    family.id.as_uuid(),
                    family.sync.local_version,
                    at,
                )
                .await
                .unwrap();
            assert!(cleared);
        }
    }

    #[tokio::test]
    async fn test_soft_delete_dirties_and_keeps_row() {
        let store = store().await;
        let (family, profile) = seed_family(&store).await;
        let membership = store
            .create_membership(family.id, profile.id, MemberRole::Parent, MembershipStatus::Active)
            .await
            .unwrap();
        store
            .mark_synced(
                EntityKind::Membership,
                membership.id.as_uuid(),
                membership.sync.local_version,
                Utc::now(),
            )
            .await
            .unwrap();

        let removed = store.soft_delete_membership(membership.id).await.unwrap();
        assert_eq!(removed.status, MembershipStatus::Removed);
        assert!(removed.sync.needs_sync);
        assert_eq!(
            removed.sync.local_version,
            membership.sync.local_version.next()
        );
    }

    #[tokio::test]
    async fn test_apply_remote_overwrites_and_clears_dirty() {
        let store = store().await;
        let (mut family, _) = seed_family(&store).await;

        family.name = "Lopez (remote)".to_string();
        let remote_time = Utc::now();
        store
            .apply_remote(SyncEntity::Family(family.clone()), remote_time)
            .await
            .unwrap();

        let current = store.fetch_family(family.id).await.unwrap().unwrap();
        assert_eq!(current.name, "Lopez (remote)");
        assert!(!current.sync.needs_sync);
        assert_eq!(
            current.sync.last_sync_date.map(|d| d.timestamp_millis()),
            Some(remote_time.timestamp_millis())
        );
        // Local version advanced, so an in-flight upload of the old copy
        // cannot clear a later edit.
        assert_eq!(current.sync.local_version, RecordVersion::from(2));
    }

    #[tokio::test]
    async fn test_apply_remote_keeps_last_sync_date_monotonic() {
        let store = store().await;
        let (family, _) = seed_family(&store).await;

        let newer = Utc::now();
        let older = newer - chrono::Duration::minutes(5);
        store
            .apply_remote(SyncEntity::Family(family.clone()), newer)
            .await
            .unwrap();
        store
            .apply_remote(SyncEntity::Family(family.clone()), older)
            .await
            .unwrap();

        let current = store.fetch_family(family.id).await.unwrap().unwrap();
        assert_eq!(
            current.sync.last_sync_date.map(|d| d.timestamp_millis()),
            Some(newer.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_pending_count_spans_all_tables() {
        let store = store().await;
        let (family, profile) = seed_family(&store).await;
        store
            .create_membership(family.id, profile.id, MemberRole::ParentAdmin, MembershipStatus::Active)
            .await
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 3);

        store
            .mark_synced(
                EntityKind::Family,
                family.id.as_uuid(),
                family.sync.local_version,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fetch_dirty_returns_envelopes() {
        let store = store().await;
        let (family, _) = seed_family(&store).await;

        let dirty = store.fetch_dirty(EntityKind::Family).await.unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].id(), family.id.as_uuid());
        assert_eq!(dirty[0].kind(), EntityKind::Family);

        store
            .mark_synced(
                EntityKind::Family,
                family.id.as_uuid(),
                family.sync.local_version,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(store.fetch_dirty(EntityKind::Family).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assign_role_records_change_time() {
        let store = store().await;
        let (family, profile) = seed_family(&store).await;
        let membership = store
            .create_membership(family.id, profile.id, MemberRole::Child, MembershipStatus::Active)
            .await
            .unwrap();
        assert!(membership.last_role_change_at.is_none());

        let updated = store
            .assign_role(membership.id, MemberRole::Parent)
            .await
            .unwrap();
        assert_eq!(updated.role, MemberRole::Parent);
        assert!(updated.last_role_change_at.is_some());
        assert!(updated.sync.needs_sync);
    }
}
