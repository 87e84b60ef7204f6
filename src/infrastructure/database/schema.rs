use crate::shared::error::StoreResult;
use sqlx::{Pool, Sqlite};

/// Idempotent schema for the on-device store. Timestamps are unix
/// milliseconds; `needs_sync`/`last_sync_date`/`local_version` are the sync
/// bookkeeping columns shared by every syncable table.
const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS families (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        created_by TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        needs_sync INTEGER NOT NULL DEFAULT 1,
        last_sync_date INTEGER,
        local_version INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        external_id_hash TEXT NOT NULL,
        avatar_url TEXT,
        created_at INTEGER NOT NULL,
        needs_sync INTEGER NOT NULL DEFAULT 1,
        last_sync_date INTEGER,
        local_version INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        id TEXT PRIMARY KEY,
        family_id TEXT NOT NULL,
        profile_id TEXT NOT NULL,
        role TEXT NOT NULL,
        status TEXT NOT NULL,
        joined_at INTEGER NOT NULL,
        last_role_change_at INTEGER,
        needs_sync INTEGER NOT NULL DEFAULT 1,
        last_sync_date INTEGER,
        local_version INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_memberships_family ON memberships(family_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_families_dirty ON families(needs_sync)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_memberships_dirty ON memberships(needs_sync)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_profiles_dirty ON profiles(needs_sync)
    "#,
    // Authoritative guard for the single-primary-role invariant: at most
    // one active parent_admin per family, enforced even when two writers
    // race past the in-transaction check.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_one_primary_per_family
        ON memberships(family_id)
        WHERE role = 'parent_admin' AND status = 'active'
    "#,
];

pub async fn apply(pool: &Pool<Sqlite>) -> StoreResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
