//! Database migrations for groups
//!
//! Versioned migrations for the group storage schema. Each migration is
//! applied in its own transaction and recorded in `group_schema_version`.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, info};

use super::super::errors::StorageError;
use super::super::types::Timestamp;

/// Current schema version for core_group
pub const CURRENT_GROUP_SCHEMA_VERSION: i32 = 1;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial groups schema",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS group_schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                full_name TEXT NOT NULL,
                parent_id INTEGER REFERENCES groups(id),
                description TEXT,
                max_size INTEGER NOT NULL,
                category_id INTEGER,
                payment_plan TEXT NOT NULL
                    CHECK(payment_plan IN ('pwyc', 'subscription', 'manual_subscription', 'undetermined')),
                discussion_privacy_options TEXT NOT NULL
                    CHECK(discussion_privacy_options IN ('public_only', 'private_only', 'public_or_private')),
                membership_granted_upon TEXT NOT NULL
                    CHECK(membership_granted_upon IN ('request', 'approval', 'invitation')),
                is_visible_to_public INTEGER NOT NULL,
                is_visible_to_parent_members INTEGER NOT NULL,
                parent_members_can_see_discussions INTEGER NOT NULL,
                members_can_add_members INTEGER NOT NULL,
                can_start_group INTEGER NOT NULL,
                archived_at INTEGER,
                setup_completed_at INTEGER,
                memberships_count INTEGER NOT NULL DEFAULT 0,
                discussions_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_groups_parent ON groups(parent_id);

            -- One row per (group, user); find-or-create relies on it
            CREATE TABLE IF NOT EXISTS memberships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                inviter_id INTEGER REFERENCES users(id),
                admin INTEGER NOT NULL DEFAULT 0,
                archived_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE (group_id, user_id),
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id);

            CREATE TABLE IF NOT EXISTS membership_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                user_id INTEGER REFERENCES users(id),
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                response TEXT CHECK(response IN ('approved', 'ignored')),
                created_at INTEGER NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_membership_requests_group ON membership_requests(group_id);

            CREATE TABLE IF NOT EXISTS invitations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                recipient_email TEXT NOT NULL,
                inviter_id INTEGER NOT NULL REFERENCES users(id),
                accepted_at INTEGER,
                cancelled_at INTEGER,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_invitations_group ON invitations(group_id);

            CREATE TABLE IF NOT EXISTS subscriptions (
                group_id INTEGER PRIMARY KEY,
                amount_cents INTEGER NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS discussions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                private INTEGER NOT NULL,
                archived_at INTEGER,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_discussions_group ON discussions(group_id);
        "#,
        down_sql: Some(
            r#"
            DROP INDEX IF EXISTS idx_discussions_group;
            DROP TABLE IF EXISTS discussions;
            DROP TABLE IF EXISTS subscriptions;
            DROP INDEX IF EXISTS idx_invitations_group;
            DROP TABLE IF EXISTS invitations;
            DROP INDEX IF EXISTS idx_membership_requests_group;
            DROP TABLE IF EXISTS membership_requests;
            DROP INDEX IF EXISTS idx_memberships_user;
            DROP TABLE IF EXISTS memberships;
            DROP INDEX IF EXISTS idx_groups_parent;
            DROP TABLE IF EXISTS groups;
            DROP TABLE IF EXISTS users;
        "#,
        ),
    }]
}

/// Get current schema version from database
fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> Result<i32, StorageError> {
    let conn = pool.get()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM group_schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> Result<(), StorageError> {
    let current_version = get_current_version(pool)?;
    let pending_migrations: Vec<_> =
        get_migrations().into_iter().filter(|m| m.version > current_version).collect();

    if pending_migrations.is_empty() {
        debug!(version = get_latest_version(), "group schema up to date");
        return Ok(());
    }

    let mut conn = pool.get()?;

    for migration in pending_migrations {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.up_sql)?;
        tx.execute(
            "INSERT INTO group_schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, Timestamp::now().to_sql()],
        )?;
        tx.commit()?;

        info!(version = migration.version, description = migration.description, "applied migration");
    }

    Ok(())
}

/// Undo applied migrations down to `target_version`, newest first.
///
/// The version table itself is kept, so `migrate` can re-apply later.
pub fn rollback(
    pool: &Pool<SqliteConnectionManager>,
    target_version: i32,
) -> Result<(), StorageError> {
    let current_version = get_current_version(pool)?;
    let mut to_undo: Vec<_> = get_migrations()
        .into_iter()
        .filter(|m| m.version > target_version && m.version <= current_version)
        .collect();
    to_undo.sort_by(|a, b| b.version.cmp(&a.version));

    let mut conn = pool.get()?;

    for migration in to_undo {
        let down_sql =
            migration.down_sql.ok_or(StorageError::IrreversibleMigration(migration.version))?;

        let tx = conn.transaction()?;
        tx.execute_batch(down_sql)?;
        tx.execute(
            "DELETE FROM group_schema_version WHERE version = ?",
            params![migration.version],
        )?;
        tx.commit()?;

        info!(version = migration.version, description = migration.description, "rolled back migration");
    }

    Ok(())
}

/// Get the latest migration version available
pub fn get_latest_version() -> i32 {
    get_migrations().iter().map(|m| m.version).max().unwrap_or(0)
}
