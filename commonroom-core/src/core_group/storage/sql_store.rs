//! SQL-based storage implementation for groups

use super::super::discussion::{Discussion, NewDiscussion};
use super::super::discussion_privacy::DiscussionPrivacyOptions;
use super::super::errors::{GroupError, GroupResult, StorageError};
use super::super::group::{Group, MembershipGrantedUpon, PaymentPlan, Subscription};
use super::super::membership::{
    Invitation, Membership, MembershipRequest, NewMembershipRequest, RequestResponse,
};
use super::super::store::GroupStore;
use super::super::types::{
    CategoryId, DiscussionId, GroupId, InvitationId, MembershipId, MembershipRequestId, Timestamp,
    User, UserId,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;

const GROUP_COLUMNS: &str = "id, name, full_name, parent_id, description, max_size, category_id,
    payment_plan, discussion_privacy_options, membership_granted_upon, is_visible_to_public,
    is_visible_to_parent_members, parent_members_can_see_discussions, members_can_add_members,
    can_start_group, archived_at, setup_completed_at, memberships_count, discussions_count, created_at";

const MEMBERSHIP_COLUMNS: &str =
    "id, group_id, user_id, inviter_id, admin, archived_at, created_at";

const REQUEST_COLUMNS: &str = "id, group_id, user_id, name, email, response, created_at";

const INVITATION_COLUMNS: &str =
    "id, group_id, recipient_email, inviter_id, accepted_at, cancelled_at, created_at";

const DISCUSSION_COLUMNS: &str = "id, group_id, author_id, title, private, archived_at, created_at";

// Enum columns are stored as their snake_case names.
macro_rules! text_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    let raw = value.as_str()?;
                    <$ty>::from_str(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

text_column!(PaymentPlan, DiscussionPrivacyOptions, MembershipGrantedUpon, RequestResponse);

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    Ok(Timestamp::from_sql(row.get(idx)?))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(Timestamp::from_sql))
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId::new(row.get(0)?),
        name: row.get(1)?,
        full_name: row.get(2)?,
        parent_id: row.get::<_, Option<i64>>(3)?.map(GroupId::new),
        description: row.get(4)?,
        max_size: row.get(5)?,
        category_id: row.get::<_, Option<i64>>(6)?.map(CategoryId::new),
        payment_plan: row.get(7)?,
        discussion_privacy_options: row.get(8)?,
        membership_granted_upon: row.get(9)?,
        is_visible_to_public: row.get(10)?,
        is_visible_to_parent_members: row.get(11)?,
        parent_members_can_see_discussions: row.get(12)?,
        members_can_add_members: row.get(13)?,
        can_start_group: row.get(14)?,
        archived_at: optional_timestamp(row, 15)?,
        setup_completed_at: optional_timestamp(row, 16)?,
        memberships_count: row.get(17)?,
        discussions_count: row.get(18)?,
        created_at: timestamp(row, 19)?,
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: MembershipId::new(row.get(0)?),
        group_id: GroupId::new(row.get(1)?),
        user_id: UserId::new(row.get(2)?),
        inviter_id: row.get::<_, Option<i64>>(3)?.map(UserId::new),
        admin: row.get(4)?,
        archived_at: optional_timestamp(row, 5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User { id: UserId::new(row.get(0)?), name: row.get(1)?, email: row.get(2)? })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<MembershipRequest> {
    Ok(MembershipRequest {
        id: MembershipRequestId::new(row.get(0)?),
        group_id: GroupId::new(row.get(1)?),
        user_id: row.get::<_, Option<i64>>(2)?.map(UserId::new),
        name: row.get(3)?,
        email: row.get(4)?,
        response: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn invitation_from_row(row: &Row<'_>) -> rusqlite::Result<Invitation> {
    Ok(Invitation {
        id: InvitationId::new(row.get(0)?),
        group_id: GroupId::new(row.get(1)?),
        recipient_email: row.get(2)?,
        inviter_id: UserId::new(row.get(3)?),
        accepted_at: optional_timestamp(row, 4)?,
        cancelled_at: optional_timestamp(row, 5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn discussion_from_row(row: &Row<'_>) -> rusqlite::Result<Discussion> {
    Ok(Discussion {
        id: DiscussionId::new(row.get(0)?),
        group_id: GroupId::new(row.get(1)?),
        author_id: UserId::new(row.get(2)?),
        title: row.get(3)?,
        private: row.get(4)?,
        archived_at: optional_timestamp(row, 5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn storage(err: rusqlite::Error) -> GroupError {
    GroupError::Storage(StorageError::Sqlite(err))
}

fn not_found(what: &str, id: impl std::fmt::Display) -> GroupError {
    GroupError::NotFound(format!("{} {}", what, id))
}

/// SQL-based storage for groups, memberships and their satellites
pub struct GroupSqlStore {
    pool: Pool<SqliteConnectionManager>,
}

impl GroupSqlStore {
    /// Create a new SQL store with the given connection pool
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Result<Self, StorageError> {
        super::migrations::migrate(&pool)?;
        Ok(Self { pool })
    }

    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Self::new(pool)
    }

    /// Create a new in-memory store.
    ///
    /// Every SQLite memory connection is a separate database, so the pool
    /// holds exactly one connection.
    pub fn memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::new(pool)
    }

    fn conn(&self) -> GroupResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| GroupError::Storage(StorageError::Pool(e)))
    }

    fn query_groups(&self, sql: &str, args: &[&dyn ToSql]) -> GroupResult<Vec<Group>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(storage)?;
        let groups = stmt
            .query_map(args, group_from_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(groups)
    }

    fn query_users(&self, sql: &str, group_id: GroupId) -> GroupResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(storage)?;
        let users = stmt
            .query_map(params![group_id.value()], user_from_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(users)
    }

    fn exists(&self, sql: &str, group_id: GroupId, email: &str) -> GroupResult<bool> {
        let conn = self.conn()?;
        conn.query_row(sql, params![group_id.value(), email], |row| row.get::<_, bool>(0))
            .map_err(storage)
    }
}

impl GroupStore for GroupSqlStore {
    // ===== Users =====

    fn create_user(&self, name: &str, email: &str) -> GroupResult<User> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO users (name, email) VALUES (?, ?)", params![name, email])
            .map_err(storage)?;
        Ok(User { id: UserId::new(conn.last_insert_rowid()), name: name.to_string(), email: email.to_string() })
    }

    fn get_user(&self, user_id: UserId) -> GroupResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, email FROM users WHERE id = ?",
            params![user_id.value()],
            user_from_row,
        )
        .optional()
        .map_err(storage)?
        .ok_or_else(|| not_found("user", user_id))
    }

    // ===== Groups =====

    fn create_group(&self, group: &Group) -> GroupResult<GroupId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO groups (name, full_name, parent_id, description, max_size, category_id,
                payment_plan, discussion_privacy_options, membership_granted_upon,
                is_visible_to_public, is_visible_to_parent_members,
                parent_members_can_see_discussions, members_can_add_members, can_start_group,
                archived_at, setup_completed_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                &group.name,
                &group.full_name,
                group.parent_id.map(|id| id.value()),
                &group.description,
                group.max_size,
                group.category_id.map(|id| id.value()),
                group.payment_plan,
                group.discussion_privacy_options,
                group.membership_granted_upon,
                group.is_visible_to_public,
                group.is_visible_to_parent_members,
                group.parent_members_can_see_discussions,
                group.members_can_add_members,
                group.can_start_group,
                group.archived_at.map(Timestamp::to_sql),
                group.setup_completed_at.map(Timestamp::to_sql),
                group.created_at.to_sql(),
            ],
        )
        .map_err(storage)?;
        Ok(GroupId::new(conn.last_insert_rowid()))
    }

    fn get_group(&self, group_id: GroupId) -> GroupResult<Group> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM groups WHERE id = ?", GROUP_COLUMNS),
            params![group_id.value()],
            group_from_row,
        )
        .optional()
        .map_err(storage)?
        .ok_or_else(|| not_found("group", group_id))
    }

    fn update_group(&self, group: &Group) -> GroupResult<()> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE groups SET name = ?, full_name = ?, parent_id = ?, description = ?,
                    max_size = ?, category_id = ?, payment_plan = ?, discussion_privacy_options = ?,
                    membership_granted_upon = ?, is_visible_to_public = ?,
                    is_visible_to_parent_members = ?, parent_members_can_see_discussions = ?,
                    members_can_add_members = ?, can_start_group = ?, archived_at = ?,
                    setup_completed_at = ?
                 WHERE id = ?",
                params![
                    &group.name,
                    &group.full_name,
                    group.parent_id.map(|id| id.value()),
                    &group.description,
                    group.max_size,
                    group.category_id.map(|id| id.value()),
                    group.payment_plan,
                    group.discussion_privacy_options,
                    group.membership_granted_upon,
                    group.is_visible_to_public,
                    group.is_visible_to_parent_members,
                    group.parent_members_can_see_discussions,
                    group.members_can_add_members,
                    group.can_start_group,
                    group.archived_at.map(Timestamp::to_sql),
                    group.setup_completed_at.map(Timestamp::to_sql),
                    group.id.value(),
                ],
            )
            .map_err(storage)?;
        if updated == 0 {
            return Err(not_found("group", group.id));
        }
        Ok(())
    }

    fn update_full_name(&self, group_id: GroupId, full_name: &str) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE groups SET full_name = ? WHERE id = ?",
            params![full_name, group_id.value()],
        )
        .map_err(storage)?;
        Ok(())
    }

    fn set_archived_at(&self, group_id: GroupId, at: Timestamp) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE groups SET archived_at = ? WHERE id = ?",
            params![at.to_sql(), group_id.value()],
        )
        .map_err(storage)?;
        Ok(())
    }

    fn subgroups(&self, parent_id: GroupId, include_archived: bool) -> GroupResult<Vec<Group>> {
        let sql = format!(
            "SELECT {} FROM groups WHERE parent_id = ? {} ORDER BY id",
            GROUP_COLUMNS,
            if include_archived { "" } else { "AND archived_at IS NULL" }
        );
        self.query_groups(&sql, &[&parent_id.value()])
    }

    fn list_top_level_groups(&self) -> GroupResult<Vec<Group>> {
        let sql = format!(
            "SELECT {} FROM groups WHERE parent_id IS NULL AND archived_at IS NULL ORDER BY id",
            GROUP_COLUMNS
        );
        self.query_groups(&sql, &[])
    }

    fn memberships_count(&self, group_id: GroupId) -> GroupResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT memberships_count FROM groups WHERE id = ?",
            params![group_id.value()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage)?
        .ok_or_else(|| not_found("group", group_id))
    }

    // ===== Memberships =====

    fn find_membership(&self, group_id: GroupId, user_id: UserId) -> GroupResult<Option<Membership>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM memberships WHERE group_id = ? AND user_id = ?",
                MEMBERSHIP_COLUMNS
            ),
            params![group_id.value(), user_id.value()],
            membership_from_row,
        )
        .optional()
        .map_err(storage)
    }

    fn find_or_create_membership(
        &self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;

        let inserted = tx
            .execute(
                "INSERT INTO memberships (group_id, user_id, inviter_id, admin, created_at)
                 VALUES (?, ?, ?, 0, ?)
                 ON CONFLICT (group_id, user_id) DO NOTHING",
                params![
                    group_id.value(),
                    user_id.value(),
                    inviter_id.map(|id| id.value()),
                    Timestamp::now().to_sql(),
                ],
            )
            .map_err(storage)?;
        if inserted > 0 {
            tx.execute(
                "UPDATE groups SET memberships_count = memberships_count + 1 WHERE id = ?",
                params![group_id.value()],
            )
            .map_err(storage)?;
        }

        let membership = tx
            .query_row(
                &format!(
                    "SELECT {} FROM memberships WHERE group_id = ? AND user_id = ?",
                    MEMBERSHIP_COLUMNS
                ),
                params![group_id.value(), user_id.value()],
                membership_from_row,
            )
            .map_err(storage)?;

        tx.commit().map_err(storage)?;
        Ok(membership)
    }

    fn set_admin(&self, membership_id: MembershipId, admin: bool) -> GroupResult<()> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE memberships SET admin = ? WHERE id = ?",
                params![admin, membership_id.value()],
            )
            .map_err(storage)?;
        if updated == 0 {
            return Err(not_found("membership", membership_id));
        }
        Ok(())
    }

    fn delete_membership(&self, group_id: GroupId, user_id: UserId) -> GroupResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;

        let deleted = tx
            .execute(
                "DELETE FROM memberships WHERE group_id = ? AND user_id = ?",
                params![group_id.value(), user_id.value()],
            )
            .map_err(storage)?;
        if deleted > 0 {
            tx.execute(
                "UPDATE groups SET memberships_count = memberships_count - 1 WHERE id = ?",
                params![group_id.value()],
            )
            .map_err(storage)?;
        }

        tx.commit().map_err(storage)?;
        Ok(deleted > 0)
    }

    fn archive_memberships(&self, group_id: GroupId, at: Timestamp) -> GroupResult<usize> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE memberships SET archived_at = ? WHERE group_id = ? AND archived_at IS NULL",
            params![at.to_sql(), group_id.value()],
        )
        .map_err(storage)
    }

    fn memberships(&self, group_id: GroupId) -> GroupResult<Vec<Membership>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM memberships WHERE group_id = ? ORDER BY id",
                MEMBERSHIP_COLUMNS
            ))
            .map_err(storage)?;
        let memberships = stmt
            .query_map(params![group_id.value()], membership_from_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(memberships)
    }

    fn members(&self, group_id: GroupId) -> GroupResult<Vec<User>> {
        self.query_users(
            "SELECT u.id, u.name, u.email FROM users u
             JOIN memberships m ON m.user_id = u.id
             WHERE m.group_id = ? ORDER BY u.id",
            group_id,
        )
    }

    fn admins(&self, group_id: GroupId) -> GroupResult<Vec<User>> {
        self.query_users(
            "SELECT u.id, u.name, u.email FROM users u
             JOIN memberships m ON m.user_id = u.id
             WHERE m.group_id = ? AND m.admin = 1 ORDER BY u.id",
            group_id,
        )
    }

    fn has_member_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM users u JOIN memberships m ON m.user_id = u.id
                 WHERE m.group_id = ? AND u.email = ?)",
            group_id,
            email,
        )
    }

    // ===== Membership requests =====

    fn create_membership_request(&self, request: &NewMembershipRequest) -> GroupResult<MembershipRequest> {
        let conn = self.conn()?;
        let created_at = Timestamp::now();
        conn.execute(
            "INSERT INTO membership_requests (group_id, user_id, name, email, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                request.group_id.value(),
                request.user_id.map(|id| id.value()),
                &request.name,
                &request.email,
                created_at.to_sql(),
            ],
        )
        .map_err(storage)?;
        Ok(MembershipRequest {
            id: MembershipRequestId::new(conn.last_insert_rowid()),
            group_id: request.group_id,
            user_id: request.user_id,
            name: request.name.clone(),
            email: request.email.clone(),
            response: None,
            created_at,
        })
    }

    fn get_membership_request(&self, request_id: MembershipRequestId) -> GroupResult<MembershipRequest> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM membership_requests WHERE id = ?", REQUEST_COLUMNS),
            params![request_id.value()],
            request_from_row,
        )
        .optional()
        .map_err(storage)?
        .ok_or_else(|| not_found("membership request", request_id))
    }

    fn set_request_response(
        &self,
        request_id: MembershipRequestId,
        response: RequestResponse,
    ) -> GroupResult<()> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE membership_requests SET response = ? WHERE id = ?",
                params![response, request_id.value()],
            )
            .map_err(storage)?;
        if updated == 0 {
            return Err(not_found("membership request", request_id));
        }
        Ok(())
    }

    fn pending_membership_requests(&self, group_id: GroupId) -> GroupResult<Vec<MembershipRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM membership_requests
                 WHERE group_id = ? AND response IS NULL ORDER BY id",
                REQUEST_COLUMNS
            ))
            .map_err(storage)?;
        let requests = stmt
            .query_map(params![group_id.value()], request_from_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(requests)
    }

    fn has_membership_request_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM membership_requests WHERE group_id = ? AND email = ?)",
            group_id,
            email,
        )
    }

    // ===== Invitations =====

    fn create_invitation(
        &self,
        group_id: GroupId,
        recipient_email: &str,
        inviter_id: UserId,
    ) -> GroupResult<Invitation> {
        let conn = self.conn()?;
        let created_at = Timestamp::now();
        conn.execute(
            "INSERT INTO invitations (group_id, recipient_email, inviter_id, created_at)
             VALUES (?, ?, ?, ?)",
            params![group_id.value(), recipient_email, inviter_id.value(), created_at.to_sql()],
        )
        .map_err(storage)?;
        Ok(Invitation {
            id: InvitationId::new(conn.last_insert_rowid()),
            group_id,
            recipient_email: recipient_email.to_string(),
            inviter_id,
            accepted_at: None,
            cancelled_at: None,
            created_at,
        })
    }

    fn get_invitation(&self, invitation_id: InvitationId) -> GroupResult<Invitation> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM invitations WHERE id = ?", INVITATION_COLUMNS),
            params![invitation_id.value()],
            invitation_from_row,
        )
        .optional()
        .map_err(storage)?
        .ok_or_else(|| not_found("invitation", invitation_id))
    }

    fn set_invitation_accepted(&self, invitation_id: InvitationId, at: Timestamp) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE invitations SET accepted_at = ? WHERE id = ?",
            params![at.to_sql(), invitation_id.value()],
        )
        .map_err(storage)?;
        Ok(())
    }

    fn set_invitation_cancelled(&self, invitation_id: InvitationId, at: Timestamp) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE invitations SET cancelled_at = ? WHERE id = ?",
            params![at.to_sql(), invitation_id.value()],
        )
        .map_err(storage)?;
        Ok(())
    }

    fn pending_invitation_count(&self, group_id: GroupId) -> GroupResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM invitations
             WHERE group_id = ? AND accepted_at IS NULL AND cancelled_at IS NULL",
            params![group_id.value()],
            |row| row.get(0),
        )
        .map_err(storage)
    }

    // ===== Subscriptions =====

    fn get_subscription(&self, group_id: GroupId) -> GroupResult<Option<Subscription>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT group_id, amount_cents FROM subscriptions WHERE group_id = ?",
            params![group_id.value()],
            |row| Ok(Subscription { group_id: GroupId::new(row.get(0)?), amount_cents: row.get(1)? }),
        )
        .optional()
        .map_err(storage)
    }

    fn upsert_subscription(&self, subscription: &Subscription) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subscriptions (group_id, amount_cents) VALUES (?, ?)
             ON CONFLICT (group_id) DO UPDATE SET amount_cents = excluded.amount_cents",
            params![subscription.group_id.value(), subscription.amount_cents],
        )
        .map_err(storage)?;
        Ok(())
    }

    // ===== Discussions =====

    fn create_discussion(&self, discussion: &NewDiscussion) -> GroupResult<Discussion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;
        let created_at = Timestamp::now();

        tx.execute(
            "INSERT INTO discussions (group_id, author_id, title, private, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                discussion.group_id.value(),
                discussion.author_id.value(),
                &discussion.title,
                discussion.private,
                created_at.to_sql(),
            ],
        )
        .map_err(storage)?;
        let id = DiscussionId::new(tx.last_insert_rowid());
        tx.execute(
            "UPDATE groups SET discussions_count = discussions_count + 1 WHERE id = ?",
            params![discussion.group_id.value()],
        )
        .map_err(storage)?;

        tx.commit().map_err(storage)?;
        Ok(Discussion {
            id,
            group_id: discussion.group_id,
            author_id: discussion.author_id,
            title: discussion.title.clone(),
            private: discussion.private,
            archived_at: None,
            created_at,
        })
    }

    fn discussions(&self, group_id: GroupId) -> GroupResult<Vec<Discussion>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM discussions WHERE group_id = ? ORDER BY id",
                DISCUSSION_COLUMNS
            ))
            .map_err(storage)?;
        let discussions = stmt
            .query_map(params![group_id.value()], discussion_from_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        Ok(discussions)
    }

    fn archive_discussion(&self, discussion_id: DiscussionId, at: Timestamp) -> GroupResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE discussions SET archived_at = ? WHERE id = ? AND archived_at IS NULL",
            params![at.to_sql(), discussion_id.value()],
        )
        .map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupDefaults;

    fn draft(name: &str) -> Group {
        Group::draft(name, &GroupDefaults::default())
    }

    #[test]
    fn test_create_and_get_group() {
        let store = GroupSqlStore::memory().unwrap();
        let mut group = draft("Engineering");
        group.description = Some("Builds things".to_string());
        group.payment_plan = PaymentPlan::ManualSubscription;

        let id = store.create_group(&group).unwrap();
        let stored = store.get_group(id).unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.name, "Engineering");
        assert_eq!(stored.description.as_deref(), Some("Builds things"));
        assert_eq!(stored.payment_plan, PaymentPlan::ManualSubscription);
        assert_eq!(stored.memberships_count, 0);
        assert_eq!(stored.created_at, group.created_at);
    }

    #[test]
    fn test_get_missing_group() {
        let store = GroupSqlStore::memory().unwrap();
        assert!(matches!(store.get_group(GroupId::new(99)), Err(GroupError::NotFound(_))));
    }

    #[test]
    fn test_find_or_create_membership_counts_once() {
        let store = GroupSqlStore::memory().unwrap();
        let group_id = store.create_group(&draft("Engineering")).unwrap();
        let alice = store.create_user("alice", "alice@example.org").unwrap();

        let first = store.find_or_create_membership(group_id, alice.id, None).unwrap();
        let second = store.find_or_create_membership(group_id, alice.id, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.memberships_count(group_id).unwrap(), 1);
        assert!(store.delete_membership(group_id, alice.id).unwrap());
        assert_eq!(store.memberships_count(group_id).unwrap(), 0);
    }

    #[test]
    fn test_subgroups_filter_archived() {
        let store = GroupSqlStore::memory().unwrap();
        let parent = store.create_group(&draft("Engineering")).unwrap();
        let mut child = draft("Backend");
        child.parent_id = Some(parent);
        let live = store.create_group(&child).unwrap();
        let archived = store.create_group(&child).unwrap();
        store.set_archived_at(archived, Timestamp::now()).unwrap();

        let visible: Vec<_> = store.subgroups(parent, false).unwrap().iter().map(|g| g.id).collect();
        assert_eq!(visible, vec![live]);
        assert_eq!(store.subgroups(parent, true).unwrap().len(), 2);
        assert_eq!(store.list_top_level_groups().unwrap().len(), 1);
    }

    #[test]
    fn test_discussion_counter_and_archive() {
        let store = GroupSqlStore::memory().unwrap();
        let group_id = store.create_group(&draft("Engineering")).unwrap();
        let alice = store.create_user("alice", "alice@example.org").unwrap();

        let discussion = store
            .create_discussion(&NewDiscussion {
                group_id,
                author_id: alice.id,
                title: "Roadmap".to_string(),
                private: false,
            })
            .unwrap();
        assert_eq!(store.get_group(group_id).unwrap().discussions_count, 1);

        let first = Timestamp::from_millis(1_000);
        store.archive_discussion(discussion.id, first).unwrap();
        store.archive_discussion(discussion.id, Timestamp::from_millis(2_000)).unwrap();
        assert_eq!(store.discussions(group_id).unwrap()[0].archived_at, Some(first));
    }

    #[test]
    fn test_subscription_upsert() {
        let store = GroupSqlStore::memory().unwrap();
        let group_id = store.create_group(&draft("Engineering")).unwrap();

        assert!(store.get_subscription(group_id).unwrap().is_none());
        store.upsert_subscription(&Subscription { group_id, amount_cents: 500 }).unwrap();
        store.upsert_subscription(&Subscription { group_id, amount_cents: 0 }).unwrap();
        assert_eq!(store.get_subscription(group_id).unwrap().unwrap().amount_cents, 0);
    }

    #[test]
    fn test_request_response_persisted() {
        let store = GroupSqlStore::memory().unwrap();
        let group_id = store.create_group(&draft("Engineering")).unwrap();
        let request = store
            .create_membership_request(&NewMembershipRequest {
                group_id,
                user_id: None,
                name: "Visitor".to_string(),
                email: "visitor@example.org".to_string(),
            })
            .unwrap();

        assert_eq!(store.pending_membership_requests(group_id).unwrap().len(), 1);
        store.set_request_response(request.id, RequestResponse::Ignored).unwrap();
        assert!(store.pending_membership_requests(group_id).unwrap().is_empty());
        assert_eq!(
            store.get_membership_request(request.id).unwrap().response,
            Some(RequestResponse::Ignored)
        );
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.db");

        let id = {
            let store = GroupSqlStore::open(&path, 2).unwrap();
            store.create_group(&draft("Engineering")).unwrap()
        };

        let reopened = GroupSqlStore::open(&path, 2).unwrap();
        assert_eq!(reopened.get_group(id).unwrap().name, "Engineering");
    }
}
