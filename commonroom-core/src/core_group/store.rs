//! Storage collaborator contract
//!
//! The rule engine never touches rows directly; it calls a [`GroupStore`].
//! Implementations must:
//! - keep `(group_id, user_id)` unique for memberships so that
//!   [`GroupStore::find_or_create_membership`] is race-free,
//! - change `memberships_count` / `discussions_count` in the same
//!   transaction as the row insert or delete,
//! - not fetch a second pooled connection while holding one.
//!
//! The archive cascade is a sequence of separate calls. A caller that needs
//! all-or-nothing semantics must wrap the whole cascade in one storage
//! transaction; a failure halfway leaves earlier writes in place.

use super::discussion::{Discussion, NewDiscussion};
use super::errors::GroupResult;
use super::group::{Group, Subscription};
use super::membership::{
    Invitation, Membership, MembershipRequest, NewMembershipRequest, RequestResponse,
};
use super::types::{DiscussionId, GroupId, InvitationId, MembershipId, MembershipRequestId, Timestamp, User, UserId};

pub trait GroupStore {
    // ===== Users =====

    fn create_user(&self, name: &str, email: &str) -> GroupResult<User>;

    /// `NotFound` when missing
    fn get_user(&self, user_id: UserId) -> GroupResult<User>;

    // ===== Groups =====

    /// Insert a group and return its assigned id
    fn create_group(&self, group: &Group) -> GroupResult<GroupId>;

    /// `NotFound` when missing
    fn get_group(&self, group_id: GroupId) -> GroupResult<Group>;

    /// Persist every mutable attribute except the counters
    fn update_group(&self, group: &Group) -> GroupResult<()>;

    /// Write a recomputed full name without any validation
    fn update_full_name(&self, group_id: GroupId, full_name: &str) -> GroupResult<()>;

    fn set_archived_at(&self, group_id: GroupId, at: Timestamp) -> GroupResult<()>;

    /// Direct children of `parent_id`, ordered by id
    fn subgroups(&self, parent_id: GroupId, include_archived: bool) -> GroupResult<Vec<Group>>;

    fn list_top_level_groups(&self) -> GroupResult<Vec<Group>>;

    /// Current value of the denormalized membership counter
    fn memberships_count(&self, group_id: GroupId) -> GroupResult<i64>;

    // ===== Memberships =====

    fn find_membership(&self, group_id: GroupId, user_id: UserId) -> GroupResult<Option<Membership>>;

    /// Return the existing membership or insert one, atomically
    fn find_or_create_membership(
        &self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership>;

    fn set_admin(&self, membership_id: MembershipId, admin: bool) -> GroupResult<()>;

    /// Returns false when there was nothing to delete
    fn delete_membership(&self, group_id: GroupId, user_id: UserId) -> GroupResult<bool>;

    /// Stamp every membership of the group; returns the number touched
    fn archive_memberships(&self, group_id: GroupId, at: Timestamp) -> GroupResult<usize>;

    fn memberships(&self, group_id: GroupId) -> GroupResult<Vec<Membership>>;

    /// Member users ordered by id
    fn members(&self, group_id: GroupId) -> GroupResult<Vec<User>>;

    /// Admin users ordered by id
    fn admins(&self, group_id: GroupId) -> GroupResult<Vec<User>>;

    fn has_member_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool>;

    // ===== Membership requests =====

    fn create_membership_request(&self, request: &NewMembershipRequest) -> GroupResult<MembershipRequest>;

    fn get_membership_request(&self, request_id: MembershipRequestId) -> GroupResult<MembershipRequest>;

    fn set_request_response(
        &self,
        request_id: MembershipRequestId,
        response: RequestResponse,
    ) -> GroupResult<()>;

    /// Requests without a response
    fn pending_membership_requests(&self, group_id: GroupId) -> GroupResult<Vec<MembershipRequest>>;

    fn has_membership_request_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool>;

    // ===== Invitations =====

    fn create_invitation(
        &self,
        group_id: GroupId,
        recipient_email: &str,
        inviter_id: UserId,
    ) -> GroupResult<Invitation>;

    fn get_invitation(&self, invitation_id: InvitationId) -> GroupResult<Invitation>;

    fn set_invitation_accepted(&self, invitation_id: InvitationId, at: Timestamp) -> GroupResult<()>;

    fn set_invitation_cancelled(&self, invitation_id: InvitationId, at: Timestamp) -> GroupResult<()>;

    /// Invitations neither accepted nor cancelled
    fn pending_invitation_count(&self, group_id: GroupId) -> GroupResult<i64>;

    // ===== Subscriptions =====

    fn get_subscription(&self, group_id: GroupId) -> GroupResult<Option<Subscription>>;

    fn upsert_subscription(&self, subscription: &Subscription) -> GroupResult<()>;

    // ===== Discussions =====

    fn create_discussion(&self, discussion: &NewDiscussion) -> GroupResult<Discussion>;

    fn discussions(&self, group_id: GroupId) -> GroupResult<Vec<Discussion>>;

    /// Idempotent: an already archived discussion keeps its original stamp
    fn archive_discussion(&self, discussion_id: DiscussionId, at: Timestamp) -> GroupResult<()>;
}
