//! Manager traits for group and membership operations

use super::discussion::Discussion;
use super::discussion_privacy::DiscussionPrivacyOptions;
use super::errors::GroupResult;
use super::group::{Group, MembershipGrantedUpon, PaymentPlan, Subscription};
use super::membership::{Invitation, Membership, MembershipRequest, RequestResponse};
use super::types::{CategoryId, GroupId, InvitationId, MembershipRequestId, User, UserId};
use super::visibility::VisibilityTerm;

/// Attributes for a new group; unset fields take the creation defaults
#[derive(Debug, Clone, Default)]
pub struct GroupParams {
    pub name: String,
    pub description: Option<String>,
    pub max_size: Option<i64>,
    pub category_id: Option<CategoryId>,
    pub payment_plan: Option<PaymentPlan>,
    pub discussion_privacy_options: Option<DiscussionPrivacyOptions>,
    pub membership_granted_upon: Option<MembershipGrantedUpon>,
    pub visible_to: Option<VisibilityTerm>,
    pub parent_members_can_see_discussions: bool,
    pub members_can_add_members: bool,
}

impl GroupParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_max_size(mut self, max_size: i64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_visibility(mut self, term: VisibilityTerm) -> Self {
        self.visible_to = Some(term);
        self
    }

    pub fn with_discussion_privacy(mut self, options: DiscussionPrivacyOptions) -> Self {
        self.discussion_privacy_options = Some(options);
        self
    }

    pub fn with_payment_plan(mut self, plan: PaymentPlan) -> Self {
        self.payment_plan = Some(plan);
        self
    }

    pub fn with_membership_granted_upon(mut self, granted_upon: MembershipGrantedUpon) -> Self {
        self.membership_granted_upon = Some(granted_upon);
        self
    }
}

/// Manager for group lifecycle operations
pub trait GroupManager {
    /// Create a top-level group; `creator` becomes its first admin
    fn create_group(&mut self, params: GroupParams, creator: Option<UserId>) -> GroupResult<Group>;

    /// Create a group under `parent_id`
    fn create_subgroup(
        &mut self,
        parent_id: GroupId,
        params: GroupParams,
        creator: Option<UserId>,
    ) -> GroupResult<Group>;

    fn get_group(&self, group_id: GroupId) -> GroupResult<Group>;

    /// Rename and refresh subgroup full names
    fn rename_group(&mut self, group_id: GroupId, new_name: &str) -> GroupResult<Group>;

    fn update_description(&mut self, group_id: GroupId, description: Option<String>) -> GroupResult<Group>;

    /// Apply a visibility term given as text (`public`, `parent_members`, `members`)
    fn set_visibility(&mut self, group_id: GroupId, term: &str) -> GroupResult<Group>;

    fn visibility_term(&self, group_id: GroupId) -> GroupResult<VisibilityTerm>;

    fn set_discussion_privacy_options(
        &mut self,
        group_id: GroupId,
        options: DiscussionPrivacyOptions,
    ) -> GroupResult<Group>;

    fn set_parent(&mut self, group_id: GroupId, parent_id: GroupId) -> GroupResult<Group>;

    /// Archive the group, its discussions and memberships, then its subgroups
    fn archive_group(&mut self, group_id: GroupId) -> GroupResult<()>;

    fn is_archived(&self, group_id: GroupId) -> GroupResult<bool>;

    fn mark_as_setup(&mut self, group_id: GroupId) -> GroupResult<Group>;

    /// Record the billing amount of a top-level group
    fn set_subscription(&mut self, group_id: GroupId, amount_cents: i64) -> GroupResult<Subscription>;

    fn subscription(&self, group_id: GroupId) -> GroupResult<Option<Subscription>>;

    fn is_paying(&self, group_id: GroupId) -> GroupResult<bool>;

    /// Non-archived direct children
    fn subgroups(&self, group_id: GroupId) -> GroupResult<Vec<Group>>;

    fn list_top_level_groups(&self) -> GroupResult<Vec<Group>>;

    /// Open a discussion whose privacy follows the group's settings
    fn start_discussion(
        &mut self,
        group_id: GroupId,
        author_id: UserId,
        title: &str,
        private: Option<bool>,
    ) -> GroupResult<Discussion>;
}

/// Manager for membership, request and invitation operations
pub trait MembershipManager {
    fn add_member(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership>;

    /// Best-effort batch; stops at the first failure without rollback
    fn add_members(
        &mut self,
        group_id: GroupId,
        user_ids: &[UserId],
        inviter_id: Option<UserId>,
    ) -> GroupResult<Vec<Membership>>;

    fn add_admin(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership>;

    fn remove_member(&mut self, group_id: GroupId, user_id: UserId) -> GroupResult<()>;

    fn membership_of(&self, group_id: GroupId, user_id: UserId) -> GroupResult<Option<Membership>>;

    fn members(&self, group_id: GroupId) -> GroupResult<Vec<User>>;

    fn admins(&self, group_id: GroupId) -> GroupResult<Vec<User>>;

    fn contact_person(&self, group_id: GroupId) -> GroupResult<Option<User>>;

    fn admin_email(&self, group_id: GroupId) -> GroupResult<String>;

    fn remaining_invitations(&self, group_id: GroupId) -> GroupResult<i64>;

    fn has_member_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool>;

    fn has_membership_request_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool>;

    fn request_membership(
        &mut self,
        group_id: GroupId,
        name: &str,
        email: &str,
        user_id: Option<UserId>,
    ) -> GroupResult<MembershipRequest>;

    fn pending_membership_requests(&self, group_id: GroupId) -> GroupResult<Vec<MembershipRequest>>;

    /// Record the answer; an approved request from a known user adds them
    fn respond_to_request(
        &mut self,
        request_id: MembershipRequestId,
        response: RequestResponse,
    ) -> GroupResult<Option<Membership>>;

    fn invite(
        &mut self,
        group_id: GroupId,
        recipient_email: &str,
        inviter_id: UserId,
    ) -> GroupResult<Invitation>;

    fn cancel_invitation(&mut self, invitation_id: InvitationId) -> GroupResult<Invitation>;

    /// Accept on behalf of `user_id`, who joins the group
    fn accept_invitation(
        &mut self,
        invitation_id: InvitationId,
        user_id: UserId,
    ) -> GroupResult<Membership>;
}
