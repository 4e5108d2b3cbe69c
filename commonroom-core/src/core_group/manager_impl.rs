//! Manager trait implementations over a group store

use super::discussion::{Discussion, NewDiscussion};
use super::discussion_privacy::{resolve_discussion_privacy, DiscussionPrivacyOptions};
use super::errors::{GroupError, GroupResult, ValidationErrors};
use super::group::{Group, Subscription};
use super::hierarchy::{calculate_full_name, GroupHierarchy};
use super::manager::{GroupManager, GroupParams, MembershipManager};
use super::membership::{
    Invitation, Membership, MembershipRegistry, MembershipRequest, NewMembershipRequest,
    RequestResponse,
};
use super::store::GroupStore;
use super::types::{GroupId, InvitationId, MembershipRequestId, Timestamp, User, UserId};
use super::visibility::VisibilityTerm;
use crate::config::GroupDefaults;
use tracing::{debug, info};

/// Manager implementation with the group rules
pub struct GroupManagerImpl<S: GroupStore> {
    store: S,
    defaults: GroupDefaults,
}

impl<S: GroupStore> GroupManagerImpl<S> {
    /// Create a new manager with storage and creation defaults
    pub fn new(store: S, defaults: GroupDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register_user(&mut self, name: &str, email: &str) -> GroupResult<User> {
        let user = self.store.create_user(name, email)?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    fn registry(&self) -> MembershipRegistry<'_, S> {
        MembershipRegistry::new(&self.store)
    }

    fn hierarchy(&self) -> GroupHierarchy<'_, S> {
        GroupHierarchy::new(&self.store, &self.defaults)
    }

    /// Apply params over the creation defaults
    fn build_group(&self, params: GroupParams, parent: Option<&Group>) -> Group {
        let mut group = Group::draft(params.name, &self.defaults);
        group.description = params.description;
        group.category_id = params.category_id;
        group.parent_members_can_see_discussions = params.parent_members_can_see_discussions;
        group.members_can_add_members = params.members_can_add_members;
        if let Some(max_size) = params.max_size {
            group.max_size = max_size;
        }
        if let Some(plan) = params.payment_plan {
            group.payment_plan = plan;
        }
        if let Some(options) = params.discussion_privacy_options {
            group.discussion_privacy_options = options;
        }
        if let Some(granted_upon) = params.membership_granted_upon {
            group.membership_granted_upon = granted_upon;
        }

        if let Some(parent) = parent {
            group.parent_id = Some(parent.id);
            group.full_name = calculate_full_name(&group.name, Some(&parent.name));
        }

        match params.visible_to {
            Some(term) => group.set_visibility(term),
            // A hidden parent's subgroups start out hidden as well
            None if parent.is_some_and(|p| p.is_hidden_from_public()) => {
                group.set_visibility(VisibilityTerm::ParentMembers)
            }
            None => {}
        }
        group
    }

    fn insert_group(&self, group: Group, parent: Option<&Group>, creator: Option<UserId>) -> GroupResult<Group> {
        group.validate(parent, &self.defaults)?;
        // Creator must resolve before anything is written
        if let Some(creator) = creator {
            self.store.get_user(creator)?;
        }
        let group_id = self.store.create_group(&group)?;
        let group = Group { id: group_id, ..group };

        if let Some(creator) = creator {
            self.registry().add_admin(&group, creator, None)?;
        }

        info!(group_id = %group_id, full_name = %group.full_name, "group created");
        self.store.get_group(group_id)
    }

    /// Persist `group` after running the field rules against its parent
    fn save_group(&self, group: &Group) -> GroupResult<()> {
        let parent = self.hierarchy().parent_of(group)?;
        group.validate(parent.as_ref(), &self.defaults)?;
        self.store.update_group(group)
    }
}

impl<S: GroupStore> GroupManager for GroupManagerImpl<S> {
    fn create_group(&mut self, params: GroupParams, creator: Option<UserId>) -> GroupResult<Group> {
        let group = self.build_group(params, None);
        self.insert_group(group, None, creator)
    }

    fn create_subgroup(
        &mut self,
        parent_id: GroupId,
        params: GroupParams,
        creator: Option<UserId>,
    ) -> GroupResult<Group> {
        let parent = self.store.get_group(parent_id)?;
        if parent.is_archived() {
            return Err(GroupError::InvalidState(format!("group {} is archived", parent_id)));
        }
        let group = self.build_group(params, Some(&parent));
        self.insert_group(group, Some(&parent), creator)
    }

    fn get_group(&self, group_id: GroupId) -> GroupResult<Group> {
        self.store.get_group(group_id)
    }

    fn rename_group(&mut self, group_id: GroupId, new_name: &str) -> GroupResult<Group> {
        let mut group = self.store.get_group(group_id)?;
        self.hierarchy().rename_cascade(&mut group, new_name)?;
        Ok(group)
    }

    fn update_description(&mut self, group_id: GroupId, description: Option<String>) -> GroupResult<Group> {
        let mut group = self.store.get_group(group_id)?;
        group.description = description;
        self.save_group(&group)?;
        Ok(group)
    }

    fn set_visibility(&mut self, group_id: GroupId, term: &str) -> GroupResult<Group> {
        let term: VisibilityTerm = term.parse()?;
        let mut group = self.store.get_group(group_id)?;
        group.set_visibility(term);
        self.save_group(&group)?;
        info!(group_id = %group_id, visible_to = %term, "visibility changed");
        Ok(group)
    }

    fn visibility_term(&self, group_id: GroupId) -> GroupResult<VisibilityTerm> {
        Ok(self.store.get_group(group_id)?.visibility_term())
    }

    fn set_discussion_privacy_options(
        &mut self,
        group_id: GroupId,
        options: DiscussionPrivacyOptions,
    ) -> GroupResult<Group> {
        let mut group = self.store.get_group(group_id)?;
        group.discussion_privacy_options = options;
        self.save_group(&group)?;
        Ok(group)
    }

    fn set_parent(&mut self, group_id: GroupId, parent_id: GroupId) -> GroupResult<Group> {
        let mut group = self.store.get_group(group_id)?;
        self.hierarchy().set_parent(&mut group, parent_id)?;
        Ok(group)
    }

    fn archive_group(&mut self, group_id: GroupId) -> GroupResult<()> {
        let group = self.store.get_group(group_id)?;
        self.hierarchy().archive(&group)
    }

    fn is_archived(&self, group_id: GroupId) -> GroupResult<bool> {
        Ok(self.store.get_group(group_id)?.is_archived())
    }

    fn mark_as_setup(&mut self, group_id: GroupId) -> GroupResult<Group> {
        let mut group = self.store.get_group(group_id)?;
        group.mark_as_setup();
        self.store.update_group(&group)?;
        Ok(group)
    }

    fn set_subscription(&mut self, group_id: GroupId, amount_cents: i64) -> GroupResult<Subscription> {
        let group = self.store.get_group(group_id)?;

        let mut errors = ValidationErrors::new();
        if group.is_subgroup() {
            errors.add("base", "Only top-level groups can have a subscription");
        }
        if amount_cents < 0 {
            errors.add("amount_cents", "must not be negative");
        }
        errors.into_result()?;

        let subscription = Subscription { group_id, amount_cents };
        self.store.upsert_subscription(&subscription)?;
        info!(group_id = %group_id, amount_cents, "subscription recorded");
        Ok(subscription)
    }

    fn subscription(&self, group_id: GroupId) -> GroupResult<Option<Subscription>> {
        self.store.get_subscription(group_id)
    }

    fn is_paying(&self, group_id: GroupId) -> GroupResult<bool> {
        let group = self.store.get_group(group_id)?;
        let subscription = self.store.get_subscription(group_id)?;
        Ok(group.is_paying(subscription.as_ref()))
    }

    fn subgroups(&self, group_id: GroupId) -> GroupResult<Vec<Group>> {
        self.store.subgroups(group_id, false)
    }

    fn list_top_level_groups(&self) -> GroupResult<Vec<Group>> {
        self.store.list_top_level_groups()
    }

    fn start_discussion(
        &mut self,
        group_id: GroupId,
        author_id: UserId,
        title: &str,
        private: Option<bool>,
    ) -> GroupResult<Discussion> {
        let group = self.store.get_group(group_id)?;
        if group.is_archived() {
            return Err(GroupError::InvalidState(format!("group {} is archived", group_id)));
        }
        let private = resolve_discussion_privacy(group.discussion_privacy_options, private)?;

        let discussion = self.store.create_discussion(&NewDiscussion {
            group_id,
            author_id,
            title: title.to_string(),
            private,
        })?;
        debug!(group_id = %group_id, discussion_id = %discussion.id, private, "discussion started");
        Ok(discussion)
    }
}

impl<S: GroupStore> MembershipManager for GroupManagerImpl<S> {
    fn add_member(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership> {
        let group = self.store.get_group(group_id)?;
        self.registry().add_member(&group, user_id, inviter_id)
    }

    fn add_members(
        &mut self,
        group_id: GroupId,
        user_ids: &[UserId],
        inviter_id: Option<UserId>,
    ) -> GroupResult<Vec<Membership>> {
        let group = self.store.get_group(group_id)?;
        self.registry().add_members(&group, user_ids, inviter_id)
    }

    fn add_admin(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership> {
        let group = self.store.get_group(group_id)?;
        self.registry().add_admin(&group, user_id, inviter_id)
    }

    fn remove_member(&mut self, group_id: GroupId, user_id: UserId) -> GroupResult<()> {
        let group = self.store.get_group(group_id)?;
        self.registry().remove_member(&group, user_id)
    }

    fn membership_of(&self, group_id: GroupId, user_id: UserId) -> GroupResult<Option<Membership>> {
        let group = self.store.get_group(group_id)?;
        self.registry().membership_of(&group, user_id)
    }

    fn members(&self, group_id: GroupId) -> GroupResult<Vec<User>> {
        let group = self.store.get_group(group_id)?;
        self.registry().members(&group)
    }

    fn admins(&self, group_id: GroupId) -> GroupResult<Vec<User>> {
        let group = self.store.get_group(group_id)?;
        self.registry().admins(&group)
    }

    fn contact_person(&self, group_id: GroupId) -> GroupResult<Option<User>> {
        let group = self.store.get_group(group_id)?;
        self.registry().contact_person(&group)
    }

    fn admin_email(&self, group_id: GroupId) -> GroupResult<String> {
        let group = self.store.get_group(group_id)?;
        self.registry().admin_email(&group)
    }

    fn remaining_invitations(&self, group_id: GroupId) -> GroupResult<i64> {
        let group = self.store.get_group(group_id)?;
        self.registry().remaining_invitations(&group)
    }

    fn has_member_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool> {
        let group = self.store.get_group(group_id)?;
        self.registry().has_member_with_email(&group, email)
    }

    fn has_membership_request_with_email(&self, group_id: GroupId, email: &str) -> GroupResult<bool> {
        let group = self.store.get_group(group_id)?;
        self.registry().has_membership_request_with_email(&group, email)
    }

    fn request_membership(
        &mut self,
        group_id: GroupId,
        name: &str,
        email: &str,
        user_id: Option<UserId>,
    ) -> GroupResult<MembershipRequest> {
        let group = self.store.get_group(group_id)?;

        let mut errors = ValidationErrors::new();
        if name.trim().is_empty() {
            errors.add("name", "can't be blank");
        }
        if email.trim().is_empty() {
            errors.add("email", "can't be blank");
        }
        errors.into_result()?;

        let request = self.store.create_membership_request(&NewMembershipRequest {
            group_id: group.id,
            user_id,
            name: name.to_string(),
            email: email.to_string(),
        })?;
        debug!(group_id = %group_id, request_id = %request.id, "membership requested");
        Ok(request)
    }

    fn pending_membership_requests(&self, group_id: GroupId) -> GroupResult<Vec<MembershipRequest>> {
        self.store.pending_membership_requests(group_id)
    }

    fn respond_to_request(
        &mut self,
        request_id: MembershipRequestId,
        response: RequestResponse,
    ) -> GroupResult<Option<Membership>> {
        let request = self.store.get_membership_request(request_id)?;
        if !request.is_pending() {
            return Err(GroupError::InvalidState(format!(
                "membership request {} already answered",
                request_id
            )));
        }

        // Join first so a full group leaves the request pending
        let membership = match (response, request.user_id) {
            (RequestResponse::Approved, Some(user_id)) => {
                let group = self.store.get_group(request.group_id)?;
                Some(self.registry().add_member(&group, user_id, None)?)
            }
            _ => None,
        };

        self.store.set_request_response(request_id, response)?;
        debug!(request_id = %request_id, response = %response, "membership request answered");
        Ok(membership)
    }

    fn invite(
        &mut self,
        group_id: GroupId,
        recipient_email: &str,
        inviter_id: UserId,
    ) -> GroupResult<Invitation> {
        let group = self.store.get_group(group_id)?;
        if recipient_email.trim().is_empty() {
            return Err(ValidationErrors::single("recipient_email", "can't be blank").into());
        }
        let invitation = self.store.create_invitation(group.id, recipient_email, inviter_id)?;
        debug!(group_id = %group_id, invitation_id = %invitation.id, "invitation created");
        Ok(invitation)
    }

    fn cancel_invitation(&mut self, invitation_id: InvitationId) -> GroupResult<Invitation> {
        let invitation = self.store.get_invitation(invitation_id)?;
        if invitation.accepted_at.is_some() {
            return Err(GroupError::InvalidState(format!(
                "invitation {} was already accepted",
                invitation_id
            )));
        }
        if invitation.cancelled_at.is_none() {
            self.store.set_invitation_cancelled(invitation_id, Timestamp::now())?;
        }
        self.store.get_invitation(invitation_id)
    }

    fn accept_invitation(
        &mut self,
        invitation_id: InvitationId,
        user_id: UserId,
    ) -> GroupResult<Membership> {
        let invitation = self.store.get_invitation(invitation_id)?;
        if !invitation.is_pending() {
            return Err(GroupError::InvalidState(format!(
                "invitation {} is no longer pending",
                invitation_id
            )));
        }

        let group = self.store.get_group(invitation.group_id)?;
        let membership = self.registry().add_member(&group, user_id, Some(invitation.inviter_id))?;
        self.store.set_invitation_accepted(invitation_id, Timestamp::now())?;
        Ok(membership)
    }
}
