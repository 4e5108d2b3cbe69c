//! Membership records and the registry that manages them
//!
//! [`MembershipRegistry`] enforces the capacity rule for top-level groups and
//! keeps `add_member` idempotent: adding an existing member returns the
//! existing membership without touching the counter.

use super::errors::{GroupError, GroupResult};
use super::group::Group;
use super::store::GroupStore;
use super::types::{
    GroupId, InvitationId, MembershipId, MembershipRequestId, Timestamp, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Link between a user and a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub inviter_id: Option<UserId>,
    pub admin: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Membership {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Answer given to a membership request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestResponse {
    Approved,
    Ignored,
}

impl RequestResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestResponse::Approved => "approved",
            RequestResponse::Ignored => "ignored",
        }
    }
}

impl fmt::Display for RequestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestResponse {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(RequestResponse::Approved),
            "ignored" => Ok(RequestResponse::Ignored),
            other => Err(GroupError::InvalidArgument(format!(
                "request response not recognised: {}",
                other
            ))),
        }
    }
}

/// Someone asking to join a group; visitors have no user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub id: MembershipRequestId,
    pub group_id: GroupId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: String,
    /// `None` while pending
    pub response: Option<RequestResponse>,
    pub created_at: Timestamp,
}

impl MembershipRequest {
    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }
}

/// Insert payload for a membership request
#[derive(Debug, Clone)]
pub struct NewMembershipRequest {
    pub group_id: GroupId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: String,
}

/// Invitation sent to an email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub group_id: GroupId,
    pub recipient_email: String,
    pub inviter_id: UserId,
    pub accepted_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Invitation {
    /// Pending invitations count against remaining capacity
    pub fn is_pending(&self) -> bool {
        self.accepted_at.is_none() && self.cancelled_at.is_none()
    }
}

/// Membership rules over a [`GroupStore`]
pub struct MembershipRegistry<'a, S: GroupStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GroupStore + ?Sized> MembershipRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Add `user_id` to `group`, or return the membership it already has.
    ///
    /// Top-level groups refuse new members once `memberships_count` has
    /// reached `max_size`. Subgroups have no limit.
    pub fn add_member(
        &self,
        group: &Group,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership> {
        if let Some(existing) = self.store.find_membership(group.id, user_id)? {
            debug!(group_id = %group.id, user_id = %user_id, "user is already a member");
            return Ok(existing);
        }

        if group.is_top_level() {
            let memberships_count = self.store.memberships_count(group.id)?;
            if memberships_count >= group.max_size {
                warn!(
                    group_id = %group.id,
                    memberships_count,
                    max_size = group.max_size,
                    "membership refused, group is full"
                );
                return Err(GroupError::CapacityExceeded {
                    group_id: group.id,
                    max_size: group.max_size,
                    memberships_count,
                });
            }
        }

        let membership = self.store.find_or_create_membership(group.id, user_id, inviter_id)?;
        debug!(group_id = %group.id, user_id = %user_id, membership_id = %membership.id, "member added");
        Ok(membership)
    }

    /// Add users in order. Stops at the first failure; earlier additions stay.
    pub fn add_members(
        &self,
        group: &Group,
        user_ids: &[UserId],
        inviter_id: Option<UserId>,
    ) -> GroupResult<Vec<Membership>> {
        let mut added = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            added.push(self.add_member(group, user_id, inviter_id)?);
        }
        Ok(added)
    }

    /// Find-or-create a membership and flag it admin.
    ///
    /// Admin grants bypass the capacity rule.
    pub fn add_admin(
        &self,
        group: &Group,
        user_id: UserId,
        inviter_id: Option<UserId>,
    ) -> GroupResult<Membership> {
        let mut membership = self.store.find_or_create_membership(group.id, user_id, inviter_id)?;
        if !membership.admin {
            self.store.set_admin(membership.id, true)?;
            membership.admin = true;
        }
        debug!(group_id = %group.id, user_id = %user_id, "admin granted");
        Ok(membership)
    }

    pub fn remove_member(&self, group: &Group, user_id: UserId) -> GroupResult<()> {
        if !self.store.delete_membership(group.id, user_id)? {
            return Err(GroupError::NotFound(format!(
                "membership of user {} in group {}",
                user_id, group.id
            )));
        }
        debug!(group_id = %group.id, user_id = %user_id, "member removed");
        Ok(())
    }

    pub fn membership_of(&self, group: &Group, user_id: UserId) -> GroupResult<Option<Membership>> {
        self.store.find_membership(group.id, user_id)
    }

    pub fn user_membership_exists(&self, group: &Group, user_id: UserId) -> GroupResult<bool> {
        Ok(self.membership_of(group, user_id)?.is_some())
    }

    /// `max_size - memberships_count - pending invitations`; negative when
    /// the group is already over-committed
    pub fn remaining_invitations(&self, group: &Group) -> GroupResult<i64> {
        let memberships_count = self.store.memberships_count(group.id)?;
        let pending = self.store.pending_invitation_count(group.id)?;
        Ok(group.max_size - memberships_count - pending)
    }

    pub fn has_member_with_email(&self, group: &Group, email: &str) -> GroupResult<bool> {
        self.store.has_member_with_email(group.id, email)
    }

    pub fn has_membership_request_with_email(&self, group: &Group, email: &str) -> GroupResult<bool> {
        self.store.has_membership_request_with_email(group.id, email)
    }

    pub fn members(&self, group: &Group) -> GroupResult<Vec<User>> {
        self.store.members(group.id)
    }

    pub fn admins(&self, group: &Group) -> GroupResult<Vec<User>> {
        self.store.admins(group.id)
    }

    /// Coordinators are the admins under their older name
    pub fn coordinators(&self, group: &Group) -> GroupResult<Vec<User>> {
        self.admins(group)
    }

    /// The admin with the lowest user id
    pub fn contact_person(&self, group: &Group) -> GroupResult<Option<User>> {
        Ok(self.store.admins(group.id)?.into_iter().next())
    }

    pub fn admin_email(&self, group: &Group) -> GroupResult<String> {
        self.contact_person(group)?
            .map(|user| user.email)
            .ok_or_else(|| GroupError::NotFound(format!("admin of group {}", group.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupDefaults;
    use crate::core_group::storage::GroupSqlStore;

    fn setup() -> (GroupSqlStore, Group) {
        let store = GroupSqlStore::memory().unwrap();
        let mut group = Group::draft("Engineering", &GroupDefaults::default());
        group.max_size = 2;
        group.id = store.create_group(&group).unwrap();
        (store, group)
    }

    fn user(store: &GroupSqlStore, name: &str) -> UserId {
        store.create_user(name, &format!("{}@example.org", name)).unwrap().id
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let (store, group) = setup();
        let alice = user(&store, "alice");
        let registry = MembershipRegistry::new(&store);

        let first = registry.add_member(&group, alice, None).unwrap();
        let second = registry.add_member(&group, alice, None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.memberships_count(group.id).unwrap(), 1);
    }

    #[test]
    fn test_capacity_refuses_new_member_when_full() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        for name in ["alice", "bob"] {
            registry.add_member(&group, user(&store, name), None).unwrap();
        }

        let carol = user(&store, "carol");
        let err = registry.add_member(&group, carol, None).unwrap_err();
        assert!(matches!(
            err,
            GroupError::CapacityExceeded { max_size: 2, memberships_count: 2, .. }
        ));
        assert!(registry.membership_of(&group, carol).unwrap().is_none());
    }

    #[test]
    fn test_existing_member_returned_even_when_full() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        let alice = user(&store, "alice");
        registry.add_member(&group, alice, None).unwrap();
        registry.add_member(&group, user(&store, "bob"), None).unwrap();

        assert!(registry.add_member(&group, alice, None).is_ok());
    }

    #[test]
    fn test_subgroups_have_no_capacity() {
        let (store, parent) = setup();
        let mut sub = Group::draft("Backend", &GroupDefaults::default());
        sub.parent_id = Some(parent.id);
        sub.max_size = 0;
        sub.id = store.create_group(&sub).unwrap();
        let registry = MembershipRegistry::new(&store);

        for name in ["alice", "bob", "carol"] {
            registry.add_member(&sub, user(&store, name), None).unwrap();
        }
        assert_eq!(store.memberships_count(sub.id).unwrap(), 3);
    }

    #[test]
    fn test_add_members_stops_at_first_failure() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        let users: Vec<_> = ["alice", "bob", "carol", "dave"]
            .iter()
            .map(|name| user(&store, name))
            .collect();

        let err = registry.add_members(&group, &users, None).unwrap_err();
        assert!(matches!(err, GroupError::CapacityExceeded { .. }));
        assert!(registry.user_membership_exists(&group, users[0]).unwrap());
        assert!(registry.user_membership_exists(&group, users[1]).unwrap());
        assert!(!registry.user_membership_exists(&group, users[3]).unwrap());
    }

    #[test]
    fn test_add_members_preserves_input_order() {
        let (store, mut group) = setup();
        group.max_size = 10;
        let registry = MembershipRegistry::new(&store);
        let mut users: Vec<_> = ["alice", "bob", "carol"]
            .iter()
            .map(|name| user(&store, name))
            .collect();
        users.reverse();

        let added = registry.add_members(&group, &users, None).unwrap();
        let order: Vec<_> = added.iter().map(|m| m.user_id).collect();
        assert_eq!(order, users);
    }

    #[test]
    fn test_contact_person_is_lowest_id_admin() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");

        registry.add_admin(&group, bob, None).unwrap();
        registry.add_admin(&group, alice, None).unwrap();

        let contact = registry.contact_person(&group).unwrap().unwrap();
        assert_eq!(contact.id, alice);
        assert_eq!(registry.admin_email(&group).unwrap(), "alice@example.org");
    }

    #[test]
    fn test_admin_email_without_admins() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        registry.add_member(&group, user(&store, "alice"), None).unwrap();

        assert!(registry.contact_person(&group).unwrap().is_none());
        assert!(matches!(registry.admin_email(&group), Err(GroupError::NotFound(_))));
    }

    #[test]
    fn test_remaining_invitations_counts_pending_only() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        let alice = user(&store, "alice");
        registry.add_member(&group, alice, None).unwrap();

        let pending = store.create_invitation(group.id, "x@example.org", alice).unwrap();
        let cancelled = store.create_invitation(group.id, "y@example.org", alice).unwrap();
        store.set_invitation_cancelled(cancelled.id, Timestamp::now()).unwrap();
        assert!(pending.is_pending());

        assert_eq!(registry.remaining_invitations(&group).unwrap(), 0);

        store.create_invitation(group.id, "z@example.org", alice).unwrap();
        assert_eq!(registry.remaining_invitations(&group).unwrap(), -1);
    }

    #[test]
    fn test_remove_member() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        let alice = user(&store, "alice");
        registry.add_member(&group, alice, None).unwrap();

        registry.remove_member(&group, alice).unwrap();
        assert_eq!(store.memberships_count(group.id).unwrap(), 0);
        assert!(matches!(
            registry.remove_member(&group, alice),
            Err(GroupError::NotFound(_))
        ));
    }

    #[test]
    fn test_email_lookups() {
        let (store, group) = setup();
        let registry = MembershipRegistry::new(&store);
        registry.add_member(&group, user(&store, "alice"), None).unwrap();
        store
            .create_membership_request(&NewMembershipRequest {
                group_id: group.id,
                user_id: None,
                name: "Visitor".to_string(),
                email: "visitor@example.org".to_string(),
            })
            .unwrap();

        assert!(registry.has_member_with_email(&group, "alice@example.org").unwrap());
        assert!(!registry.has_member_with_email(&group, "visitor@example.org").unwrap());
        assert!(registry
            .has_membership_request_with_email(&group, "visitor@example.org")
            .unwrap());
    }

    #[test]
    fn test_request_response_parsing() {
        assert_eq!("approved".parse::<RequestResponse>().unwrap(), RequestResponse::Approved);
        assert!(matches!(
            "maybe".parse::<RequestResponse>(),
            Err(GroupError::InvalidArgument(_))
        ));
    }
}
