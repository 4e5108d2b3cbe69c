//! Group aggregate data and field-level rules

use super::discussion_privacy::{validate_discussion_privacy, DiscussionPrivacyOptions};
use super::errors::{GroupError, ValidationErrors};
use super::types::{CategoryId, GroupId, Timestamp};
use super::visibility::{
    apply_visibility_term, derive_visibility, validate_visibility, VisibilitySettings,
    VisibilityTerm,
};
use crate::config::GroupDefaults;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the group is paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlan {
    Pwyc,
    Subscription,
    ManualSubscription,
    #[default]
    Undetermined,
}

impl PaymentPlan {
    pub const ALL: [PaymentPlan; 4] = [
        PaymentPlan::Pwyc,
        PaymentPlan::Subscription,
        PaymentPlan::ManualSubscription,
        PaymentPlan::Undetermined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPlan::Pwyc => "pwyc",
            PaymentPlan::Subscription => "subscription",
            PaymentPlan::ManualSubscription => "manual_subscription",
            PaymentPlan::Undetermined => "undetermined",
        }
    }
}

impl FromStr for PaymentPlan {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| GroupError::InvalidArgument(format!("payment_plan not recognised: {}", s)))
    }
}

impl fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What grants a membership in the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipGrantedUpon {
    Request,
    #[default]
    Approval,
    Invitation,
}

impl MembershipGrantedUpon {
    pub const ALL: [MembershipGrantedUpon; 3] = [
        MembershipGrantedUpon::Request,
        MembershipGrantedUpon::Approval,
        MembershipGrantedUpon::Invitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipGrantedUpon::Request => "request",
            MembershipGrantedUpon::Approval => "approval",
            MembershipGrantedUpon::Invitation => "invitation",
        }
    }
}

impl FromStr for MembershipGrantedUpon {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| {
                GroupError::InvalidArgument(format!("membership_granted_upon not recognised: {}", s))
            })
    }
}

impl fmt::Display for MembershipGrantedUpon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group, either top-level or a subgroup of a top-level group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Assigned by the store on insert; zero until then
    pub id: GroupId,

    pub name: String,

    /// Cached "<parent name> - <name>" for subgroups, `name` otherwise
    pub full_name: String,

    /// Back reference; the parent does not own its subgroups
    pub parent_id: Option<GroupId>,

    pub description: Option<String>,

    /// Member capacity, enforced for top-level groups only
    pub max_size: i64,

    pub category_id: Option<CategoryId>,

    pub payment_plan: PaymentPlan,

    pub discussion_privacy_options: DiscussionPrivacyOptions,

    pub membership_granted_upon: MembershipGrantedUpon,

    pub is_visible_to_public: bool,

    pub is_visible_to_parent_members: bool,

    pub parent_members_can_see_discussions: bool,

    pub members_can_add_members: bool,

    pub can_start_group: bool,

    pub archived_at: Option<Timestamp>,

    pub setup_completed_at: Option<Timestamp>,

    /// Maintained by the store alongside membership rows
    pub memberships_count: i64,

    /// Maintained by the store alongside discussion rows
    pub discussions_count: i64,

    pub created_at: Timestamp,
}

impl Group {
    /// Unsaved top-level group with creation defaults applied
    pub fn draft(name: impl Into<String>, defaults: &GroupDefaults) -> Self {
        let name = name.into();
        Group {
            id: GroupId::new(0),
            full_name: name.clone(),
            name,
            parent_id: None,
            description: None,
            max_size: defaults.default_max_size,
            category_id: None,
            payment_plan: PaymentPlan::default(),
            discussion_privacy_options: DiscussionPrivacyOptions::default(),
            membership_granted_upon: MembershipGrantedUpon::default(),
            is_visible_to_public: true,
            is_visible_to_parent_members: false,
            parent_members_can_see_discussions: false,
            members_can_add_members: false,
            can_start_group: true,
            archived_at: None,
            setup_completed_at: None,
            memberships_count: 0,
            discussions_count: 0,
            created_at: Timestamp::now(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_subgroup(&self) -> bool {
        !self.is_top_level()
    }

    pub fn is_hidden_from_public(&self) -> bool {
        !self.is_visible_to_public
    }

    /// `parent` must be this group's parent
    pub fn is_subgroup_of_hidden_parent(&self, parent: &Group) -> bool {
        self.is_subgroup() && parent.is_hidden_from_public()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_setup(&self) -> bool {
        self.setup_completed_at.is_some()
    }

    pub fn mark_as_setup(&mut self) {
        self.setup_completed_at = Some(Timestamp::now());
    }

    pub fn visibility_term(&self) -> VisibilityTerm {
        derive_visibility(self.is_visible_to_public, self.is_visible_to_parent_members)
    }

    pub fn set_visibility(&mut self, term: VisibilityTerm) {
        let (public, parent_members) = apply_visibility_term(term);
        self.is_visible_to_public = public;
        self.is_visible_to_parent_members = parent_members;
    }

    pub fn private_discussions_only(&self) -> bool {
        self.discussion_privacy_options == DiscussionPrivacyOptions::PrivateOnly
    }

    pub fn public_discussions_only(&self) -> bool {
        self.discussion_privacy_options == DiscussionPrivacyOptions::PublicOnly
    }

    pub fn discussion_private_default(&self) -> Option<bool> {
        self.discussion_privacy_options.default_privacy()
    }

    pub fn has_manual_subscription(&self) -> bool {
        self.payment_plan == PaymentPlan::ManualSubscription
    }

    pub fn has_subscription_plan(&self, subscription: Option<&Subscription>) -> bool {
        self.is_top_level() && subscription.is_some()
    }

    /// Subscription amount in cents, when there is one
    pub fn subscription_plan(&self, subscription: Option<&Subscription>) -> Option<i64> {
        subscription.map(|s| s.amount_cents)
    }

    /// Paying groups are on a manual subscription or have a non-zero subscription
    pub fn is_paying(&self, subscription: Option<&Subscription>) -> bool {
        self.has_manual_subscription() || subscription.is_some_and(|s| s.amount_cents > 0)
    }

    /// Run every field rule and report all violations at once.
    ///
    /// `parent` is the loaded parent group when `parent_id` is set.
    pub fn validate(&self, parent: Option<&Group>, limits: &GroupDefaults) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "can't be blank");
        }
        if self.name.chars().count() > limits.max_name_length {
            errors.add(
                "name",
                format!("is too long (maximum is {} characters)", limits.max_name_length),
            );
        }
        if let Some(description) = &self.description {
            if description.chars().count() > limits.max_description_length {
                errors.add(
                    "description",
                    format!(
                        "is too long (maximum is {} characters)",
                        limits.max_description_length
                    ),
                );
            }
        }
        if self.max_size < 0 {
            errors.add("max_size", "must not be negative");
        }

        if let Some(parent_id) = self.parent_id {
            match parent {
                Some(parent) if parent.id == parent_id => {
                    if parent.parent_id.is_some() {
                        errors.add("base", "Can't set a subgroup as parent");
                    }
                }
                _ => errors.add("parent", "must exist"),
            }
        }

        validate_visibility(
            VisibilitySettings {
                is_visible_to_public: self.is_visible_to_public,
                is_visible_to_parent_members: self.is_visible_to_parent_members,
                parent_members_can_see_discussions: self.parent_members_can_see_discussions,
                is_subgroup: self.is_subgroup(),
            },
            &mut errors,
        );
        validate_discussion_privacy(
            self.discussion_privacy_options,
            self.is_visible_to_public,
            &mut errors,
        );

        errors.into_result()
    }
}

/// Billing record of a top-level group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub group_id: GroupId,
    /// Amount in the smallest currency unit
    pub amount_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> GroupDefaults {
        GroupDefaults::default()
    }

    fn saved(id: i64, name: &str, parent: Option<i64>) -> Group {
        let mut group = Group::draft(name, &defaults());
        group.id = GroupId::new(id);
        group.parent_id = parent.map(GroupId::new);
        group
    }

    #[test]
    fn test_draft_applies_defaults() {
        let group = Group::draft("Engineering", &defaults());
        assert_eq!(group.full_name, "Engineering");
        assert_eq!(group.discussion_privacy_options, DiscussionPrivacyOptions::PublicOrPrivate);
        assert_eq!(group.membership_granted_upon, MembershipGrantedUpon::Approval);
        assert_eq!(group.payment_plan, PaymentPlan::Undetermined);
        assert_eq!(group.max_size, 300);
        assert_eq!(group.visibility_term(), VisibilityTerm::Public);
        assert!(group.is_top_level());
        assert!(group.validate(None, &defaults()).is_ok());
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let mut group = Group::draft("", &defaults());
        group.description = Some("x".repeat(251));
        group.is_visible_to_parent_members = true;

        let errors = group.validate(None, &defaults()).unwrap_err();
        assert!(errors.has_error_on("name"));
        assert!(errors.has_error_on("description"));
        assert!(errors.has_error_on("is_visible_to_parent_members"));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_name_length_counts_characters() {
        let group = Group::draft("é".repeat(250), &defaults());
        assert!(group.validate(None, &defaults()).is_ok());

        let group = Group::draft("é".repeat(251), &defaults());
        assert!(group.validate(None, &defaults()).is_err());
    }

    #[test]
    fn test_subgroup_cannot_be_parent() {
        let parent = saved(2, "Backend", Some(1));
        let child = saved(3, "Storage", Some(2));

        let errors = child.validate(Some(&parent), &defaults()).unwrap_err();
        assert!(errors.has_error_on("base"));
    }

    #[test]
    fn test_missing_parent_is_reported() {
        let child = saved(3, "Storage", Some(2));
        let errors = child.validate(None, &defaults()).unwrap_err();
        assert!(errors.has_error_on("parent"));
    }

    #[test]
    fn test_parent_members_visibility_on_subgroup() {
        let parent = saved(1, "Engineering", None);
        let mut child = saved(2, "Backend", Some(1));
        child.set_visibility(VisibilityTerm::ParentMembers);
        child.parent_members_can_see_discussions = true;

        assert!(child.validate(Some(&parent), &defaults()).is_ok());
        assert_eq!(child.visibility_term(), VisibilityTerm::ParentMembers);
        assert!(child.is_hidden_from_public());
    }

    #[test]
    fn test_public_only_discussions_in_hidden_group_rejected() {
        let mut group = Group::draft("Board", &defaults());
        group.set_visibility(VisibilityTerm::Members);
        group.discussion_privacy_options = DiscussionPrivacyOptions::PublicOnly;

        let errors = group.validate(None, &defaults()).unwrap_err();
        assert!(errors.has_error_on("discussion_privacy_options"));
    }

    #[test]
    fn test_discussion_privacy_predicates_are_distinct() {
        let mut group = Group::draft("Ops", &defaults());
        group.discussion_privacy_options = DiscussionPrivacyOptions::PublicOnly;
        assert!(group.public_discussions_only());
        assert!(!group.private_discussions_only());
        assert_eq!(group.discussion_private_default(), Some(false));

        group.discussion_privacy_options = DiscussionPrivacyOptions::PrivateOnly;
        assert!(!group.public_discussions_only());
        assert!(group.private_discussions_only());
    }

    #[test]
    fn test_is_paying() {
        let mut group = saved(1, "Co-op", None);
        assert!(!group.is_paying(None));

        let free = Subscription { group_id: group.id, amount_cents: 0 };
        assert!(!group.is_paying(Some(&free)));

        let paid = Subscription { group_id: group.id, amount_cents: 1500 };
        assert!(group.is_paying(Some(&paid)));

        group.payment_plan = PaymentPlan::ManualSubscription;
        assert!(group.is_paying(None));
    }

    #[test]
    fn test_hidden_parent_predicate() {
        let mut parent = saved(1, "Engineering", None);
        let child = saved(2, "Backend", Some(1));
        assert!(!child.is_subgroup_of_hidden_parent(&parent));

        parent.set_visibility(VisibilityTerm::Members);
        assert!(child.is_subgroup_of_hidden_parent(&parent));
        assert!(!parent.is_subgroup_of_hidden_parent(&parent));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("pwyc".parse::<PaymentPlan>().unwrap(), PaymentPlan::Pwyc);
        assert_eq!(
            "invitation".parse::<MembershipGrantedUpon>().unwrap(),
            MembershipGrantedUpon::Invitation
        );
        assert!(matches!(
            "free".parse::<PaymentPlan>(),
            Err(GroupError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mark_as_setup() {
        let mut group = Group::draft("New", &defaults());
        assert!(!group.is_setup());
        group.mark_as_setup();
        assert!(group.is_setup());
    }
}
