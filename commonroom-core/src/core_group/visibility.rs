//! Group visibility rules
//!
//! A group stores visibility as two flags. The pair maps onto exactly one
//! [`VisibilityTerm`]; precedence is public, then parent members, then
//! members only.

use super::errors::{GroupError, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who can see a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityTerm {
    /// Anyone, including visitors who are not signed in
    Public,
    /// Members of the parent group; only meaningful for subgroups
    ParentMembers,
    /// Members of the group itself
    Members,
}

impl VisibilityTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityTerm::Public => "public",
            VisibilityTerm::ParentMembers => "parent_members",
            VisibilityTerm::Members => "members",
        }
    }
}

impl fmt::Display for VisibilityTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityTerm {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(VisibilityTerm::Public),
            "parent_members" => Ok(VisibilityTerm::ParentMembers),
            "members" => Ok(VisibilityTerm::Members),
            other => Err(GroupError::InvalidArgument(format!(
                "visible_to term not recognised: {}",
                other
            ))),
        }
    }
}

/// Map the stored flags onto a visibility term
pub fn derive_visibility(is_visible_to_public: bool, is_visible_to_parent_members: bool) -> VisibilityTerm {
    if is_visible_to_public {
        VisibilityTerm::Public
    } else if is_visible_to_parent_members {
        VisibilityTerm::ParentMembers
    } else {
        VisibilityTerm::Members
    }
}

/// Flags `(is_visible_to_public, is_visible_to_parent_members)` for a term
pub fn apply_visibility_term(term: VisibilityTerm) -> (bool, bool) {
    match term {
        VisibilityTerm::Public => (true, false),
        VisibilityTerm::ParentMembers => (false, true),
        VisibilityTerm::Members => (false, false),
    }
}

/// String entry point used by outer layers; unknown terms are `InvalidArgument`
pub fn apply_visibility_str(term: &str) -> Result<(bool, bool), GroupError> {
    term.parse().map(apply_visibility_term)
}

/// Visibility facts about one group, as read by [`validate_visibility`]
#[derive(Debug, Clone, Copy)]
pub struct VisibilitySettings {
    pub is_visible_to_public: bool,
    pub is_visible_to_parent_members: bool,
    pub parent_members_can_see_discussions: bool,
    pub is_subgroup: bool,
}

/// Append every visibility violation to `errors`
pub fn validate_visibility(settings: VisibilitySettings, errors: &mut ValidationErrors) {
    if settings.is_visible_to_parent_members {
        if settings.is_visible_to_public {
            errors.add(
                "is_visible_to_parent_members",
                "cannot be set on a group that is visible to the public",
            );
        }
        if !settings.is_subgroup {
            errors.add(
                "is_visible_to_parent_members",
                "can only be set on a subgroup",
            );
        }
    }

    if settings.parent_members_can_see_discussions && !settings.is_visible_to_parent_members {
        errors.add(
            "parent_members_can_see_discussions",
            "requires the group to be visible to parent members",
        );
    }
}
