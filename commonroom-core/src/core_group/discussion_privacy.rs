//! Discussion privacy defaults derived from the group setting

use super::errors::{GroupError, GroupResult, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which discussion privacy values a group allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionPrivacyOptions {
    PublicOnly,
    PrivateOnly,
    #[default]
    PublicOrPrivate,
}

impl DiscussionPrivacyOptions {
    pub const ALL: [DiscussionPrivacyOptions; 3] = [
        DiscussionPrivacyOptions::PublicOnly,
        DiscussionPrivacyOptions::PrivateOnly,
        DiscussionPrivacyOptions::PublicOrPrivate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscussionPrivacyOptions::PublicOnly => "public_only",
            DiscussionPrivacyOptions::PrivateOnly => "private_only",
            DiscussionPrivacyOptions::PublicOrPrivate => "public_or_private",
        }
    }

    /// `Some(private)` when the group forces a value, `None` when each
    /// discussion decides for itself
    pub fn default_privacy(&self) -> Option<bool> {
        match self {
            DiscussionPrivacyOptions::PublicOrPrivate => None,
            DiscussionPrivacyOptions::PublicOnly => Some(false),
            DiscussionPrivacyOptions::PrivateOnly => Some(true),
        }
    }
}

impl fmt::Display for DiscussionPrivacyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscussionPrivacyOptions {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| {
                GroupError::InvalidArgument(format!("discussion_privacy_options not recognised: {}", s))
            })
    }
}

/// Default privacy for a raw stored setting.
///
/// The setting is always one of the three enum values once validated, so an
/// unknown string here means a broken invariant rather than bad input.
pub fn default_privacy(raw: &str) -> GroupResult<Option<bool>> {
    raw.parse::<DiscussionPrivacyOptions>()
        .map(|option| option.default_privacy())
        .map_err(|_| GroupError::InvalidState(format!("invalid discussion_privacy value: {}", raw)))
}

/// Privacy of a new discussion: the group's forced value, or the caller's choice
pub fn resolve_discussion_privacy(
    options: DiscussionPrivacyOptions,
    requested: Option<bool>,
) -> GroupResult<bool> {
    match (options.default_privacy(), requested) {
        (Some(forced), _) => Ok(forced),
        (None, Some(private)) => Ok(private),
        (None, None) => Err(GroupError::InvalidArgument(
            "group allows public or private discussions; privacy must be chosen".to_string(),
        )),
    }
}

/// Public discussions cannot live in a group the public cannot see
pub fn validate_discussion_privacy(
    options: DiscussionPrivacyOptions,
    is_visible_to_public: bool,
    errors: &mut ValidationErrors,
) {
    if options == DiscussionPrivacyOptions::PublicOnly && !is_visible_to_public {
        errors.add(
            "discussion_privacy_options",
            "cannot be public_only for a group hidden from the public",
        );
    }
}
