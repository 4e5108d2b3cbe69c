//! Discussion rows as seen by the group core
//!
//! Discussions are owned by a separate collaborator; the core only creates
//! them with a resolved privacy value and archives them during a cascade.

use super::types::{DiscussionId, GroupId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub group_id: GroupId,
    pub author_id: UserId,
    pub title: String,
    pub private: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Discussion {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Insert payload for a discussion
#[derive(Debug, Clone)]
pub struct NewDiscussion {
    pub group_id: GroupId,
    pub author_id: UserId,
    pub title: String,
    pub private: bool,
}
