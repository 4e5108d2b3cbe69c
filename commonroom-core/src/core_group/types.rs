//! Identifier and timestamp types for groups and memberships
//!
//! Every record is referenced by a storage-assigned integer id. Groups refer
//! to their parent by `GroupId` rather than by pointer, which keeps the
//! cascade traversals in `hierarchy` free of shared ownership.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                $name(id)
            }
        }
    };
}

record_id!(
    /// Identifier of a group (top-level or subgroup)
    GroupId
);
record_id!(
    /// Identifier of a user; ordering decides the contact person
    UserId
);
record_id!(MembershipId);
record_id!(MembershipRequestId);
record_id!(InvitationId);
record_id!(DiscussionId);
record_id!(CategoryId);

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Column representation; SQLite integers are signed
    pub(crate) fn to_sql(self) -> i64 {
        self.0 as i64
    }

    pub(crate) fn from_sql(millis: i64) -> Self {
        Timestamp(millis.max(0) as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A platform user as seen by the group core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_by_value() {
        assert!(UserId::new(3) < UserId::new(11));
        assert_eq!(GroupId::from(7).value(), 7);
        assert_eq!(MembershipId::new(42).to_string(), "42");
    }

    #[test]
    fn test_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&GroupId::new(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn test_timestamp_sql_conversion_clamps_negative() {
        assert_eq!(Timestamp::from_sql(-5), Timestamp::from_millis(0));
        let now = Timestamp::now();
        assert_eq!(Timestamp::from_sql(now.to_sql()), now);
    }
}
