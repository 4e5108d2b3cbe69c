//! Group & Membership Rules
//!
//! Hierarchical groups with one level of subgroups, capacity-limited
//! membership and a small visibility/privacy rule engine.
//!
//! ## Architecture
//!
//! - **Group**: aggregate data plus batched field validation
//! - **VisibilityPolicy** (`visibility`): tri-state term derived from two flags
//! - **DiscussionPrivacyPolicy** (`discussion_privacy`): default privacy of new discussions
//! - **MembershipRegistry** (`membership`): find-or-create memberships, capacity, admins
//! - **GroupHierarchy** (`hierarchy`): parent rule, full-name propagation, archive cascade
//! - **GroupStore** (`store`): storage contract; `storage` holds the SQLite implementation
//!
//! Records are addressed by id and loaded through the store, never linked
//! by live references.

pub mod discussion;
pub mod discussion_privacy;
pub mod errors;
pub mod group;
pub mod hierarchy;
pub mod manager;
pub mod manager_impl;
pub mod membership;
pub mod storage;
pub mod store;
pub mod types;
pub mod visibility;

pub use discussion::{Discussion, NewDiscussion};
pub use discussion_privacy::{default_privacy, resolve_discussion_privacy, DiscussionPrivacyOptions};
pub use errors::{FieldError, GroupError, GroupResult, StorageError, ValidationErrors};
pub use group::{Group, MembershipGrantedUpon, PaymentPlan, Subscription};
pub use hierarchy::{calculate_full_name, GroupHierarchy};
pub use manager::{GroupManager, GroupParams, MembershipManager};
pub use manager_impl::GroupManagerImpl;
pub use membership::{
    Invitation, Membership, MembershipRegistry, MembershipRequest, NewMembershipRequest,
    RequestResponse,
};
pub use storage::GroupSqlStore;
pub use store::GroupStore;
pub use types::{
    CategoryId, DiscussionId, GroupId, InvitationId, MembershipId, MembershipRequestId, Timestamp,
    User, UserId,
};
pub use visibility::{apply_visibility_term, derive_visibility, VisibilityTerm};
