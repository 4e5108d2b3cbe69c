/*
    group_rules.rs - Group rule engine against an on-disk store

    Exercises hierarchy, capacity, idempotence and archive cascade through
    the public manager API with a SQLite file per test.
*/

use commonroom_core::config::GroupDefaults;
use commonroom_core::core_group::{
    default_privacy, DiscussionPrivacyOptions, GroupError, GroupManager, GroupManagerImpl,
    GroupParams, GroupSqlStore, GroupStore, MembershipManager, UserId, VisibilityTerm,
};
use tempfile::{tempdir, TempDir};

struct Harness {
    _dir: TempDir,
    manager: GroupManagerImpl<GroupSqlStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let store = GroupSqlStore::open(dir.path().join("groups.db"), 4).unwrap();
        Self { _dir: dir, manager: GroupManagerImpl::new(store, GroupDefaults::default()) }
    }

    fn users(&mut self, names: &[&str]) -> Vec<UserId> {
        names
            .iter()
            .map(|name| {
                self.manager
                    .register_user(name, &format!("{}@example.org", name))
                    .unwrap()
                    .id
            })
            .collect()
    }
}

/// Renaming a parent refreshes the full name of its subgroups
#[test]
fn test_rename_propagates_to_subgroups() {
    let mut h = Harness::new();
    let eng = h.manager.create_group(GroupParams::new("Engineering"), None).unwrap();
    let backend = h.manager.create_subgroup(eng.id, GroupParams::new("Backend"), None).unwrap();
    assert_eq!(backend.full_name, "Engineering - Backend");

    h.manager.rename_group(eng.id, "Eng").unwrap();

    assert_eq!(h.manager.get_group(eng.id).unwrap().full_name, "Eng");
    assert_eq!(h.manager.get_group(backend.id).unwrap().full_name, "Eng - Backend");
}

/// A full top-level group refuses new members; its subgroup never does
#[test]
fn test_capacity_applies_to_top_level_only() {
    let mut h = Harness::new();
    let users = h.users(&["u1", "u2", "u3", "u4", "u5", "u6"]);
    let top = h
        .manager
        .create_group(GroupParams::new("Engineering").with_max_size(5), None)
        .unwrap();
    let sub = h.manager.create_subgroup(top.id, GroupParams::new("Backend"), None).unwrap();

    h.manager.add_members(top.id, &users[..5], None).unwrap();
    assert_eq!(h.manager.get_group(top.id).unwrap().memberships_count, 5);

    match h.manager.add_member(top.id, users[5], None) {
        Err(GroupError::CapacityExceeded { max_size, memberships_count, .. }) => {
            assert_eq!(max_size, 5);
            assert_eq!(memberships_count, 5);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }

    h.manager.add_members(sub.id, &users, None).unwrap();
    assert_eq!(h.manager.get_group(sub.id).unwrap().memberships_count, 6);
    assert_eq!(h.manager.remaining_invitations(top.id).unwrap(), 0);
}

/// Adding the same user twice yields one membership
#[test]
fn test_add_member_twice_returns_same_membership() {
    let mut h = Harness::new();
    let alice = h.users(&["alice"])[0];
    let group = h.manager.create_group(GroupParams::new("Engineering"), None).unwrap();

    let first = h.manager.add_member(group.id, alice, None).unwrap();
    let second = h.manager.add_member(group.id, alice, None).unwrap();
    let admin = h.manager.add_admin(group.id, alice, None).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, admin.id);
    assert!(admin.admin);
    assert_eq!(h.manager.get_group(group.id).unwrap().memberships_count, 1);
}

/// Archiving a parent archives its discussions, memberships and subgroups
#[test]
fn test_archive_cascades_through_subtree() {
    let mut h = Harness::new();
    let users = h.users(&["alice", "bob"]);
    let top = h.manager.create_group(GroupParams::new("Engineering"), Some(users[0])).unwrap();
    let sub_a = h.manager.create_subgroup(top.id, GroupParams::new("Backend"), None).unwrap();
    let sub_b = h.manager.create_subgroup(top.id, GroupParams::new("Frontend"), None).unwrap();
    h.manager.add_member(sub_a.id, users[1], None).unwrap();
    h.manager.add_member(sub_b.id, users[0], None).unwrap();
    h.manager.start_discussion(top.id, users[0], "Plans", Some(false)).unwrap();
    h.manager.start_discussion(sub_a.id, users[1], "Schema", Some(true)).unwrap();

    h.manager.archive_group(top.id).unwrap();

    let store = h.manager.store();
    for group_id in [top.id, sub_a.id, sub_b.id] {
        assert!(h.manager.is_archived(group_id).unwrap());
        assert!(store.memberships(group_id).unwrap().iter().all(|m| m.archived_at.is_some()));
        assert!(store.discussions(group_id).unwrap().iter().all(|d| d.archived_at.is_some()));
    }
    assert!(h.manager.subgroups(top.id).unwrap().is_empty());
}

/// A subgroup can't become the parent of another group
#[test]
fn test_set_parent_to_subgroup_fails() {
    let mut h = Harness::new();
    let top = h.manager.create_group(GroupParams::new("Engineering"), None).unwrap();
    let sub_a = h.manager.create_subgroup(top.id, GroupParams::new("Backend"), None).unwrap();
    let sub_b = h.manager.create_subgroup(top.id, GroupParams::new("Frontend"), None).unwrap();

    match h.manager.set_parent(sub_a.id, sub_b.id) {
        Err(GroupError::Validation(errors)) => assert!(errors.has_error_on("base")),
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(h.manager.get_group(sub_a.id).unwrap().parent_id, Some(top.id));
}

/// parent_members visibility is only valid on a hidden subgroup
#[test]
fn test_parent_members_visibility_rules() {
    let mut h = Harness::new();
    let top = h.manager.create_group(GroupParams::new("Engineering"), None).unwrap();
    let sub = h.manager.create_subgroup(top.id, GroupParams::new("Backend"), None).unwrap();

    assert!(matches!(
        h.manager.set_visibility(top.id, "parent_members"),
        Err(GroupError::Validation(_))
    ));

    h.manager.set_visibility(sub.id, "parent_members").unwrap();
    assert_eq!(h.manager.visibility_term(sub.id).unwrap(), VisibilityTerm::ParentMembers);
    let stored = h.manager.get_group(sub.id).unwrap();
    assert!(!stored.is_visible_to_public);
    assert!(stored.is_visible_to_parent_members);
}

#[test]
fn test_default_privacy_values() {
    assert_eq!(default_privacy("public_only").unwrap(), Some(false));
    assert_eq!(default_privacy("private_only").unwrap(), Some(true));
    assert_eq!(default_privacy("public_or_private").unwrap(), None);
    assert!(matches!(default_privacy("secret"), Err(GroupError::InvalidState(_))));
    assert_eq!(DiscussionPrivacyOptions::default(), DiscussionPrivacyOptions::PublicOrPrivate);
}

/// Data written through one store is visible after reopening the file
#[test]
fn test_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("groups.db");

    let (group_id, alice) = {
        let mut manager =
            GroupManagerImpl::new(GroupSqlStore::open(&path, 2).unwrap(), GroupDefaults::default());
        let alice = manager.register_user("alice", "alice@example.org").unwrap().id;
        let group = manager.create_group(GroupParams::new("Engineering"), Some(alice)).unwrap();
        (group.id, alice)
    };

    let manager =
        GroupManagerImpl::new(GroupSqlStore::open(&path, 2).unwrap(), GroupDefaults::default());
    assert_eq!(manager.admin_email(group_id).unwrap(), "alice@example.org");
    assert!(manager.store().find_membership(group_id, alice).unwrap().is_some());
}
