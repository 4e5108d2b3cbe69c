//! Two-level group tree: parent assignment, full names, archive cascade

use super::errors::{GroupError, GroupResult, ValidationErrors};
use super::group::Group;
use super::store::GroupStore;
use super::types::{GroupId, Timestamp};
use crate::config::GroupDefaults;
use tracing::{debug, info};

/// `"Parent - Child"` for subgroups, the plain name otherwise
pub fn calculate_full_name(name: &str, parent_name: Option<&str>) -> String {
    match parent_name {
        Some(parent_name) => format!("{} - {}", parent_name, name),
        None => name.to_string(),
    }
}

/// Tree operations over a [`GroupStore`]
pub struct GroupHierarchy<'a, S: GroupStore + ?Sized> {
    store: &'a S,
    limits: &'a GroupDefaults,
}

impl<'a, S: GroupStore + ?Sized> GroupHierarchy<'a, S> {
    pub fn new(store: &'a S, limits: &'a GroupDefaults) -> Self {
        Self { store, limits }
    }

    /// Load the parent of `group`, if any
    pub fn parent_of(&self, group: &Group) -> GroupResult<Option<Group>> {
        match group.parent_id {
            Some(parent_id) => match self.store.get_group(parent_id) {
                Ok(parent) => Ok(Some(parent)),
                Err(GroupError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// Cached full name, computed from the parent when the cache is empty
    pub fn full_name(&self, group: &Group) -> GroupResult<String> {
        if !group.full_name.is_empty() {
            return Ok(group.full_name.clone());
        }
        let parent = self.parent_of(group)?;
        Ok(calculate_full_name(&group.name, parent.as_ref().map(|p| p.name.as_str())))
    }

    /// Make `parent_id` the parent of `group` and persist it.
    ///
    /// The tree stays two levels deep: a subgroup can't be a parent and a
    /// group that has subgroups can't become one.
    pub fn set_parent(&self, group: &mut Group, parent_id: GroupId) -> GroupResult<()> {
        let parent = self.store.get_group(parent_id)?;

        let mut errors = ValidationErrors::new();
        if parent.id == group.id {
            errors.add("parent", "can't be the group itself");
        }
        if parent.is_subgroup() {
            errors.add("base", "Can't set a subgroup as parent");
        }
        if !self.store.subgroups(group.id, true)?.is_empty() {
            errors.add("base", "A group with subgroups can't become a subgroup");
        }
        errors.into_result()?;

        group.parent_id = Some(parent.id);
        group.full_name = calculate_full_name(&group.name, Some(&parent.name));
        group.validate(Some(&parent), self.limits)?;
        self.store.update_group(group)?;

        info!(group_id = %group.id, parent_id = %parent.id, "group moved under parent");
        Ok(())
    }

    /// Rename `group`, persist it and refresh the full name of every direct
    /// subgroup. Subgroup rows are written without validation.
    pub fn rename_cascade(&self, group: &mut Group, new_name: &str) -> GroupResult<()> {
        let parent = self.parent_of(group)?;
        group.name = new_name.to_string();
        group.full_name = calculate_full_name(&group.name, parent.as_ref().map(|p| p.name.as_str()));
        group.validate(parent.as_ref(), self.limits)?;
        self.store.update_group(group)?;

        for child in self.store.subgroups(group.id, true)? {
            let child_full_name = calculate_full_name(&child.name, Some(&group.name));
            self.store.update_full_name(child.id, &child_full_name)?;
            debug!(group_id = %child.id, full_name = %child_full_name, "subgroup full name refreshed");
        }

        info!(group_id = %group.id, name = %group.name, "group renamed");
        Ok(())
    }

    /// Archive discussions, the group and its memberships, then recurse into
    /// non-archived subgroups. Each step is its own write.
    pub fn archive(&self, group: &Group) -> GroupResult<()> {
        let now = Timestamp::now();

        let discussions = self.store.discussions(group.id)?;
        for discussion in &discussions {
            self.store.archive_discussion(discussion.id, now)?;
        }
        self.store.set_archived_at(group.id, now)?;
        let memberships = self.store.archive_memberships(group.id, now)?;

        info!(
            group_id = %group.id,
            discussions = discussions.len(),
            memberships,
            "group archived"
        );

        for subgroup in self.store.subgroups(group.id, false)? {
            self.archive(&subgroup)?;
        }
        Ok(())
    }
}
