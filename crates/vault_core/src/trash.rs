//! Soft-delete archive.
//!
//! A trash entry is a point-in-time capture of one trashed entity and its
//! whole owned subtree, including every ownership position and membership
//! needed to put it back exactly where it was.
//!
//! # Invariants
//!
//! - Every id captured by an entry (the entry's own id and all of its
//!   descendants) is absent from the active state.
//! - An id is captured by at most one entry.

use crate::entity::Entity;
use crate::graph::{MemberPosition, MembershipPosition, ParentLink};
use crate::id::EntityId;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A descendant captured together with a trashed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrashedNode {
    /// The descendant's data.
    pub entity: Arc<Entity>,
    /// Its owner within the captured subtree.
    pub link: ParentLink,
    /// Groupings it belonged to.
    pub memberships: Vec<MembershipPosition>,
    /// Its own members in order, when it is a grouping.
    pub members: Vec<MemberPosition>,
}

/// Capture of one trashed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrashEntry {
    /// The trashed entity's data.
    pub entity: Arc<Entity>,
    /// Former owner and slot, `None` for the root or a standalone entity.
    pub original_parent: Option<ParentLink>,
    /// Former position in the owner's child list.
    pub original_index: Option<usize>,
    /// Former direct children, in order.
    pub child_ids: Vec<EntityId>,
    /// Groupings the entity belonged to, with its position in each.
    pub memberships: Vec<MembershipPosition>,
    /// The entity's own members in order, when it is a grouping.
    pub members: Vec<MemberPosition>,
    /// Whether the entity was the vault root.
    pub was_root: bool,
    /// Owned descendants, breadth-first.
    pub descendants: Vec<TrashedNode>,
}

impl TrashEntry {
    /// The trashed entity's id.
    pub fn id(&self) -> &EntityId {
        &self.entity.id
    }

    /// The former owner's id.
    pub fn original_parent_id(&self) -> Option<&EntityId> {
        self.original_parent.as_ref().map(|link| &link.parent)
    }

    /// Every id held by this entry, the entry's own id first.
    pub fn captured_ids(&self) -> impl Iterator<Item = &EntityId> {
        std::iter::once(self.id()).chain(self.descendants.iter().map(|node| &node.entity.id))
    }

    /// Number of entities held by this entry.
    pub fn len(&self) -> usize {
        1 + self.descendants.len()
    }

    /// Always false; an entry holds at least its own entity.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Drops a captured descendant and everything beneath it.
    fn prune(&mut self, id: &str) -> Vec<EntityId> {
        let mut dropped: HashSet<EntityId> = HashSet::new();
        let mut order = Vec::new();
        for node in &self.descendants {
            if node.entity.id == *id || dropped.contains(node.link.parent.as_str()) {
                dropped.insert(node.entity.id.clone());
                order.push(node.entity.id.clone());
            }
        }
        self.descendants
            .retain(|node| !dropped.contains(node.entity.id.as_str()));
        self.child_ids.retain(|child| !dropped.contains(child));
        for node in &mut self.descendants {
            node.members.retain(|member| !dropped.contains(&member.resource));
        }
        self.members.retain(|member| !dropped.contains(&member.resource));
        order
    }
}

/// Registry of trash entries keyed by trashed id, in trashing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrashRegistry {
    entries: Arc<IndexMap<EntityId, Arc<TrashEntry>>>,
    captured: Arc<HashMap<EntityId, EntityId>>,
}

impl TrashRegistry {
    /// Returns the entry keyed by `id`.
    pub fn get(&self, id: &str) -> Option<&Arc<TrashEntry>> {
        self.entries.get(id)
    }

    /// Whether an entry is keyed by `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` is held by any entry, as its key or as a descendant.
    pub fn holds(&self, id: &str) -> bool {
        self.captured.contains_key(id)
    }

    /// Returns the key of the entry holding `id`.
    pub fn entry_for(&self, id: &str) -> Option<&EntityId> {
        self.captured.get(id)
    }

    /// Trashed ids, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.keys()
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrashEntry>> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trash is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files an entry under its entity's id.
    pub(crate) fn insert(&mut self, entry: impl Into<Arc<TrashEntry>>) {
        let entry = entry.into();
        let key = entry.id().clone();
        let captured = Arc::make_mut(&mut self.captured);
        for id in entry.captured_ids() {
            captured.insert(id.clone(), key.clone());
        }
        Arc::make_mut(&mut self.entries).insert(key, entry);
    }

    /// Removes the entry keyed by `id`.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<TrashEntry>> {
        let entry = Arc::make_mut(&mut self.entries).shift_remove(id)?;
        let captured = Arc::make_mut(&mut self.captured);
        for captured_id in entry.captured_ids() {
            captured.remove(captured_id.as_str());
        }
        Some(entry)
    }

    /// Erases a captured descendant (and its subtree) from its entry.
    ///
    /// Returns the erased ids; empty if `id` is not a captured descendant.
    pub(crate) fn prune(&mut self, id: &str) -> Vec<EntityId> {
        let Some(key) = self.captured.get(id).cloned() else {
            return Vec::new();
        };
        if key == *id {
            return Vec::new();
        }
        let entries = Arc::make_mut(&mut self.entries);
        let Some(entry) = entries.get_mut(key.as_str()) else {
            return Vec::new();
        };
        let dropped = Arc::make_mut(entry).prune(id);
        let captured = Arc::make_mut(&mut self.captured);
        for dropped_id in &dropped {
            captured.remove(dropped_id.as_str());
        }
        dropped
    }
}
