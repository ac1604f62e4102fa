//! Ownership graph.

use crate::id::EntityId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Where an owned entity sits: its owner and the owner's property holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    /// The owning entity.
    pub parent: EntityId,
    /// The child property of the owner (e.g. `items`, `structures`).
    pub slot: &'static str,
}

/// Parent→children and child→parent maps for structural containment.
///
/// Both maps sit behind `Arc` and are written copy-on-write, so cloning the
/// graph is O(1) and a snapshot keeps its version intact.
///
/// # Invariants
///
/// - A child appears in exactly one parent's list iff it has a `ParentLink`
///   naming that parent.
/// - Child lists are never stored empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceGraph {
    children: Arc<HashMap<EntityId, Vec<EntityId>>>,
    parents: Arc<HashMap<EntityId, ParentLink>>,
}

impl ReferenceGraph {
    /// Returns the owner of `id`.
    pub fn parent(&self, id: &str) -> Option<&EntityId> {
        self.parents.get(id).map(|link| &link.parent)
    }

    /// Returns the owner link of `id`.
    pub fn link(&self, id: &str) -> Option<&ParentLink> {
        self.parents.get(id)
    }

    /// Returns the ordered direct children of `id`.
    pub fn children(&self, id: &str) -> &[EntityId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Returns the ordered direct children of `id` held under `slot`.
    pub fn children_in_slot<'a>(
        &'a self,
        id: &'a str,
        slot: &'a str,
    ) -> impl Iterator<Item = &'a EntityId> + 'a {
        self.children(id).iter().filter(move |child| {
            self.parents
                .get(child.as_str())
                .is_some_and(|link| link.slot == slot && link.parent == *id)
        })
    }

    /// Returns the position of `id` in its owner's child list.
    pub fn position(&self, id: &str) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    /// Attaches `child` under `parent` at `index` (clamped) or at the end.
    ///
    /// Returns the position the child landed at. The caller must have
    /// detached the child from any previous owner.
    pub fn attach(
        &mut self,
        parent: EntityId,
        child: EntityId,
        slot: &'static str,
        index: Option<usize>,
    ) -> usize {
        let list = Arc::make_mut(&mut self.children)
            .entry(parent.clone())
            .or_default();
        let position = index.map_or(list.len(), |i| i.min(list.len()));
        list.insert(position, child.clone());
        Arc::make_mut(&mut self.parents).insert(child, ParentLink { parent, slot });
        position
    }

    /// Detaches `child` from its owner. Returns the old link and position.
    pub fn detach(&mut self, child: &str) -> Option<(ParentLink, usize)> {
        let link = Arc::make_mut(&mut self.parents).remove(child)?;
        let children = Arc::make_mut(&mut self.children);
        let mut position = 0;
        if let Some(list) = children.get_mut(link.parent.as_str()) {
            if let Some(found) = list.iter().position(|c| c == child) {
                list.remove(found);
                position = found;
            }
            if list.is_empty() {
                children.remove(link.parent.as_str());
            }
        }
        Some((link, position))
    }

    /// Drops the child list of `id` without touching the children's links.
    pub fn forget_children(&mut self, id: &str) -> Vec<EntityId> {
        if !self.children.contains_key(id) {
            return Vec::new();
        }
        Arc::make_mut(&mut self.children)
            .remove(id)
            .unwrap_or_default()
    }

    /// Replaces the child list of `parent` outright.
    pub fn set_children(&mut self, parent: EntityId, order: Vec<EntityId>) {
        let children = Arc::make_mut(&mut self.children);
        if order.is_empty() {
            children.remove(parent.as_str());
        } else {
            children.insert(parent, order);
        }
    }

    /// Walks owner links from `id` to the root, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<EntityId> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            if !seen.insert(parent.clone()) {
                break;
            }
            ancestors.push(parent.clone());
            cursor = self.parent(parent);
        }
        ancestors
    }

    /// Breadth-first walk over owned descendants of `id` (excluding `id`).
    pub fn descendants(&self, id: &str) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if seen.insert(child.as_str()) {
                    out.push(child.clone());
                    queue.push_back(child.as_str());
                }
            }
        }
        out
    }

    /// Whether `ancestor` is `id` itself or one of its owners.
    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        id == ancestor || self.ancestors(id).iter().any(|a| a == ancestor)
    }

    /// Number of ownership edges.
    pub fn edge_count(&self) -> usize {
        self.parents.len()
    }

    /// Iterates over every `(child, link)` pair.
    pub fn links(&self) -> impl Iterator<Item = (&EntityId, &ParentLink)> {
        self.parents.iter()
    }

    /// Iterates over every `(parent, children)` pair.
    pub fn child_lists(&self) -> impl Iterator<Item = (&EntityId, &[EntityId])> {
        self.children.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Moves every edge of `other` into this graph.
    pub(crate) fn absorb(&mut self, other: ReferenceGraph) {
        let children = Arc::unwrap_or_clone(other.children);
        let parents = Arc::unwrap_or_clone(other.parents);
        Arc::make_mut(&mut self.children).extend(children);
        Arc::make_mut(&mut self.parents).extend(parents);
    }
}
