//! The flat state: type buckets, type index, graphs and trash.

use crate::entity::Entity;
use crate::graph::{MembershipGraph, ReferenceGraph};
use crate::id::EntityId;
use crate::registry::EntityType;
use crate::trash::{TrashEntry, TrashRegistry};
use std::collections::HashMap;
use std::sync::Arc;

type Bucket = Arc<HashMap<EntityId, Arc<Entity>>>;

/// Result of an explicit type-index lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    /// The index knows the id and its bucket holds it.
    Indexed(EntityType),
    /// A bucket holds the id but the index disagrees or has lost it.
    Drifted(EntityType),
    /// No bucket holds the id.
    Missing,
}

impl Located {
    /// Returns the type the entity was found under.
    #[must_use]
    pub fn kind(self) -> Option<EntityType> {
        match self {
            Located::Indexed(kind) | Located::Drifted(kind) => Some(kind),
            Located::Missing => None,
        }
    }
}

/// One version of the vault's data.
///
/// Every map sits behind an `Arc` and entity payloads are `Arc<Entity>`, so
/// cloning a `FlatState` is O(1) and writes after a clone copy only the maps
/// they touch, and those copies move pointers rather than payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatState {
    pub(crate) buckets: [Bucket; 6],
    pub(crate) type_index: Arc<HashMap<EntityId, EntityType>>,
    pub(crate) references: ReferenceGraph,
    pub(crate) memberships: MembershipGraph,
    pub(crate) trash: TrashRegistry,
    pub(crate) root: Option<EntityId>,
}

impl FlatState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The root entity id, if any.
    pub fn root(&self) -> Option<&EntityId> {
        self.root.as_ref()
    }

    /// Number of active entities.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Whether there are no active entities.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// Whether `id` is indexed as active.
    pub fn contains(&self, id: &str) -> bool {
        self.type_index.contains_key(id)
    }

    /// The ownership graph.
    pub fn references(&self) -> &ReferenceGraph {
        &self.references
    }

    /// The membership graph.
    pub fn memberships(&self) -> &MembershipGraph {
        &self.memberships
    }

    /// The trash registry.
    pub fn trash(&self) -> &TrashRegistry {
        &self.trash
    }

    /// O(1) entity lookup.
    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        let kind = self.type_index.get(id)?;
        self.buckets[kind.index()].get(id).map(Arc::as_ref)
    }

    /// Shared handle to an entity payload.
    pub fn entity_handle(&self, id: &str) -> Option<&Arc<Entity>> {
        let kind = self.type_index.get(id)?;
        self.buckets[kind.index()].get(id)
    }

    /// O(1) type lookup.
    pub fn get_entity_type(&self, id: &str) -> Option<EntityType> {
        self.type_index.get(id).copied()
    }

    /// Owner of `id`.
    pub fn get_parent(&self, id: &str) -> Option<&EntityId> {
        self.references.parent(id)
    }

    /// Ordered owned children of `id`.
    pub fn get_children(&self, id: &str) -> &[EntityId] {
        self.references.children(id)
    }

    /// Owners of `id`, nearest first.
    pub fn get_ancestors(&self, id: &str) -> Vec<EntityId> {
        self.references.ancestors(id)
    }

    /// Owned descendants of `id`, breadth-first. Membership is not followed.
    pub fn get_descendants(&self, id: &str) -> Vec<EntityId> {
        self.references.descendants(id)
    }

    /// Groupings `id` belongs to.
    pub fn get_collections_containing(&self, id: &str) -> &[EntityId] {
        self.memberships.containers(id)
    }

    /// Members of grouping `id`.
    pub fn get_collection_members(&self, id: &str) -> &[EntityId] {
        self.memberships.members(id)
    }

    /// Whether a record or grouping belongs to no grouping.
    ///
    /// Other types, and unknown ids, are never orphans.
    pub fn is_orphan(&self, id: &str) -> bool {
        self.get_entity_type(id)
            .is_some_and(|kind| kind.is_collectable() && self.memberships.containers(id).is_empty())
    }

    /// All active entities of one type, in no particular order.
    pub fn entities_of_type(&self, kind: EntityType) -> impl Iterator<Item = &Entity> {
        self.buckets[kind.index()].values().map(Arc::as_ref)
    }

    /// Every type index entry, in no particular order.
    pub fn indexed_ids(&self) -> impl Iterator<Item = (&EntityId, EntityType)> {
        self.type_index.iter().map(|(id, kind)| (id, *kind))
    }

    /// Number of active entities of one type.
    pub fn count_of_type(&self, kind: EntityType) -> usize {
        self.buckets[kind.index()].len()
    }

    /// Trashed ids, oldest first.
    pub fn trashed_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.trash.ids()
    }

    /// The trash entry keyed by `id`.
    pub fn trash_entry(&self, id: &str) -> Option<&TrashEntry> {
        self.trash.get(id).map(Arc::as_ref)
    }

    /// Whether `id` has a trash entry.
    pub fn is_trashed(&self, id: &str) -> bool {
        self.trash.contains(id)
    }

    /// Explicit index lookup that also detects drift.
    ///
    /// The fast path is a single index lookup. When the index and buckets
    /// disagree, all buckets are scanned; this is a rare recovery path.
    pub fn locate(&self, id: &str) -> Located {
        if let Some(kind) = self.type_index.get(id) {
            if self.buckets[kind.index()].contains_key(id) {
                return Located::Indexed(*kind);
            }
        }
        EntityType::ALL
            .into_iter()
            .find(|kind| self.buckets[kind.index()].contains_key(id))
            .map_or(Located::Missing, Located::Drifted)
    }

    /// Returns the stored `EntityId` for `id`, sharing its allocation.
    pub(crate) fn canonical_id(&self, id: &str) -> Option<EntityId> {
        self.type_index.get_key_value(id).map(|(k, _)| k.clone())
    }

    /// Whether `id` is taken by an active or trashed entity.
    pub(crate) fn is_id_taken(&self, id: &str) -> bool {
        self.contains(id) || self.trash.holds(id)
    }

    /// Rewrites the index entry for `id`.
    pub(crate) fn repair_index(&mut self, id: EntityId, kind: EntityType) {
        Arc::make_mut(&mut self.type_index).insert(id, kind);
    }

    /// Inserts a payload into its bucket and the index.
    pub(crate) fn insert_entity(&mut self, entity: Arc<Entity>) {
        let id = entity.id.clone();
        let kind = entity.kind;
        Arc::make_mut(&mut self.buckets[kind.index()]).insert(id.clone(), entity);
        Arc::make_mut(&mut self.type_index).insert(id, kind);
    }

    /// Removes a payload from its bucket and the index.
    pub(crate) fn take_entity(&mut self, id: &str) -> Option<Arc<Entity>> {
        let kind = Arc::make_mut(&mut self.type_index).remove(id)?;
        Arc::make_mut(&mut self.buckets[kind.index()]).remove(id)
    }

    /// Mutable access to an entity payload, copying it if shared.
    pub(crate) fn entity_mut(&mut self, kind: EntityType, id: &str) -> Option<&mut Entity> {
        Arc::make_mut(&mut self.buckets[kind.index()])
            .get_mut(id)
            .map(Arc::make_mut)
    }

    /// Removes `ids` from buckets, index, both graphs and the root slot.
    ///
    /// Trash entries are left alone.
    pub(crate) fn deactivate(&mut self, ids: &[EntityId]) {
        for id in ids {
            self.take_entity(id);
            self.references.detach(id);
            self.references.forget_children(id);
            self.memberships.detach_node(id);
            if self.root.as_deref() == Some(id.as_str()) {
                self.root = None;
            }
        }
    }

    /// Moves every entity and edge of `other` into this state.
    ///
    /// The caller guarantees the two id sets are disjoint.
    pub(crate) fn absorb(&mut self, other: FlatState) {
        for (bucket, incoming) in self.buckets.iter_mut().zip(other.buckets) {
            Arc::make_mut(bucket).extend(Arc::unwrap_or_clone(incoming));
        }
        Arc::make_mut(&mut self.type_index).extend(Arc::unwrap_or_clone(other.type_index));
        self.references.absorb(other.references);
        self.memberships.absorb(other.memberships);
    }

    #[cfg(test)]
    pub(crate) fn forget_index_entry(&mut self, id: &str) {
        Arc::make_mut(&mut self.type_index).remove(id);
    }
}
