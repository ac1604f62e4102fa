//! Mutations on the flat state.
//!
//! Every operation checks all of its preconditions before the first write,
//! so an `Err` return means the state was not touched.

use crate::config::{OrphanRestorePolicy, VaultConfig};
use crate::entity::Entity;
use crate::error::{VaultError, VaultResult};
use crate::graph::{MemberPosition, MembershipEdge, MembershipPosition, ParentLink};
use crate::id::EntityId;
use crate::normalize::normalize_with_report;
use crate::registry::{ChildSlot, EntityType, Relation, TypeRegistry};
use crate::state::{FlatState, Located};
use crate::trash::{TrashEntry, TrashedNode};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vault_value::{Map, Value};

/// Options for [`FlatState::remove_entity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Erase the entity instead of moving it to the trash.
    pub permanent: bool,
}

impl RemoveOptions {
    /// Options for a permanent purge.
    #[must_use]
    pub const fn permanent() -> Self {
        Self { permanent: true }
    }
}

/// Options for [`FlatState::restore_entity_from_trash`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Parent to restore under instead of the captured one.
    pub parent_id: Option<EntityId>,
    /// Position in the parent's child list.
    pub index: Option<usize>,
}

/// Where a restored entity ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Reinstated under `parent`, or standalone when it never had one.
    Restored {
        /// The owner it was attached to.
        parent: Option<EntityId>,
    },
    /// Reinstated unlinked because its captured owner is gone.
    Detached {
        /// The owner that no longer exists.
        missing_parent: EntityId,
    },
}

/// Result of a successful patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Whether a drifted type index entry was repaired first.
    pub healed: bool,
    /// Patch keys that cannot be patched (`id`, `type`, child properties).
    pub ignored: Vec<String>,
}

/// Result of emptying the trash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyTrashReport {
    /// Trash entries that were purged, oldest first.
    pub purged: Vec<EntityId>,
    /// Entries that could not be purged.
    pub failures: Vec<(EntityId, VaultError)>,
}

impl EmptyTrashReport {
    /// Number of purged entries.
    pub fn count(&self) -> usize {
        self.purged.len()
    }
}

impl FlatState {
    /// Merges `patch` into an entity's bags.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when no bucket holds the id, `IndexDrift` when one
    /// does but the index lost it and healing is disabled.
    pub fn update_entity(
        &mut self,
        id: &str,
        patch: &Map,
        config: &VaultConfig,
    ) -> VaultResult<PatchReport> {
        let mut report = PatchReport::default();
        let kind = match self.locate(id) {
            Located::Indexed(kind) => kind,
            Located::Drifted(kind) if config.heal_index_drift => {
                let canonical = self.buckets[kind.index()]
                    .get_key_value(id)
                    .map_or_else(|| EntityId::from(id), |(key, _)| key.clone());
                info!(id = %canonical, kind = %kind, "repairing drifted type index");
                self.repair_index(canonical, kind);
                report.healed = true;
                kind
            }
            Located::Drifted(kind) => {
                return Err(VaultError::IndexDrift {
                    id: EntityId::from(id),
                    kind,
                })
            }
            Located::Missing => return Err(VaultError::not_found(id)),
        };

        let entity = self
            .entity_mut(kind, id)
            .ok_or_else(|| VaultError::not_found(id))?;
        report.ignored = entity.merge(patch);
        if !report.ignored.is_empty() {
            debug!(id = %id, keys = ?report.ignored, "ignored patch keys");
        }
        Ok(report)
    }

    /// Inserts a single entity, under `parent` or standalone.
    ///
    /// Under a parent the entity goes into the first slot accepting its type;
    /// a grouping parent also gains it as a member. Without a parent it
    /// becomes the root when none is set.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, `ParentNotFound` or `InvalidChild`.
    pub fn add_entity(&mut self, entity: Entity, parent: Option<&str>) -> VaultResult<EntityId> {
        if self.is_id_taken(&entity.id) {
            return Err(VaultError::already_exists(entity.id));
        }
        let target = match parent {
            Some(parent) => Some(self.resolve_parent(parent, entity.kind)?),
            None => None,
        };

        let id = entity.id.clone();
        self.insert_entity(Arc::new(entity));
        self.graft(&id, target);
        Ok(id)
    }

    /// Normalizes `tree` and grafts it under `parent`, or standalone.
    ///
    /// Nodes the normalizer skips are left out, as on load.
    ///
    /// # Errors
    ///
    /// `InvalidTree` when the top node is unusable, `AlreadyExists` when any
    /// id in the tree is taken, or the parent errors of `add_entity`.
    pub fn add_tree(&mut self, tree: &Value, parent: Option<&str>) -> VaultResult<EntityId> {
        let (subtree, report) = normalize_with_report(tree);
        let Some(id) = subtree.root.clone() else {
            let reason = report
                .skipped
                .first()
                .map_or_else(|| "empty tree".to_string(), ToString::to_string);
            return Err(VaultError::invalid_tree(reason));
        };
        if let Some(taken) = subtree.type_index.keys().find(|id| self.is_id_taken(id)) {
            return Err(VaultError::already_exists(taken.clone()));
        }
        let kind = subtree.type_index.get(&id).copied().unwrap_or(EntityType::Record);
        let target = match parent {
            Some(parent) => Some(self.resolve_parent(parent, kind)?),
            None => None,
        };

        self.absorb(subtree);
        self.graft(&id, target);
        Ok(id)
    }

    /// Removes an entity and its owned subtree.
    ///
    /// Without `permanent` this moves the subtree to the trash. With it, an
    /// active entity is purged together with its descendants; a trashed id
    /// has its trash entry (or its part of one) erased.
    ///
    /// Returns the ids that were removed.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the id is neither active nor trashed.
    pub fn remove_entity(&mut self, id: &str, options: RemoveOptions) -> VaultResult<Vec<EntityId>> {
        if !options.permanent {
            return self.move_entity_to_trash(id);
        }
        if self.contains(id) {
            let mut ids = vec![self.canonical_id(id).unwrap_or_else(|| EntityId::from(id))];
            ids.extend(self.get_descendants(id));
            self.deactivate(&ids);
            return Ok(ids);
        }
        if let Some(entry) = self.trash.remove(id) {
            return Ok(entry.captured_ids().cloned().collect());
        }
        if self.trash.holds(id) {
            return Ok(self.trash.prune(id));
        }
        Err(VaultError::not_found(id))
    }

    /// Moves an entity and its owned subtree to the trash.
    ///
    /// Returns every id captured by the new entry, the entity's own first.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the id is not active.
    pub fn move_entity_to_trash(&mut self, id: &str) -> VaultResult<Vec<EntityId>> {
        let entity = self
            .entity_handle(id)
            .cloned()
            .ok_or_else(|| VaultError::not_found(id))?;
        let id = entity.id.clone();

        let descendants: Vec<TrashedNode> = self
            .get_descendants(&id)
            .into_iter()
            .filter_map(|child| {
                Some(TrashedNode {
                    entity: self.entity_handle(&child)?.clone(),
                    link: self.references.link(&child)?.clone(),
                    memberships: self.membership_positions(&child),
                    members: self.member_positions(&child),
                })
            })
            .collect();
        let entry = TrashEntry {
            original_parent: self.references.link(&id).cloned(),
            original_index: self.references.position(&id),
            child_ids: self.get_children(&id).to_vec(),
            memberships: self.membership_positions(&id),
            members: self.member_positions(&id),
            was_root: self.root.as_ref() == Some(&id),
            descendants,
            entity,
        };

        let captured: Vec<EntityId> = entry.captured_ids().cloned().collect();
        self.deactivate(&captured);
        self.trash.insert(entry);
        Ok(captured)
    }

    /// Puts a trashed subtree back.
    ///
    /// The entity goes under `options.parent_id`, or else its captured owner,
    /// at `options.index`, or else its captured position when the owner is
    /// unchanged, or else at the end. Captured memberships come back at their
    /// captured positions in groupings that still exist.
    ///
    /// # Errors
    ///
    /// `NotTrashed` when there is no entry, `ParentNotFound` when an explicit
    /// parent is missing or the captured one is gone under
    /// [`OrphanRestorePolicy::Reject`], `InvalidChild` when the parent cannot
    /// hold the entity, and `AlreadyExists` when a captured id was reused.
    pub fn restore_entity_from_trash(
        &mut self,
        id: &str,
        options: RestoreOptions,
        config: &VaultConfig,
    ) -> VaultResult<RestoreOutcome> {
        let entry = self
            .trash
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::not_trashed(id))?;
        if let Some(taken) = entry.captured_ids().find(|id| self.contains(id)) {
            return Err(VaultError::already_exists(taken.clone()));
        }

        let kind = entry.entity.kind;
        let mut outcome = RestoreOutcome::Restored { parent: None };
        let mut target = None;
        let mut index = options.index;
        match (&options.parent_id, &entry.original_parent) {
            (Some(parent), original) => {
                let unchanged = original.as_ref().is_some_and(|link| link.parent == *parent);
                let keep = if unchanged { original.as_ref() } else { None };
                target = Some(self.resolve_parent_keeping(parent, kind, keep)?);
                if unchanged && index.is_none() {
                    index = entry.original_index;
                }
            }
            (None, Some(original)) if self.contains(&original.parent) => {
                target = Some(self.resolve_parent_keeping(&original.parent, kind, Some(original))?);
                index = index.or(entry.original_index);
            }
            (None, Some(original)) => match config.orphan_restore {
                OrphanRestorePolicy::Reject => {
                    return Err(VaultError::parent_not_found(original.parent.clone()))
                }
                OrphanRestorePolicy::Detach => {
                    warn!(id = %entry.id(), parent = %original.parent, "restoring without its parent");
                    outcome = RestoreOutcome::Detached {
                        missing_parent: original.parent.clone(),
                    };
                }
            },
            (None, None) => {}
        }

        self.trash.remove(id);
        self.insert_entity(Arc::clone(&entry.entity));
        for node in &entry.descendants {
            self.insert_entity(Arc::clone(&node.entity));
            self.references
                .attach(node.link.parent.clone(), node.entity.id.clone(), node.link.slot, None);
        }

        let restored = entry.id().clone();
        if let Some((parent, slot)) = &target {
            self.references
                .attach(parent.clone(), restored.clone(), slot.property, index);
            outcome = RestoreOutcome::Restored {
                parent: Some(parent.clone()),
            };
        }
        self.restore_memberships(&entry);
        if let Some((parent, slot)) = &target {
            if slot.relation == Relation::Membership {
                self.memberships.add(parent.clone(), restored.clone(), None);
            }
        }
        if entry.was_root && self.root.is_none() {
            self.root = Some(restored);
        }
        Ok(outcome)
    }

    /// Purges every trash entry, collecting failures instead of stopping.
    pub fn empty_trash(&mut self) -> EmptyTrashReport {
        let mut report = EmptyTrashReport::default();
        let ids: Vec<EntityId> = self.trash.ids().cloned().collect();
        for id in ids {
            match self.remove_entity(&id, RemoveOptions::permanent()) {
                Ok(_) => report.purged.push(id),
                Err(err) => report.failures.push((id, err)),
            }
        }
        report
    }

    /// Re-parents an entity, at `index` (clamped) or at the end.
    ///
    /// The entity keeps its slot when the new parent has one of the same
    /// name accepting it. Under a grouping, `index` addresses the member
    /// list and the old grouping's membership is dropped.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, `ParentNotFound`, `InvalidChild`, or `CycleDetected`
    /// when the entity would become its own parent (or, with
    /// `reject_move_cycles`, its own ancestor).
    pub fn move_entity(
        &mut self,
        id: &str,
        new_parent: &str,
        index: Option<usize>,
        config: &VaultConfig,
    ) -> VaultResult<()> {
        let kind = self
            .get_entity_type(id)
            .ok_or_else(|| VaultError::not_found(id))?;
        let cycle = id == new_parent
            || (config.reject_move_cycles && self.references.is_ancestor_or_self(id, new_parent));
        if cycle && self.contains(new_parent) {
            return Err(VaultError::CycleDetected {
                id: EntityId::from(id),
                parent: EntityId::from(new_parent),
            });
        }
        let old = self.references.link(id).cloned();
        let (parent, slot) = self.resolve_parent_keeping(new_parent, kind, old.as_ref())?;
        let id = self.canonical_id(id).unwrap_or_else(|| EntityId::from(id));

        if let Some(old) = self.references.detach(&id).map(|(link, _)| link) {
            if self.get_entity_type(&old.parent) == Some(EntityType::Grouping) {
                self.memberships.remove(&old.parent, &id);
            }
        }
        match slot.relation {
            Relation::Ownership => {
                self.references.attach(parent, id, slot.property, index);
            }
            Relation::Membership => {
                self.memberships.remove(&parent, &id);
                self.memberships.add(parent.clone(), id.clone(), index);
                self.references.attach(parent, id, slot.property, None);
            }
        }
        Ok(())
    }

    /// Replaces an entity's owned child list.
    ///
    /// `order` should be a permutation of the current children. Anything
    /// else is logged; ids that are not children are dropped and children
    /// missing from `order` keep their relative order at the end.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the parent is not active.
    pub fn reorder_children(&mut self, parent: &str, order: &[EntityId]) -> VaultResult<()> {
        let parent = self
            .canonical_id(parent)
            .ok_or_else(|| VaultError::not_found(parent))?;
        let current = self.get_children(&parent).to_vec();
        let (next, exact) = permute(&current, order);
        if !exact {
            warn!(id = %parent, "reorder is not a permutation of the current children");
        }
        self.references.set_children(parent, next);
        Ok(())
    }

    /// Replaces a grouping's member list, with the rules of `reorder_children`.
    ///
    /// # Errors
    ///
    /// `EntityNotFound`, or `NotACollection` when the id is not a grouping.
    pub fn reorder_collection(&mut self, collection: &str, order: &[EntityId]) -> VaultResult<()> {
        let collection = self.collection_id(collection)?;
        if !self.memberships.reorder(collection.clone(), order) {
            warn!(id = %collection, "reorder is not a permutation of the current members");
        }
        Ok(())
    }

    /// Adds `resource` to `collection`. Returns `false` if it was already a member.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` for either id, `NotACollection`, or `InvalidChild`
    /// when the resource is neither a record nor a grouping.
    pub fn add_to_collection(&mut self, collection: &str, resource: &str) -> VaultResult<bool> {
        let (collection, resource) = self.membership_pair(collection, resource)?;
        Ok(self.memberships.add(collection, resource, None))
    }

    /// Removes `resource` from `collection`. Returns `false` if it was not a member.
    ///
    /// A resource owned by the grouping is released and becomes standalone.
    ///
    /// # Errors
    ///
    /// As for [`FlatState::add_to_collection`].
    pub fn remove_from_collection(&mut self, collection: &str, resource: &str) -> VaultResult<bool> {
        let (collection, resource) = self.membership_pair(collection, resource)?;
        let removed = self.memberships.remove(&collection, &resource).is_some();
        if self.references.parent(&resource) == Some(&collection) {
            self.references.detach(&resource);
        }
        Ok(removed)
    }

    fn collection_id(&self, collection: &str) -> VaultResult<EntityId> {
        let kind = self
            .get_entity_type(collection)
            .ok_or_else(|| VaultError::not_found(collection))?;
        if kind != EntityType::Grouping {
            return Err(VaultError::NotACollection {
                id: EntityId::from(collection),
                kind,
            });
        }
        self.canonical_id(collection)
            .ok_or_else(|| VaultError::not_found(collection))
    }

    fn membership_pair(&self, collection: &str, resource: &str) -> VaultResult<(EntityId, EntityId)> {
        let resource_kind = self
            .get_entity_type(resource)
            .ok_or_else(|| VaultError::not_found(resource))?;
        let collection = self.collection_id(collection)?;
        if !resource_kind.is_collectable() {
            return Err(VaultError::InvalidChild {
                parent: collection,
                parent_type: EntityType::Grouping,
                child_type: resource_kind,
            });
        }
        let resource = self
            .canonical_id(resource)
            .ok_or_else(|| VaultError::not_found(resource))?;
        Ok((collection, resource))
    }

    /// Checks that `parent` is active and can hold a `kind` child.
    fn resolve_parent(
        &self,
        parent: &str,
        kind: EntityType,
    ) -> VaultResult<(EntityId, &'static ChildSlot)> {
        self.resolve_parent_keeping(parent, kind, None)
    }

    /// Like `resolve_parent`, preferring the slot named by `keep`.
    fn resolve_parent_keeping(
        &self,
        parent: &str,
        kind: EntityType,
        keep: Option<&ParentLink>,
    ) -> VaultResult<(EntityId, &'static ChildSlot)> {
        let parent_type = self
            .get_entity_type(parent)
            .ok_or_else(|| VaultError::parent_not_found(parent))?;
        let parent_id = self
            .canonical_id(parent)
            .ok_or_else(|| VaultError::parent_not_found(parent))?;
        let kept = keep
            .and_then(|link| TypeRegistry::child_slot(parent_type, link.slot))
            .filter(|slot| slot.accepts(kind));
        let slot = kept
            .or_else(|| TypeRegistry::default_slot(parent_type, kind))
            .ok_or(VaultError::InvalidChild {
                parent: parent_id.clone(),
                parent_type,
                child_type: kind,
            })?;
        Ok((parent_id, slot))
    }

    /// Links a freshly inserted entity under its resolved parent, or makes
    /// it the root when it has none and no root is set.
    fn graft(&mut self, id: &EntityId, target: Option<(EntityId, &'static ChildSlot)>) {
        match target {
            Some((parent, slot)) => {
                if slot.relation == Relation::Membership {
                    self.memberships.add(parent.clone(), id.clone(), None);
                }
                self.references.attach(parent, id.clone(), slot.property, None);
            }
            None => {
                if self.root.is_none() {
                    self.root = Some(id.clone());
                }
            }
        }
    }

    fn membership_positions(&self, id: &str) -> Vec<MembershipPosition> {
        self.get_collections_containing(id)
            .iter()
            .enumerate()
            .filter_map(|(rank, collection)| {
                Some(MembershipPosition {
                    collection: collection.clone(),
                    index: self.memberships.position(collection, id)?,
                    rank,
                })
            })
            .collect()
    }

    fn member_positions(&self, id: &str) -> Vec<MemberPosition> {
        self.get_collection_members(id)
            .iter()
            .filter_map(|member| {
                Some(MemberPosition {
                    resource: member.clone(),
                    rank: self.memberships.rank(id, member)?,
                })
            })
            .collect()
    }

    /// Re-adds the memberships captured by `entry`.
    ///
    /// Every edge goes back at its captured position in both the grouping's
    /// member list and the member's grouping list. Edges to ids that are no
    /// longer active are dropped.
    fn restore_memberships(&mut self, entry: &TrashEntry) {
        let nodes = std::iter::once((entry.id(), &entry.memberships, &entry.members)).chain(
            entry
                .descendants
                .iter()
                .map(|node| (&node.entity.id, &node.memberships, &node.members)),
        );
        let restored: HashSet<&EntityId> = entry.captured_ids().collect();
        let mut edges: Vec<MembershipEdge> = Vec::new();
        for (id, memberships, members) in nodes {
            edges.extend(members.iter().enumerate().map(|(index, member)| MembershipEdge {
                collection: id.clone(),
                resource: member.resource.clone(),
                index,
                rank: member.rank,
            }));
            edges.extend(
                memberships
                    .iter()
                    .filter(|position| !restored.contains(&position.collection))
                    .map(|position| MembershipEdge {
                        collection: position.collection.clone(),
                        resource: id.clone(),
                        index: position.index,
                        rank: position.rank,
                    }),
            );
        }
        edges.retain(|edge| self.contains(&edge.collection) && self.contains(&edge.resource));
        self.memberships.restore_edges(edges);
    }
}

/// Applies `order` to `current`: unknown and repeated ids are dropped and
/// unmentioned ids are appended. Returns the new list and whether `order`
/// was an exact permutation.
fn permute(current: &[EntityId], order: &[EntityId]) -> (Vec<EntityId>, bool) {
    let known: HashSet<&EntityId> = current.iter().collect();
    let mut seen: HashSet<&EntityId> = HashSet::with_capacity(current.len());
    let mut next: Vec<EntityId> = Vec::with_capacity(current.len());
    for id in order {
        if known.contains(id) && seen.insert(id) {
            next.push(id.clone());
        }
    }
    let exact = next.len() == current.len() && order.len() == current.len();
    next.extend(current.iter().filter(|id| !seen.contains(id)).cloned());
    (next, exact)
}
