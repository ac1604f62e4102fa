//! Structural invariant checker for flat states.
//!
//! [`check`] walks every map of a [`FlatState`] and reports each place where
//! two views of the same fact disagree. An empty result means the state is
//! internally consistent.

use std::collections::HashMap;
use std::fmt;
use vault_core::{EntityId, EntityType, FlatState, TypeRegistry};

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The type index names an entity its bucket does not hold.
    IndexWithoutEntity {
        /// The indexed id.
        id: EntityId,
        /// The indexed type.
        kind: EntityType,
    },
    /// A bucket holds an entity the index does not map to that bucket.
    Unindexed {
        /// The stored id.
        id: EntityId,
        /// The bucket holding it.
        kind: EntityType,
    },
    /// An entity sits in a bucket other than its own type's.
    WrongBucket {
        /// The stored id.
        id: EntityId,
        /// The bucket holding it.
        bucket: EntityType,
    },
    /// An id is stored in more than one bucket.
    DuplicateId {
        /// The repeated id.
        id: EntityId,
    },
    /// An ownership edge touches an inactive entity.
    DanglingOwnership {
        /// The owner.
        parent: EntityId,
        /// The owned entity.
        child: EntityId,
    },
    /// The parent and child maps disagree about an edge.
    OwnershipMismatch {
        /// The owner.
        parent: EntityId,
        /// The owned entity.
        child: EntityId,
    },
    /// The owner's slot does not accept the child's type.
    RejectedSlot {
        /// The owner.
        parent: EntityId,
        /// The owned entity.
        child: EntityId,
        /// The slot named by the edge.
        slot: &'static str,
    },
    /// A grouping owns an entity without listing it as a member.
    OwnedNotMember {
        /// The owning grouping.
        grouping: EntityId,
        /// The owned entity.
        child: EntityId,
    },
    /// A child or member list is stored empty or holds a duplicate.
    MalformedList {
        /// The list's owner.
        id: EntityId,
    },
    /// The two sides of the membership graph disagree.
    AsymmetricMembership {
        /// The grouping.
        collection: EntityId,
        /// The member.
        resource: EntityId,
    },
    /// A membership edge touches an inactive entity or a type that cannot
    /// take part in one.
    InvalidMembership {
        /// The grouping.
        collection: EntityId,
        /// The member.
        resource: EntityId,
    },
    /// An id is both active and held by the trash.
    ActiveAndTrashed {
        /// The id.
        id: EntityId,
    },
    /// The trash lookup does not point back at the entry holding an id.
    TrashLookupMismatch {
        /// The captured id.
        id: EntityId,
    },
    /// The root is set but not active.
    InactiveRoot {
        /// The root id.
        id: EntityId,
    },
    /// An entity is its own ancestor.
    OwnershipCycle {
        /// An entity on the cycle.
        id: EntityId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::IndexWithoutEntity { id, kind } => {
                write!(f, "index maps {id} to {kind} but the bucket lacks it")
            }
            Violation::Unindexed { id, kind } => write!(f, "{kind} bucket holds unindexed {id}"),
            Violation::WrongBucket { id, bucket } => write!(f, "{id} is stored in the {bucket} bucket"),
            Violation::DuplicateId { id } => write!(f, "{id} is stored more than once"),
            Violation::DanglingOwnership { parent, child } => {
                write!(f, "ownership {parent} -> {child} touches an inactive entity")
            }
            Violation::OwnershipMismatch { parent, child } => {
                write!(f, "ownership {parent} -> {child} is one-sided")
            }
            Violation::RejectedSlot { parent, child, slot } => {
                write!(f, "{parent}.{slot} does not accept {child}")
            }
            Violation::OwnedNotMember { grouping, child } => {
                write!(f, "{grouping} owns {child} without listing it")
            }
            Violation::MalformedList { id } => write!(f, "list of {id} is empty or repeats an id"),
            Violation::AsymmetricMembership { collection, resource } => {
                write!(f, "membership {collection} -> {resource} is one-sided")
            }
            Violation::InvalidMembership { collection, resource } => {
                write!(f, "membership {collection} -> {resource} is invalid")
            }
            Violation::ActiveAndTrashed { id } => write!(f, "{id} is both active and trashed"),
            Violation::TrashLookupMismatch { id } => write!(f, "trash lookup for {id} is stale"),
            Violation::InactiveRoot { id } => write!(f, "root {id} is not active"),
            Violation::OwnershipCycle { id } => write!(f, "{id} is its own ancestor"),
        }
    }
}

/// Checks every structural invariant of `state` except acyclicity.
///
/// Ownership cycles can only come from moves made with cycle rejection
/// turned off; see [`check_acyclic`].
pub fn check(state: &FlatState) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_storage(state, &mut violations);
    check_ownership(state, &mut violations);
    check_membership(state, &mut violations);
    check_trash(state, &mut violations);
    if let Some(root) = state.root() {
        if !state.contains(root) {
            violations.push(Violation::InactiveRoot { id: root.clone() });
        }
    }
    violations
}

/// Reports every owned entity that is its own ancestor.
pub fn check_acyclic(state: &FlatState) -> Vec<Violation> {
    let mut cyclic: Vec<EntityId> = state
        .references()
        .links()
        .map(|(child, _)| child)
        .filter(|child| state.get_ancestors(child).contains(child))
        .cloned()
        .collect();
    cyclic.sort();
    cyclic
        .into_iter()
        .map(|id| Violation::OwnershipCycle { id })
        .collect()
}

/// Panics with every violation listed when `state` is inconsistent.
pub fn assert_consistent(state: &FlatState) {
    let violations: Vec<String> = check(state)
        .into_iter()
        .chain(check_acyclic(state))
        .map(|violation| violation.to_string())
        .collect();
    assert!(
        violations.is_empty(),
        "state violates {} invariant(s):\n{}",
        violations.len(),
        violations.join("\n")
    );
}

fn check_storage(state: &FlatState, violations: &mut Vec<Violation>) {
    let mut seen: HashMap<&EntityId, usize> = HashMap::new();
    for bucket in EntityType::ALL {
        for entity in state.entities_of_type(bucket) {
            *seen.entry(&entity.id).or_default() += 1;
            if entity.kind != bucket {
                violations.push(Violation::WrongBucket {
                    id: entity.id.clone(),
                    bucket,
                });
            }
            if state.get_entity_type(&entity.id) != Some(bucket) {
                violations.push(Violation::Unindexed {
                    id: entity.id.clone(),
                    kind: bucket,
                });
            }
        }
    }
    let mut repeated: Vec<&EntityId> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    repeated.sort();
    violations.extend(repeated.into_iter().map(|id| Violation::DuplicateId { id: id.clone() }));

    for (id, kind) in state.indexed_ids() {
        if state.get_entity(id).map(|entity| entity.kind) != Some(kind) {
            violations.push(Violation::IndexWithoutEntity { id: id.clone(), kind });
        }
    }
}

fn has_duplicates(list: &[EntityId]) -> bool {
    list.iter()
        .enumerate()
        .any(|(i, id)| list[..i].contains(id))
}

fn check_ownership(state: &FlatState, violations: &mut Vec<Violation>) {
    let references = state.references();
    for (child, link) in references.links() {
        let parent = &link.parent;
        let (Some(parent_kind), Some(child_kind)) =
            (state.get_entity_type(parent), state.get_entity_type(child))
        else {
            violations.push(Violation::DanglingOwnership {
                parent: parent.clone(),
                child: child.clone(),
            });
            continue;
        };
        if !references.children(parent).contains(child) {
            violations.push(Violation::OwnershipMismatch {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        let accepted = TypeRegistry::child_slot(parent_kind, link.slot)
            .is_some_and(|slot| slot.accepts(child_kind));
        if !accepted {
            violations.push(Violation::RejectedSlot {
                parent: parent.clone(),
                child: child.clone(),
                slot: link.slot,
            });
        }
        if parent_kind == EntityType::Grouping && !state.memberships().contains(parent, child) {
            violations.push(Violation::OwnedNotMember {
                grouping: parent.clone(),
                child: child.clone(),
            });
        }
    }
    for (parent, children) in references.child_lists() {
        if children.is_empty() || has_duplicates(children) {
            violations.push(Violation::MalformedList { id: parent.clone() });
        }
        for child in children {
            if references.parent(child) != Some(parent) {
                violations.push(Violation::OwnershipMismatch {
                    parent: parent.clone(),
                    child: child.clone(),
                });
            }
        }
    }
}

fn check_membership(state: &FlatState, violations: &mut Vec<Violation>) {
    let memberships = state.memberships();
    for (collection, members) in memberships.member_lists() {
        if members.is_empty() || has_duplicates(members) {
            violations.push(Violation::MalformedList {
                id: collection.clone(),
            });
        }
        let collection_ok = state.get_entity_type(collection) == Some(EntityType::Grouping);
        for resource in members {
            if !memberships.containers(resource).contains(collection) {
                violations.push(Violation::AsymmetricMembership {
                    collection: collection.clone(),
                    resource: resource.clone(),
                });
            }
            let resource_ok = state
                .get_entity_type(resource)
                .is_some_and(EntityType::is_collectable);
            if !collection_ok || !resource_ok {
                violations.push(Violation::InvalidMembership {
                    collection: collection.clone(),
                    resource: resource.clone(),
                });
            }
        }
    }
    for (resource, collections) in memberships.container_lists() {
        if collections.is_empty() || has_duplicates(collections) {
            violations.push(Violation::MalformedList { id: resource.clone() });
        }
        for collection in collections {
            if !memberships.contains(collection, resource) {
                violations.push(Violation::AsymmetricMembership {
                    collection: collection.clone(),
                    resource: resource.clone(),
                });
            }
        }
    }
}

fn check_trash(state: &FlatState, violations: &mut Vec<Violation>) {
    let trash = state.trash();
    for entry in trash.iter() {
        for id in entry.captured_ids() {
            if state.contains(id) {
                violations.push(Violation::ActiveAndTrashed { id: id.clone() });
            }
            if trash.entry_for(id) != Some(entry.id()) {
                violations.push(Violation::TrashLookupMismatch { id: id.clone() });
            }
        }
    }
}
