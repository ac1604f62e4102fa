//! Nested tree to flat state.
//!
//! The walk is depth-first from the top node. Malformed nodes are skipped
//! with a warning instead of aborting the load, so a partially broken tree
//! from a third-party producer still yields everything that could be read.
//!
//! Grouping members may repeat across groupings. The first full occurrence
//! of a member supplies its content, wherever bare `{id, type}` references
//! to it appear.

use crate::denormalize::denormalize_entity;
use crate::entity::Entity;
use crate::id::EntityId;
use crate::registry::{ChildSlot, EntityType, Relation, TypeRegistry};
use crate::state::FlatState;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use vault_value::{Map, Value};

/// Why a node was left out of the flat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The node is not a JSON object.
    NotAnObject,
    /// The node has no string `type`.
    MissingType,
    /// The node's `type` is outside the closed set.
    UnknownType(String),
    /// The node has no string `id`.
    MissingId,
    /// The enclosing property does not accept the node's type.
    UnexpectedType {
        /// The enclosing child property.
        property: &'static str,
        /// The node's type.
        found: EntityType,
    },
    /// The id is already owned elsewhere in the tree.
    DuplicateOwnedId,
    /// The id was already read with a different type.
    TypeConflict {
        /// Type of the first occurrence.
        existing: EntityType,
    },
    /// A child property holds something other than an array.
    ChildrenNotArray,
    /// The grouping already lists this member; the entry is dropped.
    RepeatedMember {
        /// The grouping holding both entries.
        collection: EntityId,
    },
    /// The id was already read with different content.
    ///
    /// The membership edge is kept and the node is treated as an `{id, type}`
    /// reference to the first occurrence.
    ConflictingDuplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => f.write_str("node is not an object"),
            SkipReason::MissingType => f.write_str("node has no type"),
            SkipReason::UnknownType(name) => write!(f, "unknown type {name:?}"),
            SkipReason::MissingId => f.write_str("node has no string id"),
            SkipReason::UnexpectedType { property, found } => {
                write!(f, "{found} is not accepted under {property:?}")
            }
            SkipReason::DuplicateOwnedId => f.write_str("id is already owned elsewhere"),
            SkipReason::TypeConflict { existing } => {
                write!(f, "id was already read as a {existing}")
            }
            SkipReason::ChildrenNotArray => f.write_str("child property is not an array"),
            SkipReason::RepeatedMember { collection } => {
                write!(f, "already a member of {collection}")
            }
            SkipReason::ConflictingDuplicate => {
                f.write_str("id was already read with different content; kept as a reference")
            }
        }
    }
}

/// A node left out of the flat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    /// JSON-pointer-like location of the node (`""` is the top node).
    pub path: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

impl fmt::Display for SkippedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.reason)
    }
}

/// Everything the normalizer had to leave out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Skipped nodes, in walk order. A skipped node's subtree is not walked.
    ///
    /// A `ConflictingDuplicate` entry still contributes its membership edge.
    pub skipped: Vec<SkippedNode>,
}

impl NormalizeReport {
    /// Whether every node made it into the state.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Converts a nested tree into a flat state.
pub fn normalize(tree: &Value) -> FlatState {
    normalize_with_report(tree).0
}

/// Converts a nested tree into a flat state and reports skipped nodes.
///
/// The top node becomes the root. If the top node itself is unusable the
/// state is empty.
pub fn normalize_with_report(tree: &Value) -> (FlatState, NormalizeReport) {
    let mut walker = Walker::default();
    walker.state.root = walker.visit(tree, String::new(), Context::Root);
    (walker.state, walker.report)
}

#[derive(Clone, Copy)]
enum Context<'a> {
    Root,
    Child {
        parent: &'a EntityId,
        slot: &'static ChildSlot,
    },
}

#[derive(Default)]
struct Walker {
    state: FlatState,
    report: NormalizeReport,
}

impl Walker {
    fn skip(&mut self, path: String, reason: SkipReason) -> Option<EntityId> {
        warn!(path = %path, reason = %reason, "skipping node");
        self.report.skipped.push(SkippedNode { path, reason });
        None
    }

    fn visit(&mut self, node: &Value, path: String, context: Context<'_>) -> Option<EntityId> {
        let Some(object) = node.as_object() else {
            return self.skip(path, SkipReason::NotAnObject);
        };
        let kind = match object.get("type").and_then(Value::as_text) {
            None => return self.skip(path, SkipReason::MissingType),
            Some(name) => match EntityType::from_wire(name) {
                Some(kind) => kind,
                None => return self.skip(path, SkipReason::UnknownType(name.to_string())),
            },
        };
        let Some(raw_id) = object.get("id").and_then(Value::as_text) else {
            return self.skip(path, SkipReason::MissingId);
        };
        if let Context::Child { slot, .. } = context {
            if !slot.accepts(kind) {
                let property = slot.property;
                return self.skip(path, SkipReason::UnexpectedType { property, found: kind });
            }
        }

        if let Some(existing) = self.state.get_entity_type(raw_id) {
            return self.revisit(object, raw_id, kind, existing, path, context);
        }

        let mut entity = Entity::new(raw_id, kind);
        for (key, value) in object {
            entity.absorb(key.clone(), value.clone());
        }
        let id = entity.id.clone();
        self.state.insert_entity(Arc::new(entity));
        self.link(&id, context);

        for slot in TypeRegistry::child_slots(kind) {
            self.visit_children(object, &id, slot, &path);
        }
        Some(id)
    }

    /// Handles a second occurrence of an id already in the state.
    ///
    /// Only grouping members may repeat. A bare `{id, type}` reference adds
    /// the edge. A full node fills in an entity that so far was only seen
    /// as a reference, and is otherwise checked against what was read.
    fn revisit(
        &mut self,
        object: &Map,
        raw_id: &str,
        kind: EntityType,
        existing: EntityType,
        path: String,
        context: Context<'_>,
    ) -> Option<EntityId> {
        if existing != kind {
            return self.skip(path, SkipReason::TypeConflict { existing });
        }
        let parent = match context {
            Context::Child { parent, slot } if slot.relation == Relation::Membership => parent,
            _ => return self.skip(path, SkipReason::DuplicateOwnedId),
        };
        let id = self.state.canonical_id(raw_id)?;
        let repeated = self.state.memberships.contains(parent, &id);

        let conflicting = if is_reference(object) {
            false
        } else if self.is_bare(&id) {
            self.fill(object, &id, kind, &path);
            false
        } else {
            denormalize_entity(&self.state, &id)
                .as_ref()
                .and_then(Value::as_object)
                != Some(object)
        };

        if repeated {
            return self.skip(path, SkipReason::RepeatedMember { collection: parent.clone() });
        }
        self.state.memberships.add(parent.clone(), id.clone(), None);
        if conflicting {
            warn!(path = %path, id = %id, "duplicate member differs from its first occurrence");
            self.report.skipped.push(SkippedNode {
                path,
                reason: SkipReason::ConflictingDuplicate,
            });
        } else {
            debug!(id = %id, collection = %parent, "repeated membership reference");
        }
        Some(id)
    }

    /// Whether `id` was so far only seen as an `{id, type}` reference.
    fn is_bare(&self, id: &str) -> bool {
        self.state.get_entity(id).is_some_and(|entity| {
            entity.properties.is_empty() && entity.extensions.is_empty()
        }) && self.state.get_children(id).is_empty()
            && self.state.get_collection_members(id).is_empty()
    }

    /// Copies a full occurrence into an entity first read as a reference.
    fn fill(&mut self, object: &Map, id: &EntityId, kind: EntityType, path: &str) {
        if let Some(entity) = self.state.entity_mut(kind, id) {
            for (key, value) in object {
                entity.absorb(key.clone(), value.clone());
            }
        }
        debug!(id = %id, "filling in an earlier reference");
        for slot in TypeRegistry::child_slots(kind) {
            self.visit_children(object, id, slot, path);
        }
    }

    fn link(&mut self, id: &EntityId, context: Context<'_>) {
        if let Context::Child { parent, slot } = context {
            match slot.relation {
                Relation::Ownership => {
                    self.state
                        .references
                        .attach(parent.clone(), id.clone(), slot.property, None);
                }
                Relation::Membership => {
                    self.state.memberships.add(parent.clone(), id.clone(), None);
                }
            }
        }
    }

    fn visit_children(&mut self, object: &Map, parent: &EntityId, slot: &'static ChildSlot, path: &str) {
        let Some(value) = object.get(slot.property) else {
            return;
        };
        let child_path = format!("{path}/{}", slot.property);
        let Some(children) = value.as_array() else {
            self.skip(child_path, SkipReason::ChildrenNotArray);
            return;
        };
        for (i, child) in children.iter().enumerate() {
            self.visit(child, format!("{child_path}/{i}"), Context::Child { parent, slot });
        }
    }
}

fn is_reference(object: &Map) -> bool {
    object.keys().all(|key| key == "id" || key == "type")
}
