//! Property-based test generators using proptest.
//!
//! Provides strategies for well-formed resource trees and for mutation
//! sequences that can be replayed against a [`Vault`].
//!
//! Generated trees use sequential ids, never carry `null` extensions (those
//! are dropped on load) and only use floats that are exact multiples of 1/8.
//! A record may be listed by more than one grouping, either in full or as an
//! `{id, type}` reference; every other id appears once. Such trees export
//! with every reference expanded, see [`expand_references`].

use proptest::prelude::*;
use proptest::sample::Index;
use vault_core::{Entity, EntityId, EntityType, RemoveOptions, RestoreOptions, Vault, VaultResult};
use vault_value::{Map, Value};

/// Strategy for generating non-null extension values.
pub fn extension_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<u64>().prop_map(Value::from),
        (-4096i32..4096).prop_map(|n| Value::Float(f64::from(n) / 8.0)),
        "[a-z ]{0,12}".prop_map(Value::Text),
        prop::collection::vec(any::<i32>(), 0..4)
            .prop_map(|items| Value::Array(items.into_iter().map(Value::from).collect())),
    ]
}

/// Strategy for generating label values in the language-map form.
pub fn label_strategy() -> impl Strategy<Value = Value> {
    "[A-Za-z][A-Za-z0-9 ]{0,15}".prop_map(|text| {
        Value::object([("en", Value::Array(vec![Value::Text(text)]))])
    })
}

/// Label and extension carried by a generated node.
#[derive(Debug, Clone)]
struct Extras {
    label: Option<Value>,
    extension: Option<Value>,
}

fn extras_strategy() -> impl Strategy<Value = Extras> {
    (
        prop::option::of(label_strategy()),
        prop::option::of(extension_value_strategy()),
    )
        .prop_map(|(label, extension)| Extras { label, extension })
}

#[derive(Debug, Clone)]
struct PageShape {
    extras: Extras,
    width: u32,
    layers: Vec<usize>,
    annotation_layers: Vec<usize>,
}

#[derive(Debug, Clone)]
struct RecordShape {
    extras: Extras,
    pages: Vec<PageShape>,
    structures: Vec<usize>,
}

/// An extra listing of an already generated record.
#[derive(Debug, Clone)]
struct ShareShape {
    record: Index,
    target: Index,
    position: Index,
    full: bool,
}

#[derive(Debug, Clone)]
struct GroupingShape {
    extras: Extras,
    records: Vec<RecordShape>,
    groupings: Vec<(Extras, Vec<RecordShape>)>,
    shares: Vec<ShareShape>,
}

fn page_shape() -> impl Strategy<Value = PageShape> {
    (
        extras_strategy(),
        1u32..4000,
        prop::collection::vec(0usize..4, 0..3),
        prop::collection::vec(0usize..3, 0..2),
    )
        .prop_map(|(extras, width, layers, annotation_layers)| PageShape {
            extras,
            width,
            layers,
            annotation_layers,
        })
}

fn record_shape() -> impl Strategy<Value = RecordShape> {
    (
        extras_strategy(),
        prop::collection::vec(page_shape(), 0..4),
        prop::collection::vec(0usize..3, 0..3),
    )
        .prop_map(|(extras, pages, structures)| RecordShape {
            extras,
            pages,
            structures,
        })
}

fn grouping_shape() -> impl Strategy<Value = GroupingShape> {
    (
        extras_strategy(),
        prop::collection::vec(record_shape(), 0..4),
        prop::collection::vec(
            (extras_strategy(), prop::collection::vec(record_shape(), 0..3)),
            0..3,
        ),
        prop::collection::vec(
            (any::<Index>(), any::<Index>(), any::<Index>(), any::<bool>()).prop_map(
                |(record, target, position, full)| ShareShape {
                    record,
                    target,
                    position,
                    full,
                },
            ),
            0..3,
        ),
    )
        .prop_map(|(extras, records, groupings, shares)| GroupingShape {
            extras,
            records,
            groupings,
            shares,
        })
}

/// Assigns ids per type in visiting order and renders shapes as nodes.
#[derive(Default)]
struct TreeBuilder {
    counters: [usize; 6],
}

impl TreeBuilder {
    fn node(&mut self, kind: EntityType, extras: &Extras) -> Map {
        let counter = &mut self.counters[kind.index()];
        *counter += 1;
        let prefix = match kind {
            EntityType::Grouping => "g",
            EntityType::Record => "r",
            EntityType::Page => "p",
            EntityType::Substructure => "s",
            EntityType::AnnotationLayer => "l",
            EntityType::Annotation => "a",
        };
        let mut node = Map::new();
        node.insert("id".into(), Value::Text(format!("{prefix}{counter}")));
        node.insert("type".into(), Value::Text(kind.as_str().into()));
        if let Some(label) = &extras.label {
            node.insert("label".into(), label.clone());
        }
        if let Some(extension) = &extras.extension {
            node.insert("x-test".into(), extension.clone());
        }
        node
    }

    fn children(node: &mut Map, property: &str, children: Vec<Value>) {
        if !children.is_empty() {
            node.insert(property.into(), Value::Array(children));
        }
    }

    fn layer(&mut self, annotations: usize) -> Value {
        let plain = Extras {
            label: None,
            extension: None,
        };
        let mut node = self.node(EntityType::AnnotationLayer, &plain);
        let items = (0..annotations)
            .map(|_| {
                let mut annotation = self.node(EntityType::Annotation, &plain);
                annotation.insert("motivation".into(), Value::Text("commenting".into()));
                Value::Object(annotation)
            })
            .collect();
        Self::children(&mut node, "items", items);
        Value::Object(node)
    }

    fn page(&mut self, shape: &PageShape) -> Value {
        let mut node = self.node(EntityType::Page, &shape.extras);
        node.insert("width".into(), Value::from(shape.width));
        let items = shape.layers.iter().map(|n| self.layer(*n)).collect();
        Self::children(&mut node, "items", items);
        let annotations = shape.annotation_layers.iter().map(|n| self.layer(*n)).collect();
        Self::children(&mut node, "annotations", annotations);
        Value::Object(node)
    }

    fn substructure(&mut self, nested: usize) -> Value {
        let plain = Extras {
            label: None,
            extension: None,
        };
        let mut node = self.node(EntityType::Substructure, &plain);
        let items = (0..nested)
            .map(|_| Value::Object(self.node(EntityType::Substructure, &plain)))
            .collect();
        Self::children(&mut node, "items", items);
        Value::Object(node)
    }

    fn record(&mut self, shape: &RecordShape) -> Value {
        let mut node = self.node(EntityType::Record, &shape.extras);
        let pages = shape.pages.iter().map(|page| self.page(page)).collect();
        Self::children(&mut node, "items", pages);
        let structures = shape.structures.iter().map(|n| self.substructure(*n)).collect();
        Self::children(&mut node, "structures", structures);
        Value::Object(node)
    }

    fn grouping(&mut self, shape: &GroupingShape) -> Value {
        let mut node = self.node(EntityType::Grouping, &shape.extras);
        // Member lists: index 0 is the top grouping, then each inner one.
        let mut lists: Vec<Vec<Value>> = vec![shape.records.iter().map(|r| self.record(r)).collect()];
        let mut inner = Vec::with_capacity(shape.groupings.len());
        for (extras, records) in &shape.groupings {
            inner.push(self.node(EntityType::Grouping, extras));
            lists.push(records.iter().map(|r| self.record(r)).collect());
        }

        let built: Vec<(usize, Value)> = lists
            .iter()
            .enumerate()
            .flat_map(|(owner, list)| list.iter().map(move |record| (owner, record.clone())))
            .collect();
        if !built.is_empty() {
            for share in &shape.shares {
                let (owner, record) = &built[share.record.index(built.len())];
                let target = share.target.index(lists.len());
                let listed = lists[target]
                    .iter()
                    .any(|member| member.get("id") == record.get("id"));
                if target == *owner || listed {
                    continue;
                }
                let entry = if share.full {
                    record.clone()
                } else {
                    reference(record)
                };
                let position = share.position.index(lists[target].len() + 1);
                lists[target].insert(position, entry);
            }
        }

        let mut lists = lists.into_iter();
        let mut items = lists.next().unwrap_or_default();
        for (mut grouping, members) in inner.into_iter().zip(lists) {
            Self::children(&mut grouping, "items", members);
            items.push(Value::Object(grouping));
        }
        Self::children(&mut node, "items", items);
        Value::Object(node)
    }
}

fn reference(node: &Value) -> Value {
    let keep = |key: &str| node.get(key).cloned().unwrap_or_default();
    Value::object([("id", keep("id")), ("type", keep("type"))])
}

fn is_reference(node: &Value) -> bool {
    node.as_object()
        .is_some_and(|map| map.keys().all(|key| key == "id" || key == "type"))
}

/// Replaces every `{id, type}` reference with the full node it refers to.
///
/// This is the form a tree takes after a load and export, since the flat
/// state rebuilds each grouping member in full. The tree must not contain
/// membership cycles.
pub fn expand_references(tree: &Value) -> Value {
    fn collect<'a>(node: &'a Value, full: &mut std::collections::HashMap<&'a str, &'a Value>) {
        if let Some(id) = node.get_text("id") {
            if !is_reference(node) {
                full.entry(id).or_insert(node);
            }
        }
        for value in node.as_object().into_iter().flat_map(|map| map.values()) {
            for child in value.as_array().unwrap_or(&[]) {
                collect(child, full);
            }
        }
    }

    fn rebuild(node: &Value, full: &std::collections::HashMap<&str, &Value>) -> Value {
        let source = match node.get_text("id").and_then(|id| full.get(id)) {
            Some(found) if is_reference(node) => *found,
            _ => node,
        };
        match source {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        let value = match value {
                            Value::Array(items) => {
                                Value::Array(items.iter().map(|item| rebuild(item, full)).collect())
                            }
                            other => other.clone(),
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    let mut full = std::collections::HashMap::new();
    collect(tree, &mut full);
    rebuild(tree, &full)
}

/// Strategy for generating a well-formed tree rooted at a grouping.
pub fn tree_strategy() -> impl Strategy<Value = Value> {
    grouping_shape().prop_map(|shape| TreeBuilder::default().grouping(&shape))
}

/// Strategy for generating a well-formed tree rooted at a record.
pub fn record_tree_strategy() -> impl Strategy<Value = Value> {
    record_shape().prop_map(|shape| TreeBuilder::default().record(&shape))
}

/// A mutation to replay against a vault.
///
/// Targets are [`Index`] values resolved against the vault's current ids at
/// replay time, so any sequence applies to any vault.
#[derive(Debug, Clone)]
pub enum VaultOp {
    /// Patch the label and extension of an entity.
    Update {
        /// Entity to patch.
        target: Index,
        /// New label text.
        label: String,
    },
    /// Add a fresh record, under a grouping or standalone.
    AddRecord {
        /// Grouping to add under.
        collection: Option<Index>,
    },
    /// Add a fresh page under a record.
    AddPage {
        /// Owning record.
        record: Index,
    },
    /// Move an entity to the trash.
    Trash {
        /// Entity to trash.
        target: Index,
    },
    /// Permanently remove an active or trashed id.
    Purge {
        /// Id to purge.
        target: Index,
    },
    /// Restore a trash entry to its captured position.
    Restore {
        /// Trash entry to restore.
        entry: Index,
    },
    /// Empty the trash.
    EmptyTrash,
    /// Re-parent an entity.
    Move {
        /// Entity to move.
        target: Index,
        /// New parent.
        parent: Index,
        /// Insert position.
        index: Option<usize>,
    },
    /// Reverse the owned child list of an entity.
    ReverseChildren {
        /// Parent entity.
        parent: Index,
    },
    /// Reverse the member list of a grouping.
    ReverseCollection {
        /// Grouping to reorder.
        collection: Index,
    },
    /// Add a record or grouping to a grouping.
    AddToCollection {
        /// Target grouping.
        collection: Index,
        /// Record or grouping to add.
        resource: Index,
    },
    /// Remove a record or grouping from a grouping.
    RemoveFromCollection {
        /// Target grouping.
        collection: Index,
        /// Record or grouping to remove.
        resource: Index,
    },
}

fn lifecycle_op_strategy() -> impl Strategy<Value = VaultOp> {
    prop_oneof![
        2 => (any::<Index>(), "[a-z]{1,8}")
            .prop_map(|(target, label)| VaultOp::Update { target, label }),
        2 => prop::option::of(any::<Index>())
            .prop_map(|collection| VaultOp::AddRecord { collection }),
        2 => any::<Index>().prop_map(|record| VaultOp::AddPage { record }),
        3 => any::<Index>().prop_map(|target| VaultOp::Trash { target }),
        1 => any::<Index>().prop_map(|target| VaultOp::Purge { target }),
        3 => any::<Index>().prop_map(|entry| VaultOp::Restore { entry }),
        1 => Just(VaultOp::EmptyTrash),
    ]
}

fn structure_op_strategy() -> impl Strategy<Value = VaultOp> {
    prop_oneof![
        3 => (any::<Index>(), any::<Index>(), prop::option::of(0usize..5))
            .prop_map(|(target, parent, index)| VaultOp::Move { target, parent, index }),
        1 => any::<Index>().prop_map(|parent| VaultOp::ReverseChildren { parent }),
        1 => any::<Index>().prop_map(|collection| VaultOp::ReverseCollection { collection }),
        2 => (any::<Index>(), any::<Index>())
            .prop_map(|(collection, resource)| VaultOp::AddToCollection { collection, resource }),
        1 => (any::<Index>(), any::<Index>())
            .prop_map(|(collection, resource)| VaultOp::RemoveFromCollection { collection, resource }),
    ]
}

/// Strategy for generating a single vault operation.
pub fn vault_op_strategy() -> impl Strategy<Value = VaultOp> {
    prop_oneof![
        2 => lifecycle_op_strategy(),
        1 => structure_op_strategy(),
    ]
}

/// Strategy for generating a sequence of vault operations.
pub fn vault_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<VaultOp>> {
    prop::collection::vec(vault_op_strategy(), min_ops..=max_ops)
}

/// Replays [`VaultOp`]s against a vault.
///
/// New entities get ids `new-1`, `new-2`, ... in replay order, so two runs
/// of the same sequence against equal vaults produce equal results.
#[derive(Debug)]
pub struct OpRunner {
    /// The vault being driven.
    pub vault: Vault,
    next_id: usize,
}

impl OpRunner {
    /// Wraps a vault.
    pub fn new(vault: Vault) -> Self {
        Self { vault, next_id: 0 }
    }

    /// Active ids of the given types, sorted.
    pub fn active_ids(&self, kinds: &[EntityType]) -> Vec<EntityId> {
        let state = self.vault.state();
        let mut ids: Vec<EntityId> = kinds
            .iter()
            .flat_map(|kind| state.entities_of_type(*kind))
            .map(|entity| entity.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn pick(ids: &[EntityId], index: &Index) -> Option<EntityId> {
        if ids.is_empty() {
            None
        } else {
            Some(ids[index.index(ids.len())].clone())
        }
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("new-{}", self.next_id)
    }

    /// Applies one operation.
    ///
    /// Returns `None` when the vault had nothing for the operation to
    /// target, otherwise the operation's result.
    pub fn apply(&mut self, op: &VaultOp) -> Option<VaultResult<()>> {
        let all = self.active_ids(&EntityType::ALL);
        let groupings = self.active_ids(&[EntityType::Grouping]);
        let collectable = self.active_ids(&[EntityType::Grouping, EntityType::Record]);
        match op {
            VaultOp::Update { target, label } => {
                let id = Self::pick(&all, target)?;
                let mut patch = Map::new();
                patch.insert("label".into(), Value::Text(label.clone()));
                patch.insert("x-touched".into(), Value::Bool(true));
                Some(self.vault.update(&id, &patch).map(|_| ()))
            }
            VaultOp::AddRecord { collection } => {
                let parent = match collection {
                    Some(index) => Some(Self::pick(&groupings, index)?),
                    None => None,
                };
                let entity = Entity::new(self.fresh_id(), EntityType::Record);
                Some(self.vault.add(entity, parent.as_deref()).map(|_| ()))
            }
            VaultOp::AddPage { record } => {
                let records = self.active_ids(&[EntityType::Record]);
                let parent = Self::pick(&records, record)?;
                let entity = Entity::new(self.fresh_id(), EntityType::Page).with_property("width", 100);
                Some(self.vault.add(entity, Some(&parent)).map(|_| ()))
            }
            VaultOp::Trash { target } => {
                let id = Self::pick(&all, target)?;
                Some(self.vault.move_to_trash(&id).map(|_| ()))
            }
            VaultOp::Purge { target } => {
                let mut pool = all;
                pool.extend(self.vault.trashed_ids());
                let id = Self::pick(&pool, target)?;
                Some(self.vault.remove(&id, RemoveOptions::permanent()).map(|_| ()))
            }
            VaultOp::Restore { entry } => {
                let id = Self::pick(&self.vault.trashed_ids(), entry)?;
                Some(
                    self.vault
                        .restore_from_trash(&id, RestoreOptions::default())
                        .map(|_| ()),
                )
            }
            VaultOp::EmptyTrash => {
                self.vault.empty_trash();
                Some(Ok(()))
            }
            VaultOp::Move {
                target,
                parent,
                index,
            } => {
                let id = Self::pick(&all, target)?;
                let parent = Self::pick(&all, parent)?;
                Some(self.vault.move_entity(&id, &parent, *index))
            }
            VaultOp::ReverseChildren { parent } => {
                let parent = Self::pick(&all, parent)?;
                let mut order = self.vault.get_children(&parent).to_vec();
                order.reverse();
                Some(self.vault.reorder_children(&parent, &order))
            }
            VaultOp::ReverseCollection { collection } => {
                let collection = Self::pick(&groupings, collection)?;
                let mut order = self.vault.get_collection_members(&collection).to_vec();
                order.reverse();
                Some(self.vault.reorder_collection(&collection, &order))
            }
            VaultOp::AddToCollection {
                collection,
                resource,
            } => {
                let collection = Self::pick(&groupings, collection)?;
                let resource = Self::pick(&collectable, resource)?;
                Some(self.vault.add_to_collection(&collection, &resource).map(|_| ()))
            }
            VaultOp::RemoveFromCollection {
                collection,
                resource,
            } => {
                let collection = Self::pick(&groupings, collection)?;
                let resource = Self::pick(&collectable, resource)?;
                Some(
                    self.vault
                        .remove_from_collection(&collection, &resource)
                        .map(|_| ()),
                )
            }
        }
    }

    /// Applies every operation, returning how many succeeded.
    pub fn run(&mut self, ops: &[VaultOp]) -> usize {
        ops.iter()
            .filter(|op| matches!(self.apply(op), Some(Ok(()))))
            .count()
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
