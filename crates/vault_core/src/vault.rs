//! The vault controller.
//!
//! `Vault` owns the current flat state, applies every mutation through one
//! path (copy-on-write, validate, then notify) and hands out snapshots for
//! undo/redo. There is no global instance; construct one per session.

use crate::change_feed::{Change, ChangeEvent, ChangeFeed, ChangeRecord, Subscription};
use crate::config::VaultConfig;
use crate::denormalize::{denormalize, denormalize_entity};
use crate::entity::Entity;
use crate::error::VaultResult;
use crate::id::EntityId;
use crate::normalize::{normalize_with_report, NormalizeReport};
use crate::ops::{EmptyTrashReport, PatchReport, RemoveOptions, RestoreOptions, RestoreOutcome};
use crate::registry::EntityType;
use crate::state::{FlatState, Located};
use crate::stats::VaultStats;
use crate::trash::TrashEntry;
use std::sync::Arc;
use tracing::{info, warn};
use vault_value::{Map, Value};

/// An immutable handle to one version of the state.
///
/// Taking a snapshot copies one pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<FlatState>);

impl Snapshot {
    /// The captured state.
    pub fn state(&self) -> &FlatState {
        &self.0
    }

    /// Whether two snapshots share the same version.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The normalized entity store.
#[derive(Debug, Default)]
pub struct Vault {
    state: Arc<FlatState>,
    config: VaultConfig,
    feed: ChangeFeed,
    mutations: u64,
    rejected: u64,
}

impl Vault {
    /// Creates an empty vault.
    pub fn new(config: VaultConfig) -> Self {
        let feed = ChangeFeed::with_max_history(config.max_history);
        Self {
            state: Arc::default(),
            config,
            feed,
            mutations: 0,
            rejected: 0,
        }
    }

    /// Creates a vault with the default configuration holding `tree`.
    pub fn from_tree(tree: &Value) -> Self {
        let mut vault = Self::default();
        vault.state = Arc::new(normalize_with_report(tree).0);
        vault
    }

    /// The configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The current state.
    pub fn state(&self) -> &FlatState {
        &self.state
    }

    /// Clears the state. Listeners and history are kept.
    pub fn reset(&mut self) {
        self.state = Arc::default();
        self.commit(Change::Reset);
    }

    /// Replaces the state with a normalized `tree`.
    pub fn load(&mut self, tree: &Value) -> NormalizeReport {
        let (state, report) = normalize_with_report(tree);
        let entities = state.len();
        info!(entities, skipped = report.skipped.len(), "loaded tree");
        self.state = Arc::new(state);
        self.commit(Change::Loaded {
            entities,
            skipped: report.skipped.len(),
        });
        report
    }

    /// Re-normalizes `tree` after it was edited outside the vault.
    ///
    /// Trash entries survive unless one of their ids reappears in `tree`.
    pub fn reload(&mut self, tree: &Value) -> NormalizeReport {
        let (mut state, report) = normalize_with_report(tree);
        let carried: Vec<Arc<TrashEntry>> = self
            .state
            .trash()
            .iter()
            .filter(|entry| !entry.captured_ids().any(|id| state.contains(id)))
            .cloned()
            .collect();
        let kept_trash = carried.len();
        for entry in carried {
            state.trash.insert(entry);
        }
        let entities = state.len();
        info!(entities, kept_trash, "reloaded tree");
        self.state = Arc::new(state);
        self.commit(Change::Reloaded {
            entities,
            kept_trash,
        });
        report
    }

    /// Rebuilds the nested tree, or `None` when no root is set.
    pub fn export(&self) -> Option<Value> {
        denormalize(&self.state)
    }

    /// Rebuilds the subtree of one entity.
    pub fn export_entity(&self, id: &str) -> Option<Value> {
        denormalize_entity(&self.state, id)
    }

    /// Captures the current version.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(Arc::clone(&self.state))
    }

    /// Replaces the current version with a snapshot.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.state = snapshot.0;
        self.commit(Change::SnapshotRestored);
    }

    /// Registers a listener called after every successful mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent<'_>) + 'static) -> Subscription {
        self.feed.subscribe(listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.feed.unsubscribe(subscription)
    }

    /// Reads change records after `cursor`, up to `limit`.
    pub fn poll_changes(&self, cursor: u64, limit: usize) -> Vec<ChangeRecord> {
        self.feed.poll(cursor, limit)
    }

    /// Sequence number of the latest change.
    pub fn latest_sequence(&self) -> u64 {
        self.feed.latest_sequence()
    }

    /// Structural counts plus operation counters.
    pub fn stats(&self) -> VaultStats {
        VaultStats {
            mutations: self.mutations,
            rejected: self.rejected,
            ..VaultStats::collect(&self.state)
        }
    }

    // === Queries ===

    /// Looks up an entity.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.state.get_entity(id)
    }

    /// Looks up an entity's type.
    pub fn get_entity_type(&self, id: &str) -> Option<EntityType> {
        self.state.get_entity_type(id)
    }

    /// Owner of `id`.
    pub fn get_parent(&self, id: &str) -> Option<&EntityId> {
        self.state.get_parent(id)
    }

    /// Owned children of `id`.
    pub fn get_children(&self, id: &str) -> &[EntityId] {
        self.state.get_children(id)
    }

    /// Owners of `id`, nearest first.
    pub fn get_ancestors(&self, id: &str) -> Vec<EntityId> {
        self.state.get_ancestors(id)
    }

    /// Owned descendants of `id`, breadth-first.
    pub fn get_descendants(&self, id: &str) -> Vec<EntityId> {
        self.state.get_descendants(id)
    }

    /// Groupings `id` belongs to.
    pub fn get_collections_containing(&self, id: &str) -> &[EntityId] {
        self.state.get_collections_containing(id)
    }

    /// Members of grouping `id`.
    pub fn get_collection_members(&self, id: &str) -> &[EntityId] {
        self.state.get_collection_members(id)
    }

    /// Whether a record or grouping belongs to no grouping.
    pub fn is_orphan(&self, id: &str) -> bool {
        self.state.is_orphan(id)
    }

    /// Whether `id` has a trash entry.
    pub fn is_trashed(&self, id: &str) -> bool {
        self.state.is_trashed(id)
    }

    /// The trash entry keyed by `id`.
    pub fn trash_entry(&self, id: &str) -> Option<&TrashEntry> {
        self.state.trash_entry(id)
    }

    /// Trashed ids, oldest first.
    pub fn trashed_ids(&self) -> Vec<EntityId> {
        self.state.trashed_ids().cloned().collect()
    }

    /// Explicit index lookup.
    pub fn locate(&self, id: &str) -> Located {
        self.state.locate(id)
    }

    // === Mutations ===

    /// Patches an entity.
    ///
    /// # Errors
    ///
    /// See [`FlatState::update_entity`].
    pub fn update(&mut self, id: &str, patch: &Map) -> VaultResult<PatchReport> {
        self.mutate("update", id, |state, config| state.update_entity(id, patch, config), |_| {
            Change::Updated {
                id: EntityId::from(id),
            }
        })
    }

    /// Inserts an entity under `parent`, or standalone.
    ///
    /// # Errors
    ///
    /// See [`FlatState::add_entity`].
    pub fn add(&mut self, entity: Entity, parent: Option<&str>) -> VaultResult<EntityId> {
        let target = entity.id.clone();
        self.mutate("add", &target, |state, _| state.add_entity(entity, parent), |id| Change::Added {
            id: id.clone(),
            parent: parent.map(EntityId::from),
        })
    }

    /// Inserts a whole subtree under `parent`, or standalone.
    ///
    /// # Errors
    ///
    /// See [`FlatState::add_tree`].
    pub fn add_tree(&mut self, tree: &Value, parent: Option<&str>) -> VaultResult<EntityId> {
        let target = tree.get_text("id").unwrap_or_default().to_string();
        self.mutate("add_tree", &target, |state, _| state.add_tree(tree, parent), |id| {
            Change::Added {
                id: id.clone(),
                parent: parent.map(EntityId::from),
            }
        })
    }

    /// Trashes or purges an entity and its owned subtree.
    ///
    /// # Errors
    ///
    /// See [`FlatState::remove_entity`].
    pub fn remove(&mut self, id: &str, options: RemoveOptions) -> VaultResult<Vec<EntityId>> {
        self.mutate("remove", id, |state, _| state.remove_entity(id, options), |ids| {
            if options.permanent {
                Change::Purged { ids: ids.clone() }
            } else {
                Change::Trashed { ids: ids.clone() }
            }
        })
    }

    /// Moves an entity and its owned subtree to the trash.
    ///
    /// # Errors
    ///
    /// See [`FlatState::move_entity_to_trash`].
    pub fn move_to_trash(&mut self, id: &str) -> VaultResult<Vec<EntityId>> {
        self.mutate("move_to_trash", id, |state, _| state.move_entity_to_trash(id), |ids| {
            Change::Trashed { ids: ids.clone() }
        })
    }

    /// Reinstates a trashed subtree.
    ///
    /// # Errors
    ///
    /// See [`FlatState::restore_entity_from_trash`].
    pub fn restore_from_trash(
        &mut self,
        id: &str,
        options: RestoreOptions,
    ) -> VaultResult<RestoreOutcome> {
        self.mutate(
            "restore_from_trash",
            id,
            |state, config| state.restore_entity_from_trash(id, options, config),
            |outcome| Change::Restored {
                id: EntityId::from(id),
                parent: match outcome {
                    RestoreOutcome::Restored { parent } => parent.clone(),
                    RestoreOutcome::Detached { .. } => None,
                },
            },
        )
    }

    /// Purges every trash entry.
    pub fn empty_trash(&mut self) -> EmptyTrashReport {
        let report = Arc::make_mut(&mut self.state).empty_trash();
        for (id, err) in &report.failures {
            warn!(op = "empty_trash", id = %id, error = %err, "could not purge trash entry");
        }
        self.commit(Change::TrashEmptied {
            purged: report.purged.clone(),
        });
        report
    }

    /// Re-parents an entity.
    ///
    /// # Errors
    ///
    /// See [`FlatState::move_entity`].
    pub fn move_entity(&mut self, id: &str, new_parent: &str, index: Option<usize>) -> VaultResult<()> {
        self.mutate(
            "move",
            id,
            |state, config| state.move_entity(id, new_parent, index, config),
            |_| Change::Moved {
                id: EntityId::from(id),
                parent: EntityId::from(new_parent),
            },
        )
    }

    /// Replaces an owner's child list.
    ///
    /// # Errors
    ///
    /// See [`FlatState::reorder_children`].
    pub fn reorder_children(&mut self, parent: &str, order: &[EntityId]) -> VaultResult<()> {
        self.mutate("reorder_children", parent, |state, _| state.reorder_children(parent, order), |_| {
            Change::Reordered {
                parent: EntityId::from(parent),
            }
        })
    }

    /// Replaces a grouping's member list.
    ///
    /// # Errors
    ///
    /// See [`FlatState::reorder_collection`].
    pub fn reorder_collection(&mut self, collection: &str, order: &[EntityId]) -> VaultResult<()> {
        self.mutate(
            "reorder_collection",
            collection,
            |state, _| state.reorder_collection(collection, order),
            |_| Change::Reordered {
                parent: EntityId::from(collection),
            },
        )
    }

    /// Adds a membership edge.
    ///
    /// # Errors
    ///
    /// See [`FlatState::add_to_collection`].
    pub fn add_to_collection(&mut self, collection: &str, resource: &str) -> VaultResult<bool> {
        self.mutate(
            "add_to_collection",
            resource,
            |state, _| state.add_to_collection(collection, resource),
            |_| Change::MembershipAdded {
                collection: EntityId::from(collection),
                resource: EntityId::from(resource),
            },
        )
    }

    /// Removes a membership edge.
    ///
    /// # Errors
    ///
    /// See [`FlatState::remove_from_collection`].
    pub fn remove_from_collection(&mut self, collection: &str, resource: &str) -> VaultResult<bool> {
        self.mutate(
            "remove_from_collection",
            resource,
            |state, _| state.remove_from_collection(collection, resource),
            |_| Change::MembershipRemoved {
                collection: EntityId::from(collection),
                resource: EntityId::from(resource),
            },
        )
    }

    /// Runs `op` against the state, then records the change and notifies
    /// listeners. Ops validate before writing, so a rejected op leaves the
    /// state as it was; it is logged and nothing is emitted.
    fn mutate<T>(
        &mut self,
        name: &'static str,
        id: &str,
        op: impl FnOnce(&mut FlatState, &VaultConfig) -> VaultResult<T>,
        describe: impl FnOnce(&T) -> Change,
    ) -> VaultResult<T> {
        match op(Arc::make_mut(&mut self.state), &self.config) {
            Ok(value) => {
                self.commit(describe(&value));
                Ok(value)
            }
            Err(err) => {
                self.rejected += 1;
                warn!(op = name, id = %id, error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    fn commit(&mut self, change: Change) {
        self.mutations += 1;
        self.feed.emit(change, &self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scenario_tree() -> Value {
        Value::from(json!({
            "id": "g1", "type": "Grouping",
            "items": [{
                "id": "r1", "type": "Record",
                "items": [{
                    "id": "p1", "type": "Page",
                    "items": [{
                        "id": "l1", "type": "AnnotationLayer",
                        "items": [{"id": "a1", "type": "Annotation"}]
                    }]
                }]
            }]
        }))
    }

    fn label(text: &str) -> Map {
        let mut map = Map::new();
        map.insert("label".into(), Value::from(text));
        map
    }

    #[test]
    fn scenario_load_and_export() {
        let mut vault = Vault::default();
        let report = vault.load(&scenario_tree());
        assert!(report.is_clean());
        assert_eq!(vault.state().len(), 5);
        assert_eq!(vault.export(), Some(scenario_tree()));
    }

    #[test]
    fn scenario_second_collection() {
        let mut vault = Vault::from_tree(&scenario_tree());
        vault
            .add(Entity::new("g2", EntityType::Grouping), None)
            .unwrap();
        vault.add_to_collection("g2", "r1").unwrap();
        assert_eq!(
            vault.get_collections_containing("r1"),
            &[EntityId::from("g1"), EntityId::from("g2")]
        );
        assert!(!vault.is_orphan("r1"));
    }

    #[test]
    fn scenario_trash_and_restore() {
        let mut vault = Vault::from_tree(&scenario_tree());
        vault.move_to_trash("p1").unwrap();
        for id in ["p1", "l1", "a1"] {
            assert!(vault.get(id).is_none());
        }
        let entry = vault.trash_entry("p1").unwrap();
        assert_eq!(entry.original_parent_id(), Some(&EntityId::from("r1")));
        assert_eq!(entry.child_ids, vec![EntityId::from("l1")]);

        vault
            .restore_from_trash("p1", RestoreOptions::default())
            .unwrap();
        assert_eq!(vault.get_parent("p1"), Some(&EntityId::from("r1")));
        assert_eq!(vault.get_children("p1"), &[EntityId::from("l1")]);
        assert_eq!(vault.export(), Some(scenario_tree()));
    }

    #[test]
    fn scenario_permanent_remove_of_root_record() {
        let tree = Value::from(json!({
            "id": "r1", "type": "Record",
            "items": [{"id": "p1", "type": "Page", "items": [{
                "id": "l1", "type": "AnnotationLayer", "items": [{"id": "a1", "type": "Annotation"}]
            }]}]
        }));
        let mut vault = Vault::from_tree(&tree);
        vault.remove("r1", RemoveOptions::permanent()).unwrap();
        for id in ["r1", "p1", "l1", "a1"] {
            assert!(vault.get(id).is_none());
        }
        assert!(vault.export().is_none());
    }

    #[test]
    fn scenario_update_missing_is_quiet() {
        let mut vault = Vault::from_tree(&scenario_tree());
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        vault.subscribe(move |_| *counter.borrow_mut() += 1);
        let before = vault.snapshot();

        let err = vault.update("nonexistent-id", &label("x")).unwrap_err();
        assert_eq!(err, VaultError::not_found("nonexistent-id"));
        assert_eq!(vault.snapshot(), before);
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(vault.stats().rejected, 1);
    }

    #[test]
    fn listeners_see_new_state_in_order() {
        let mut vault = Vault::from_tree(&scenario_tree());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        vault.subscribe(move |event| {
            let label = event
                .state
                .get_entity("r1")
                .and_then(|e| e.label().cloned());
            log.borrow_mut().push((event.sequence, label));
        });

        vault.update("r1", &label("one")).unwrap();
        vault.update("r1", &label("two")).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(1, Some(Value::from("one"))), (2, Some(Value::from("two")))]
        );
        assert_eq!(
            vault.poll_changes(0, 10)[0].change,
            Change::Updated {
                id: EntityId::from("r1")
            }
        );
    }

    #[test]
    fn snapshot_restore_is_pointer_swap() {
        let mut vault = Vault::from_tree(&scenario_tree());
        let before = vault.snapshot();
        vault.update("p1", &label("changed")).unwrap();
        assert!(before.state().get_entity("p1").unwrap().label().is_none());

        vault.restore(before.clone());
        assert!(vault.snapshot().ptr_eq(&before));
        assert!(vault.get("p1").unwrap().label().is_none());
        assert_eq!(
            vault.poll_changes(1, 10)[0].change,
            Change::SnapshotRestored
        );
    }

    #[test]
    fn reload_keeps_unrelated_trash() {
        let mut vault = Vault::from_tree(&scenario_tree());
        vault.move_to_trash("a1").unwrap();
        let exported = vault.export().unwrap();
        vault.reload(&exported);
        assert!(vault.is_trashed("a1"));

        vault.reload(&scenario_tree());
        assert!(!vault.is_trashed("a1"));
        assert!(vault.get("a1").is_some());
    }

    #[test]
    fn reload_resyncs_after_external_edit() {
        let mut vault = Vault::from_tree(&scenario_tree());
        let mut tree = vault.export().unwrap();
        tree.as_object_mut()
            .unwrap()
            .insert("label".into(), Value::from("edited"));
        vault.reload(&tree);
        assert_eq!(vault.get("g1").unwrap().label(), Some(&Value::from("edited")));
        assert_eq!(vault.get_entity_type("a1"), Some(EntityType::Annotation));
    }

    #[test]
    fn reset_notifies() {
        let mut vault = Vault::from_tree(&scenario_tree());
        vault.reset();
        assert!(vault.state().is_empty());
        assert_eq!(vault.poll_changes(0, 1)[0].change, Change::Reset);
    }

    #[test]
    fn empty_trash_through_vault() {
        let mut vault = Vault::from_tree(&scenario_tree());
        vault.move_to_trash("l1").unwrap();
        let report = vault.empty_trash();
        assert_eq!(report.count(), 1);
        assert!(vault.trashed_ids().is_empty());
        assert_eq!(vault.stats().mutations, 2);
    }

    #[test]
    fn history_follows_config() {
        let mut vault = Vault::new(VaultConfig::new().max_history(2));
        for _ in 0..4 {
            vault.reset();
        }
        assert_eq!(vault.poll_changes(0, 10).len(), 2);
        assert_eq!(vault.latest_sequence(), 4);
    }
}
