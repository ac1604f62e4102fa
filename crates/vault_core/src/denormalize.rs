//! Flat state back to a nested tree.

use crate::entity::Entity;
use crate::id::EntityId;
use crate::registry::{ChildSlot, Relation, TypeRegistry};
use crate::state::FlatState;
use std::collections::HashSet;
use vault_value::{Map, Value};

/// Rebuilds the nested tree from the root. Returns `None` when no root is set.
pub fn denormalize(state: &FlatState) -> Option<Value> {
    let root = state.root()?;
    denormalize_entity(state, root)
}

/// Rebuilds the subtree of any active entity.
///
/// A grouping reachable from itself through membership is emitted as an
/// `{id, type}` stub on the second visit.
pub fn denormalize_entity(state: &FlatState, id: &str) -> Option<Value> {
    let mut builder = Builder {
        state,
        visiting: HashSet::new(),
    };
    builder.emit(id)
}

struct Builder<'a> {
    state: &'a FlatState,
    visiting: HashSet<&'a str>,
}

impl<'a> Builder<'a> {
    fn emit(&mut self, id: &str) -> Option<Value> {
        let state = self.state;
        let entity: &'a Entity = state.entity_handle(id)?;
        let id: &'a str = entity.id.as_str();

        let mut node = Map::with_capacity(2 + entity.properties.len() + entity.extensions.len());
        node.insert("id".into(), Value::from(id));
        node.insert("type".into(), Value::from(entity.kind.as_str()));

        if !self.visiting.insert(id) {
            return Some(Value::Object(node));
        }

        for (key, value) in &entity.properties {
            match TypeRegistry::child_slot(entity.kind, key) {
                Some(slot) => {
                    let children = self.children(id, slot);
                    node.insert(key.clone(), Value::Array(children));
                }
                None => {
                    node.insert(key.clone(), value.clone());
                }
            }
        }
        for slot in TypeRegistry::child_slots(entity.kind) {
            if entity.properties.contains_key(slot.property) {
                continue;
            }
            let children = self.children(id, slot);
            if !children.is_empty() {
                node.insert(slot.property.to_string(), Value::Array(children));
            }
        }
        for (key, value) in &entity.extensions {
            node.insert(key.clone(), value.clone());
        }

        self.visiting.remove(id);
        Some(Value::Object(node))
    }

    fn children(&mut self, id: &'a str, slot: &ChildSlot) -> Vec<Value> {
        let state = self.state;
        let ids: Vec<&'a EntityId> = match slot.relation {
            Relation::Membership => state.get_collection_members(id).iter().collect(),
            Relation::Ownership => state.references().children_in_slot(id, slot.property).collect(),
        };
        ids.into_iter().filter_map(|child| self.emit(child)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn empty_state_has_no_tree() {
        assert!(denormalize(&FlatState::new()).is_none());
    }

    #[test]
    fn round_trip_preserves_shape() {
        let input = Value::from(json!({
            "@context": "http://example.org/context.json",
            "id": "g1", "type": "Grouping",
            "label": {"en": ["Letters"]},
            "items": [{
                "id": "r1", "type": "Record",
                "x-viewer": {"mode": "book"},
                "items": [{
                    "id": "p1", "type": "Page", "height": 10, "width": 20,
                    "items": [{"id": "l1", "type": "AnnotationLayer", "items": [
                        {"id": "a1", "type": "Annotation", "motivation": "painting"},
                        {"id": "a2", "type": "Annotation"}
                    ]}],
                    "annotations": [{"id": "l2", "type": "AnnotationLayer"}]
                }],
                "structures": [{"id": "s1", "type": "Substructure",
                    "items": [{"id": "s2", "type": "Substructure"}]}]
            }]
        }));

        let state = normalize(&input);
        assert_eq!(denormalize(&state), Some(input));
    }

    #[test]
    fn subtree_export() {
        let input = Value::from(json!({
            "id": "r1", "type": "Record",
            "items": [{"id": "p1", "type": "Page", "items": []}]
        }));
        let state = normalize(&input);
        let page = denormalize_entity(&state, "p1").unwrap();
        assert_eq!(page, Value::from(json!({"id": "p1", "type": "Page", "items": []})));
        assert!(denormalize_entity(&state, "nope").is_none());
    }

    #[test]
    fn membership_cycle_is_cut() {
        let input = Value::from(json!({
            "id": "g1", "type": "Grouping",
            "items": [{"id": "g2", "type": "Grouping", "items": [{"id": "g1", "type": "Grouping"}]}]
        }));
        let state = normalize(&input);
        assert_eq!(state.get_collections_containing("g1"), &[EntityId::from("g2")]);

        let out = denormalize(&state).unwrap();
        assert_eq!(
            out,
            Value::from(json!({
                "id": "g1", "type": "Grouping",
                "items": [{"id": "g2", "type": "Grouping", "items": [{"id": "g1", "type": "Grouping"}]}]
            }))
        );
    }

    #[test]
    fn added_children_appear_without_placeholder() {
        let mut state = normalize(&Value::from(json!({"id": "r1", "type": "Record"})));
        state.references.attach(EntityId::from("r1"), EntityId::from("p1"), "items", None);
        state.insert_entity(std::sync::Arc::new(Entity::new(
            "p1",
            crate::registry::EntityType::Page,
        )));

        let out = denormalize(&state).unwrap();
        assert_eq!(
            out,
            Value::from(json!({"id": "r1", "type": "Record", "items": [{"id": "p1", "type": "Page"}]}))
        );
    }
}
