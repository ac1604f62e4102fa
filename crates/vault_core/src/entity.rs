//! Flat entity records.

use crate::error::{VaultError, VaultResult};
use crate::id::EntityId;
use crate::registry::{EntityType, PropertyClass, TypeRegistry};
use vault_value::{Map, Value};

/// One addressable resource held flat in the vault.
///
/// Child-holding properties are stored as empty placeholder arrays; the
/// children themselves live in the ownership and membership graphs and are
/// spliced back in by the denormalizer. `id` and `type` are held by the
/// struct fields and never appear in either bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Globally unique id.
    pub id: EntityId,
    /// Entity type.
    pub kind: EntityType,
    /// Recognized properties, in input order.
    pub properties: Map,
    /// Unrecognized properties, preserved verbatim.
    pub extensions: Map,
}

impl Entity {
    /// Creates an entity with empty bags.
    pub fn new(id: impl Into<EntityId>, kind: EntityType) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: Map::new(),
            extensions: Map::new(),
        }
    }

    /// Sets one property, routing it to the right bag.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.absorb(key.into(), value.into());
        self
    }

    /// Builds a single entity from one tree node.
    ///
    /// Child properties are reduced to placeholders and their contents are
    /// dropped; use `Vault::add_tree` to insert a node together with its
    /// children.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTree` when the node is not an object or lacks a
    /// recognized `type` or a string `id`.
    pub fn from_node(node: &Value) -> VaultResult<Self> {
        let object = node
            .as_object()
            .ok_or_else(|| VaultError::invalid_tree(format!("expected object, got {}", node.type_name())))?;
        let kind = object
            .get("type")
            .and_then(Value::as_text)
            .and_then(EntityType::from_wire)
            .ok_or_else(|| VaultError::invalid_tree("node has no recognized type"))?;
        let id = object
            .get("id")
            .and_then(Value::as_text)
            .ok_or_else(|| VaultError::invalid_tree("node has no string id"))?;

        let mut entity = Self::new(id, kind);
        for (key, value) in object {
            entity.absorb(key.clone(), value.clone());
        }
        Ok(entity)
    }

    /// Looks up a property in either bag.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .get(key)
            .or_else(|| self.extensions.get(key))
    }

    /// Returns the `label` property, if set.
    pub fn label(&self) -> Option<&Value> {
        self.properties.get("label")
    }

    /// Merges a partial update. Returns the keys that were ignored.
    ///
    /// Known keys overwrite the property bag. Unknown keys overwrite the
    /// extensions bag, where `null` deletes the key. Identity and child
    /// properties are never patched.
    pub fn merge(&mut self, patch: &Map) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in patch {
            match TypeRegistry::classify(self.kind, key) {
                PropertyClass::Identity | PropertyClass::Children(_) => ignored.push(key.clone()),
                PropertyClass::Known => {
                    self.properties.insert(key.clone(), value.clone());
                }
                PropertyClass::Extension => {
                    if value.is_null() {
                        self.extensions.shift_remove(key);
                    } else {
                        self.extensions.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        ignored
    }

    /// Routes one property of a tree node into the right bag.
    ///
    /// Null extension values are dropped.
    pub(crate) fn absorb(&mut self, key: String, value: Value) {
        match TypeRegistry::classify(self.kind, &key) {
            PropertyClass::Identity => {}
            PropertyClass::Children(_) => {
                self.properties.insert(key, Value::empty_array());
            }
            PropertyClass::Known => {
                self.properties.insert(key, value);
            }
            PropertyClass::Extension => {
                if !value.is_null() {
                    self.extensions.insert(key, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_node_splits_bags() {
        let node = Value::from(json!({
            "id": "https://example.org/canvas/1",
            "type": "Page",
            "label": {"none": ["1r"]},
            "width": 1200,
            "items": [{"id": "l1", "type": "AnnotationLayer"}],
            "x-viewer": {"zoom": 2},
            "x-empty": null
        }));

        let entity = Entity::from_node(&node).unwrap();
        assert_eq!(entity.id, "https://example.org/canvas/1");
        assert_eq!(entity.kind, EntityType::Page);
        assert_eq!(entity.properties.get("width"), Some(&Value::Integer(1200)));
        assert_eq!(entity.properties.get("items"), Some(&Value::empty_array()));
        assert!(entity.properties.get("id").is_none());
        assert_eq!(
            entity.extensions.get("x-viewer"),
            Some(&Value::from(json!({"zoom": 2})))
        );
        assert!(!entity.extensions.contains_key("x-empty"));
    }

    #[test]
    fn from_node_rejects_unknown_type() {
        let node = Value::from(json!({"id": "m1", "type": "Manifest"}));
        assert!(matches!(
            Entity::from_node(&node),
            Err(VaultError::InvalidTree { .. })
        ));
        let node = Value::from(json!({"type": "Page"}));
        assert!(Entity::from_node(&node).is_err());
    }

    #[test]
    fn merge_routes_keys() {
        let mut entity = Entity::new("r1", EntityType::Record)
            .with_property("label", "Old")
            .with_property("x-tool", "keep");

        let patch = Value::from(json!({
            "label": "New",
            "id": "other",
            "items": [],
            "x-tool": null,
            "x-added": 3
        }));
        let ignored = entity.merge(patch.as_object().unwrap());

        assert_eq!(ignored, vec!["id".to_string(), "items".to_string()]);
        assert_eq!(entity.id, "r1");
        assert_eq!(entity.label(), Some(&Value::from("New")));
        assert!(!entity.extensions.contains_key("x-tool"));
        assert_eq!(entity.property("x-added"), Some(&Value::Integer(3)));
    }

    #[test]
    fn known_null_is_kept() {
        let entity = Entity::new("p1", EntityType::Page).with_property("navDate", Value::Null);
        assert_eq!(entity.properties.get("navDate"), Some(&Value::Null));
    }
}
