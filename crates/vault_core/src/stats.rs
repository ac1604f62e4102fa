//! Vault statistics.
//!
//! # Usage
//!
//! ```rust
//! use vault_core::{EntityType, Vault};
//! use vault_value::Value;
//!
//! let tree = Value::from_json_str(r#"{"id": "r1", "type": "Record"}"#).unwrap();
//! let vault = Vault::from_tree(&tree);
//!
//! let stats = vault.stats();
//! assert_eq!(stats.count(EntityType::Record), 1);
//! assert_eq!(stats.orphans, 1);
//! ```

use crate::registry::EntityType;
use crate::state::FlatState;

/// A point-in-time summary of a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultStats {
    /// Active entities per type, in `EntityType::ALL` order.
    pub per_type: [usize; 6],
    /// Trash entries.
    pub trash_entries: usize,
    /// Entities held by trash entries, descendants included.
    pub trashed_entities: usize,
    /// Records and groupings with no membership.
    pub orphans: usize,
    /// Ownership edges.
    pub ownership_edges: usize,
    /// Membership edges.
    pub membership_edges: usize,
    /// Mutations applied since the vault was created.
    pub mutations: u64,
    /// Mutations rejected since the vault was created.
    pub rejected: u64,
}

impl VaultStats {
    /// Collects the structural counts of `state`. Operation counters are zero.
    pub fn collect(state: &FlatState) -> Self {
        let mut per_type = [0; 6];
        for kind in EntityType::ALL {
            per_type[kind.index()] = state.count_of_type(kind);
        }
        let orphans = [EntityType::Grouping, EntityType::Record]
            .into_iter()
            .flat_map(|kind| state.entities_of_type(kind))
            .filter(|entity| state.get_collections_containing(&entity.id).is_empty())
            .count();
        Self {
            per_type,
            trash_entries: state.trash().len(),
            trashed_entities: state.trash().iter().map(|entry| entry.len()).sum(),
            orphans,
            ownership_edges: state.references().edge_count(),
            membership_edges: state.memberships().edge_count(),
            mutations: 0,
            rejected: 0,
        }
    }

    /// Active entities of one type.
    pub fn count(&self, kind: EntityType) -> usize {
        self.per_type[kind.index()]
    }

    /// Active entities of every type.
    pub fn total(&self) -> usize {
        self.per_type.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;
    use vault_value::Value;

    #[test]
    fn empty_state_is_zero() {
        assert_eq!(VaultStats::collect(&FlatState::new()), VaultStats::default());
    }

    #[test]
    fn counts_structure() {
        let mut state = normalize(&Value::from(json!({
            "id": "g1", "type": "Grouping",
            "items": [
                {"id": "r1", "type": "Record", "items": [
                    {"id": "p1", "type": "Page", "items": [{"id": "l1", "type": "AnnotationLayer"}]}
                ]},
                {"id": "r2", "type": "Record"}
            ]
        })));
        state.move_entity_to_trash("p1").unwrap();

        let stats = VaultStats::collect(&state);
        assert_eq!(stats.count(EntityType::Record), 2);
        assert_eq!(stats.count(EntityType::Page), 0);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.trash_entries, 1);
        assert_eq!(stats.trashed_entities, 2);
        assert_eq!(stats.orphans, 1);
        assert_eq!(stats.ownership_edges, 0);
        assert_eq!(stats.membership_edges, 2);
    }
}
