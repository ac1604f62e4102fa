//! Membership graph.

use crate::id::EntityId;
use std::collections::HashMap;
use std::sync::Arc;

/// A grouping an entity belonged to, and where in its member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipPosition {
    /// The grouping.
    pub collection: EntityId,
    /// Position of the member in the grouping's list.
    pub index: usize,
    /// Position of the grouping among the member's groupings.
    pub rank: usize,
}

/// A member of a grouping, and where the grouping sits in its list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPosition {
    /// The member.
    pub resource: EntityId,
    /// Position of the grouping among the member's groupings.
    pub rank: usize,
}

/// One membership edge with its position on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEdge {
    /// The grouping.
    pub collection: EntityId,
    /// The member.
    pub resource: EntityId,
    /// Position in the grouping's member list.
    pub index: usize,
    /// Position in the member's grouping list.
    pub rank: usize,
}

/// Everything removed from the membership graph for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachedMemberships {
    /// Groupings the entity was a member of.
    pub memberships: Vec<MembershipPosition>,
    /// Members of the entity itself, when it was a grouping.
    pub members: Vec<EntityId>,
}

/// Grouping→members and member→groupings maps.
///
/// Membership is many-to-many and independent of ownership: removing an edge
/// never removes either entity.
///
/// # Invariants
///
/// - `m` is in `members(g)` iff `g` is in `containers(m)`.
/// - No list holds duplicates and no list is stored empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipGraph {
    members: Arc<HashMap<EntityId, Vec<EntityId>>>,
    containers: Arc<HashMap<EntityId, Vec<EntityId>>>,
}

impl MembershipGraph {
    /// Returns the ordered members of `collection`.
    pub fn members(&self, collection: &str) -> &[EntityId] {
        self.members.get(collection).map_or(&[], Vec::as_slice)
    }

    /// Returns the groupings `resource` belongs to, in the order it joined them.
    pub fn containers(&self, resource: &str) -> &[EntityId] {
        self.containers.get(resource).map_or(&[], Vec::as_slice)
    }

    /// Whether `resource` is a member of `collection`.
    pub fn contains(&self, collection: &str, resource: &str) -> bool {
        self.members(collection).iter().any(|m| m == resource)
    }

    /// Position of `resource` within `collection`.
    pub fn position(&self, collection: &str, resource: &str) -> Option<usize> {
        self.members(collection).iter().position(|m| m == resource)
    }

    /// Position of `collection` among the groupings `resource` belongs to.
    pub fn rank(&self, collection: &str, resource: &str) -> Option<usize> {
        self.containers(resource).iter().position(|c| c == collection)
    }

    /// Adds `resource` to `collection` at `index` (clamped) or at the end.
    ///
    /// Returns `false` when the edge already existed.
    pub fn add(&mut self, collection: EntityId, resource: EntityId, index: Option<usize>) -> bool {
        if self.contains(&collection, &resource) {
            return false;
        }
        let list = Arc::make_mut(&mut self.members)
            .entry(collection.clone())
            .or_default();
        let position = index.map_or(list.len(), |i| i.min(list.len()));
        list.insert(position, resource.clone());
        Arc::make_mut(&mut self.containers)
            .entry(resource)
            .or_default()
            .push(collection);
        true
    }

    /// Removes the edge between `collection` and `resource`.
    ///
    /// Returns the member position it had, or `None` if there was no edge.
    pub fn remove(&mut self, collection: &str, resource: &str) -> Option<usize> {
        let position = self.position(collection, resource)?;
        remove_from(Arc::make_mut(&mut self.members), collection, resource);
        remove_from(Arc::make_mut(&mut self.containers), resource, collection);
        Some(position)
    }

    /// Removes every edge touching `id`, on both sides.
    pub fn detach_node(&mut self, id: &str) -> DetachedMemberships {
        let mut detached = DetachedMemberships::default();

        let collections = self.containers(id).to_vec();
        for (rank, collection) in collections.into_iter().enumerate() {
            if let Some(index) = self.remove(&collection, id) {
                detached.memberships.push(MembershipPosition {
                    collection,
                    index,
                    rank,
                });
            }
        }

        let members = self.members(id).to_vec();
        for member in &members {
            self.remove(id, member);
        }
        detached.members = members;
        detached
    }

    /// Replaces the member list of `collection`, keeping both sides in step.
    ///
    /// Ids in `order` that are not current members are dropped; current
    /// members missing from `order` keep their relative order at the end.
    /// Returns `true` when `order` was an exact permutation.
    pub fn reorder(&mut self, collection: EntityId, order: &[EntityId]) -> bool {
        let current = self.members(&collection).to_vec();
        let mut next: Vec<EntityId> = Vec::with_capacity(current.len());
        for id in order {
            if current.contains(id) && !next.contains(id) {
                next.push(id.clone());
            }
        }
        let exact = next.len() == current.len() && order.len() == current.len();
        for id in &current {
            if !next.contains(id) {
                next.push(id.clone());
            }
        }
        if !next.is_empty() {
            Arc::make_mut(&mut self.members).insert(collection, next);
        }
        exact
    }

    /// Puts edges back at their recorded positions on both sides.
    ///
    /// Each touched list receives its new entries in ascending position
    /// order, so entries removed together come back where they were.
    /// Existing edges are left alone.
    pub fn restore_edges(&mut self, edges: impl IntoIterator<Item = MembershipEdge>) {
        let mut by_collection: HashMap<EntityId, Vec<(usize, EntityId)>> = HashMap::new();
        let mut by_resource: HashMap<EntityId, Vec<(usize, EntityId)>> = HashMap::new();
        for edge in edges {
            let pending = by_collection
                .get(&edge.collection)
                .is_some_and(|list| list.iter().any(|(_, r)| *r == edge.resource));
            if pending || self.contains(&edge.collection, &edge.resource) {
                continue;
            }
            by_collection
                .entry(edge.collection.clone())
                .or_default()
                .push((edge.index, edge.resource.clone()));
            by_resource
                .entry(edge.resource)
                .or_default()
                .push((edge.rank, edge.collection));
        }
        if by_collection.is_empty() {
            return;
        }
        insert_sorted(Arc::make_mut(&mut self.members), by_collection);
        insert_sorted(Arc::make_mut(&mut self.containers), by_resource);
    }

    /// Number of membership edges.
    pub fn edge_count(&self) -> usize {
        self.members.values().map(Vec::len).sum()
    }

    /// Iterates over every `(collection, members)` pair.
    pub fn member_lists(&self) -> impl Iterator<Item = (&EntityId, &[EntityId])> {
        self.members.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Iterates over every `(resource, collections)` pair.
    pub fn container_lists(&self) -> impl Iterator<Item = (&EntityId, &[EntityId])> {
        self.containers.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Moves every edge of `other` into this graph.
    pub(crate) fn absorb(&mut self, other: MembershipGraph) {
        for (collection, members) in Arc::unwrap_or_clone(other.members) {
            for member in members {
                self.add(collection.clone(), member, None);
            }
        }
    }
}

fn insert_sorted(
    map: &mut HashMap<EntityId, Vec<EntityId>>,
    pending: HashMap<EntityId, Vec<(usize, EntityId)>>,
) {
    for (key, mut entries) in pending {
        entries.sort_by_key(|(position, _)| *position);
        let list = map.entry(key).or_default();
        for (position, value) in entries {
            let at = position.min(list.len());
            list.insert(at, value);
        }
    }
}

fn remove_from(map: &mut HashMap<EntityId, Vec<EntityId>>, key: &str, value: &str) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|v| v != value);
        if list.is_empty() {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn add_is_symmetric_and_idempotent() {
        let mut graph = MembershipGraph::default();
        assert!(graph.add(id("g1"), id("r1"), None));
        assert!(!graph.add(id("g1"), id("r1"), None));
        assert!(graph.add(id("g2"), id("r1"), None));

        assert_eq!(graph.members("g1"), &[id("r1")]);
        assert_eq!(graph.containers("r1"), &[id("g1"), id("g2")]);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn add_at_index() {
        let mut graph = MembershipGraph::default();
        graph.add(id("g1"), id("r1"), None);
        graph.add(id("g1"), id("r2"), None);
        graph.add(id("g1"), id("r0"), Some(0));
        assert_eq!(graph.members("g1"), &[id("r0"), id("r1"), id("r2")]);
    }

    #[test]
    fn remove_clears_both_sides() {
        let mut graph = MembershipGraph::default();
        graph.add(id("g1"), id("r1"), None);
        graph.add(id("g1"), id("r2"), None);

        assert_eq!(graph.remove("g1", "r2"), Some(1));
        assert_eq!(graph.remove("g1", "r2"), None);
        assert!(graph.containers("r2").is_empty());
        assert_eq!(graph.members("g1"), &[id("r1")]);
    }

    #[test]
    fn detach_node_reports_positions_and_members() {
        let mut graph = MembershipGraph::default();
        graph.add(id("g1"), id("r0"), None);
        graph.add(id("g1"), id("g2"), None);
        graph.add(id("g2"), id("r1"), None);
        graph.add(id("g2"), id("r2"), None);

        let detached = graph.detach_node("g2");
        assert_eq!(
            detached.memberships,
            vec![MembershipPosition {
                collection: id("g1"),
                index: 1,
                rank: 0,
            }]
        );
        assert_eq!(detached.members, vec![id("r1"), id("r2")]);
        assert!(graph.containers("r1").is_empty());
        assert_eq!(graph.members("g1"), &[id("r0")]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn restore_edges_puts_both_sides_back() {
        let mut graph = MembershipGraph::default();
        for (collection, resource) in [("g1", "r1"), ("g1", "r2"), ("g2", "r2"), ("g3", "r2"), ("g3", "r1")] {
            graph.add(id(collection), id(resource), None);
        }
        let before = graph.clone();

        let edges: Vec<MembershipEdge> = ["g3", "g1"]
            .into_iter()
            .map(|collection| MembershipEdge {
                collection: id(collection),
                resource: id("r2"),
                index: graph.position(collection, "r2").unwrap(),
                rank: graph.rank(collection, "r2").unwrap(),
            })
            .collect();
        graph.remove("g1", "r2");
        graph.remove("g3", "r2");
        assert_eq!(graph.containers("r2"), &[id("g2")]);

        graph.restore_edges(edges.clone());
        assert_eq!(graph, before);
        assert_eq!(graph.containers("r2"), &[id("g1"), id("g2"), id("g3")]);

        graph.restore_edges(edges);
        assert_eq!(graph, before);
    }

    #[test]
    fn reorder_keeps_permutation() {
        let mut graph = MembershipGraph::default();
        for r in ["r1", "r2", "r3"] {
            graph.add(id("g1"), id(r), None);
        }

        assert!(graph.reorder(id("g1"), &[id("r3"), id("r1"), id("r2")]));
        assert_eq!(graph.members("g1"), &[id("r3"), id("r1"), id("r2")]);

        assert!(!graph.reorder(id("g1"), &[id("r2"), id("x9")]));
        assert_eq!(graph.members("g1"), &[id("r2"), id("r3"), id("r1")]);
        assert!(graph.containers("x9").is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sides_stay_symmetric(ops in prop::collection::vec((any::<bool>(), 0u8..3, 0u8..5), 0..60)) {
                let mut graph = MembershipGraph::default();
                for (add, g, r) in ops {
                    let (g, r) = (id(&format!("g{g}")), id(&format!("r{r}")));
                    if add {
                        graph.add(g, r, None);
                    } else {
                        graph.remove(&g, &r);
                    }
                }
                for (collection, members) in graph.member_lists() {
                    prop_assert!(!members.is_empty());
                    for member in members {
                        prop_assert!(graph.containers(member).contains(collection));
                    }
                }
                for (resource, collections) in graph.container_lists() {
                    for collection in collections {
                        prop_assert!(graph.contains(collection, resource));
                    }
                }
            }
        }
    }
}
