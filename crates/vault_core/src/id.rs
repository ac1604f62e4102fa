//! Entity identifier.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for an entity.
///
/// Entity IDs are opaque strings (usually URIs) that are:
/// - Globally unique within a vault, across all types
/// - Stable for the entity's whole lifetime, including while trashed
/// - Cheap to clone, since every map and edge list holds copies
///
/// `EntityId` borrows as `str`, so maps keyed by it can be queried with a
/// plain `&str`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Creates an entity ID from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    /// Mints a fresh id below `prefix`, e.g. `https://example.org/page/<uuid>`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            Self::new(&Uuid::new_v4().to_string())
        } else {
            Self::new(&format!("{prefix}/{}", Uuid::new_v4()))
        }
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for EntityId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&String> for EntityId {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn generate_is_unique() {
        let id1 = EntityId::generate("https://example.org/page");
        let id2 = EntityId::generate("https://example.org/page");
        assert_ne!(id1, id2);
        assert!(id1.starts_with("https://example.org/page/"));
    }

    #[test]
    fn generate_trims_trailing_slash() {
        let id = EntityId::generate("urn:test/");
        assert!(id.starts_with("urn:test/"));
        assert!(!id.contains("//"));
        assert!(!EntityId::generate("").contains('/'));
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(EntityId::from("r1"), 7);
        assert_eq!(map.get("r1"), Some(&7));
    }

    #[test]
    fn clones_share_storage() {
        let id = EntityId::from("g1");
        let copy = id.clone();
        assert!(Arc::ptr_eq(&id.0, &copy.0));
        assert_eq!(copy, "g1");
    }

    #[test]
    fn display() {
        let id = EntityId::from("https://example.org/record/1");
        assert_eq!(format!("{id}"), "https://example.org/record/1");
        assert_eq!(format!("{id:?}"), "EntityId(https://example.org/record/1)");
    }
}
