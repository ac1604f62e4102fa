//! Error types for vault operations.

use crate::id::EntityId;
use crate::registry::EntityType;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur in vault operations.
///
/// Every variant is recoverable: an operation that returns an error has left
/// the flat state exactly as it found it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Entity is not present in the active state.
    #[error("entity not found: {id}")]
    EntityNotFound {
        /// The id that was looked up.
        id: EntityId,
    },

    /// Target parent is not present in the active state.
    #[error("parent not found: {id}")]
    ParentNotFound {
        /// The parent id that was looked up.
        id: EntityId,
    },

    /// Id is already used by an active or trashed entity.
    #[error("entity already exists: {id}")]
    AlreadyExists {
        /// The conflicting id.
        id: EntityId,
    },

    /// Entity has no trash entry.
    #[error("entity is not in the trash: {id}")]
    NotTrashed {
        /// The id that was looked up.
        id: EntityId,
    },

    /// Type index lost track of an entity that still sits in a bucket.
    #[error("type index drift for entity {id} ({kind})")]
    IndexDrift {
        /// The drifted id.
        id: EntityId,
        /// The bucket the entity was found in.
        kind: EntityType,
    },

    /// Parent type cannot hold the child type.
    #[error("{parent_type} {parent} cannot hold a {child_type}")]
    InvalidChild {
        /// The parent id.
        parent: EntityId,
        /// The parent's type.
        parent_type: EntityType,
        /// The rejected child type.
        child_type: EntityType,
    },

    /// Entity is not a grouping and has no member list.
    #[error("entity is not a grouping: {id} ({kind})")]
    NotACollection {
        /// The id that was used as a collection.
        id: EntityId,
        /// Its actual type.
        kind: EntityType,
    },

    /// Move would place an entity beneath itself.
    #[error("moving {id} under {parent} would create a cycle")]
    CycleDetected {
        /// The entity being moved.
        id: EntityId,
        /// The requested parent.
        parent: EntityId,
    },

    /// Tree could not be turned into any entity.
    #[error("invalid tree: {message}")]
    InvalidTree {
        /// Description of the problem.
        message: String,
    },
}

impl VaultError {
    /// Creates an entity not found error.
    pub fn not_found(id: impl Into<EntityId>) -> Self {
        Self::EntityNotFound { id: id.into() }
    }

    /// Creates a parent not found error.
    pub fn parent_not_found(id: impl Into<EntityId>) -> Self {
        Self::ParentNotFound { id: id.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(id: impl Into<EntityId>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates a not trashed error.
    pub fn not_trashed(id: impl Into<EntityId>) -> Self {
        Self::NotTrashed { id: id.into() }
    }

    /// Creates an invalid tree error.
    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::InvalidTree {
            message: message.into(),
        }
    }

    /// Returns the id the error is about, when there is one.
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::EntityNotFound { id }
            | Self::ParentNotFound { id }
            | Self::AlreadyExists { id }
            | Self::NotTrashed { id }
            | Self::IndexDrift { id, .. }
            | Self::NotACollection { id, .. }
            | Self::CycleDetected { id, .. } => Some(id),
            Self::InvalidChild { parent, .. } => Some(parent),
            Self::InvalidTree { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_id() {
        let err = VaultError::not_found("https://example.org/page/1");
        assert_eq!(
            err.to_string(),
            "entity not found: https://example.org/page/1"
        );
    }

    #[test]
    fn invalid_child_display() {
        let err = VaultError::InvalidChild {
            parent: EntityId::from("p1"),
            parent_type: EntityType::Page,
            child_type: EntityType::Record,
        };
        assert_eq!(err.to_string(), "Page p1 cannot hold a Record");
        assert_eq!(err.entity_id().map(EntityId::as_str), Some("p1"));
    }
}
