//! # Vault Core
//!
//! Normalized entity store for hierarchical presentation resources.
//!
//! This crate provides:
//! - Flat, O(1)-addressable storage of groupings, records, pages,
//!   substructures, annotation layers and annotations
//! - Separate ownership (tree) and membership (many-to-many) graphs
//! - Lossless normalize/denormalize between the nested tree and the flat state
//! - A trash that restores entities to their exact position and memberships
//! - Copy-on-write state with pointer-cheap snapshots for undo/redo
//! - Synchronous change notification and a pollable change history
//!
//! ## Usage
//!
//! ```
//! use vault_core::{RemoveOptions, RestoreOptions, Vault};
//! use vault_value::Value;
//!
//! let tree = Value::from_json_str(r#"{
//!     "id": "g1", "type": "Grouping",
//!     "items": [{"id": "r1", "type": "Record", "items": [{"id": "p1", "type": "Page"}]}]
//! }"#).unwrap();
//!
//! let mut vault = Vault::default();
//! vault.load(&tree);
//! assert_eq!(vault.get_parent("p1").map(|id| id.as_str()), Some("r1"));
//!
//! vault.remove("p1", RemoveOptions::default()).unwrap();
//! assert!(vault.get("p1").is_none());
//!
//! vault.restore_from_trash("p1", RestoreOptions::default()).unwrap();
//! assert_eq!(vault.export(), Some(tree));
//! ```
//!
//! The core performs no I/O and installs no tracing subscriber.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod denormalize;
mod entity;
mod error;
pub mod graph;
mod id;
mod normalize;
mod ops;
mod registry;
mod state;
mod stats;
mod trash;
mod undo;
mod vault;

pub use change_feed::{Change, ChangeEvent, ChangeFeed, ChangeRecord, Subscription};
pub use config::{OrphanRestorePolicy, VaultConfig};
pub use denormalize::{denormalize, denormalize_entity};
pub use entity::Entity;
pub use error::{VaultError, VaultResult};
pub use graph::{
    MemberPosition, MembershipEdge, MembershipGraph, MembershipPosition, ParentLink, ReferenceGraph,
};
pub use id::EntityId;
pub use normalize::{normalize, normalize_with_report, NormalizeReport, SkipReason, SkippedNode};
pub use ops::{EmptyTrashReport, PatchReport, RemoveOptions, RestoreOptions, RestoreOutcome};
pub use registry::{ChildSlot, EntityType, PropertyClass, Relation, TypeRegistry};
pub use state::{FlatState, Located};
pub use stats::VaultStats;
pub use trash::{TrashEntry, TrashRegistry, TrashedNode};
pub use undo::UndoHistory;
pub use vault::{Snapshot, Vault};
