//! Relationship graphs.
//!
//! Ownership and membership are tracked separately: ownership is a tree used
//! for nesting and cascading deletes, membership is a many-to-many reference
//! that never implies lifecycle.

mod membership;
mod reference;

pub use membership::{
    DetachedMemberships, MemberPosition, MembershipEdge, MembershipGraph, MembershipPosition,
};
pub use reference::{ParentLink, ReferenceGraph};
