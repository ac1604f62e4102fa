//! Static knowledge about entity types and their tree properties.
//!
//! The registry answers three questions for the normalizer, the denormalizer
//! and the mutation API:
//! - which wire `type` names exist,
//! - which properties of a type are recognized (everything else is preserved
//!   verbatim as an extension),
//! - which properties hold children, what they accept, and whether holding
//!   them means ownership or membership.

use std::fmt;

/// The closed set of entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    /// Container aggregating records and other groupings by reference.
    Grouping,
    /// Described resource composed of ordered pages.
    Record,
    /// Renderable unit within a record.
    Page,
    /// Named logical section of a record used for navigation.
    Substructure,
    /// Ordered list of annotations attached to a page.
    AnnotationLayer,
    /// Single annotation.
    Annotation,
}

impl EntityType {
    /// Every entity type, in bucket order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Grouping,
        EntityType::Record,
        EntityType::Page,
        EntityType::Substructure,
        EntityType::AnnotationLayer,
        EntityType::Annotation,
    ];

    /// Returns the bucket index of this type.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            EntityType::Grouping => 0,
            EntityType::Record => 1,
            EntityType::Page => 2,
            EntityType::Substructure => 3,
            EntityType::AnnotationLayer => 4,
            EntityType::Annotation => 5,
        }
    }

    /// Returns the wire name used in the `type` property.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Grouping => "Grouping",
            EntityType::Record => "Record",
            EntityType::Page => "Page",
            EntityType::Substructure => "Substructure",
            EntityType::AnnotationLayer => "AnnotationLayer",
            EntityType::Annotation => "Annotation",
        }
    }

    /// Parses a wire name. Returns `None` for anything outside the closed set.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Whether entities of this type can be members of a grouping.
    #[must_use]
    pub const fn is_collectable(self) -> bool {
        matches!(self, EntityType::Grouping | EntityType::Record)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a parent relates to the children listed under a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Exclusive containment; deleting the parent cascades.
    Ownership,
    /// Non-exclusive reference; the child lives independently.
    Membership,
}

/// A property that holds child entities.
#[derive(Debug, PartialEq, Eq)]
pub struct ChildSlot {
    /// Property name in the nested tree.
    pub property: &'static str,
    /// Child types the property may hold.
    pub accepts: &'static [EntityType],
    /// Relation between the parent and the listed children.
    pub relation: Relation,
}

impl ChildSlot {
    /// Whether this slot may hold a child of `kind`.
    #[must_use]
    pub fn accepts(&self, kind: EntityType) -> bool {
        self.accepts.contains(&kind)
    }
}

/// Classification of a single property of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyClass {
    /// `id` or `type`; held by the entity itself.
    Identity,
    /// Holds children.
    Children(&'static ChildSlot),
    /// Recognized property kept in the property bag.
    Known,
    /// Anything else; preserved verbatim in the extensions bag.
    Extension,
}

const COMMON_PROPERTIES: &[&str] = &[
    "@context",
    "label",
    "summary",
    "metadata",
    "requiredStatement",
    "rights",
    "navDate",
    "navPlace",
    "language",
    "provider",
    "thumbnail",
    "placeholderContainer",
    "accompanyingContainer",
    "behavior",
    "homepage",
    "logo",
    "rendering",
    "seeAlso",
    "service",
    "partOf",
];

const GROUPING_PROPERTIES: &[&str] = &["viewingDirection", "services"];
const RECORD_PROPERTIES: &[&str] = &["viewingDirection", "start", "services"];
const PAGE_PROPERTIES: &[&str] = &["height", "width", "duration"];
const SUBSTRUCTURE_PROPERTIES: &[&str] = &["viewingDirection", "start", "supplementary"];
const LAYER_PROPERTIES: &[&str] = &["first", "last", "next", "prev", "total", "startIndex"];
const ANNOTATION_PROPERTIES: &[&str] = &["motivation", "body", "target", "timeMode", "stylesheet"];

const GROUPING_SLOTS: &[ChildSlot] = &[ChildSlot {
    property: "items",
    accepts: &[EntityType::Grouping, EntityType::Record],
    relation: Relation::Membership,
}];

const RECORD_SLOTS: &[ChildSlot] = &[
    ChildSlot {
        property: "items",
        accepts: &[EntityType::Page],
        relation: Relation::Ownership,
    },
    ChildSlot {
        property: "structures",
        accepts: &[EntityType::Substructure],
        relation: Relation::Ownership,
    },
];

const PAGE_SLOTS: &[ChildSlot] = &[
    ChildSlot {
        property: "items",
        accepts: &[EntityType::AnnotationLayer],
        relation: Relation::Ownership,
    },
    ChildSlot {
        property: "annotations",
        accepts: &[EntityType::AnnotationLayer],
        relation: Relation::Ownership,
    },
];

const SUBSTRUCTURE_SLOTS: &[ChildSlot] = &[ChildSlot {
    property: "items",
    accepts: &[EntityType::Substructure],
    relation: Relation::Ownership,
}];

const LAYER_SLOTS: &[ChildSlot] = &[ChildSlot {
    property: "items",
    accepts: &[EntityType::Annotation],
    relation: Relation::Ownership,
}];

/// Static type registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeRegistry;

impl TypeRegistry {
    /// Returns the child-holding properties of `kind`, in emission order.
    #[must_use]
    pub const fn child_slots(kind: EntityType) -> &'static [ChildSlot] {
        match kind {
            EntityType::Grouping => GROUPING_SLOTS,
            EntityType::Record => RECORD_SLOTS,
            EntityType::Page => PAGE_SLOTS,
            EntityType::Substructure => SUBSTRUCTURE_SLOTS,
            EntityType::AnnotationLayer => LAYER_SLOTS,
            EntityType::Annotation => &[],
        }
    }

    /// Returns the type-specific recognized properties of `kind`.
    ///
    /// Properties common to every type are not included.
    #[must_use]
    pub const fn own_properties(kind: EntityType) -> &'static [&'static str] {
        match kind {
            EntityType::Grouping => GROUPING_PROPERTIES,
            EntityType::Record => RECORD_PROPERTIES,
            EntityType::Page => PAGE_PROPERTIES,
            EntityType::Substructure => SUBSTRUCTURE_PROPERTIES,
            EntityType::AnnotationLayer => LAYER_PROPERTIES,
            EntityType::Annotation => ANNOTATION_PROPERTIES,
        }
    }

    /// Looks up the slot stored under `property` for `kind`.
    #[must_use]
    pub fn child_slot(kind: EntityType, property: &str) -> Option<&'static ChildSlot> {
        Self::child_slots(kind)
            .iter()
            .find(|slot| slot.property == property)
    }

    /// Returns the first slot of `parent` that accepts `child`.
    #[must_use]
    pub fn default_slot(parent: EntityType, child: EntityType) -> Option<&'static ChildSlot> {
        Self::child_slots(parent)
            .iter()
            .find(|slot| slot.accepts(child))
    }

    /// Whether `key` is a recognized non-child property of `kind`.
    #[must_use]
    pub fn is_known(kind: EntityType, key: &str) -> bool {
        COMMON_PROPERTIES.contains(&key) || Self::own_properties(kind).contains(&key)
    }

    /// Classifies a property of a `kind` node.
    #[must_use]
    pub fn classify(kind: EntityType, key: &str) -> PropertyClass {
        if key == "id" || key == "type" {
            return PropertyClass::Identity;
        }
        if let Some(slot) = Self::child_slot(kind, key) {
            return PropertyClass::Children(slot);
        }
        if Self::is_known(kind, key) {
            PropertyClass::Known
        } else {
            PropertyClass::Extension
        }
    }
}
