///
/// EntityFieldModel
/// Runtime field metadata used by predicate resolution and validation.
///

#[derive(Debug)]
pub struct EntityFieldModel {
    /// Field name as used in predicates, sorts, and row data.
    pub name: &'static str,
    /// Runtime type shape.
    pub kind: EntityFieldKind,
}

///
/// EntityFieldKind
///
/// Minimal type surface needed by the resolver. This is a lossy
/// projection of the entity's Rust field types onto `Value` families.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityFieldKind {
    Bool,
    Int,
    Uint,
    Text,
    Timestamp,
    List,

    /// Marker for fields that are not filterable or sortable.
    Unsupported,
}

impl EntityFieldKind {
    /// Whether predicates and sort keys may target this field.
    #[must_use]
    pub const fn is_queryable(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}
