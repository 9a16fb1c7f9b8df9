///
/// RelationModel
/// One navigable association declared on an entity.
///

#[derive(Debug)]
pub struct RelationModel {
    /// Relation name as used in predicates, fetch plans, and navigation.
    pub name: &'static str,
    /// `Path::PATH` of the target entity type.
    pub target: &'static str,
    pub kind: RelationKind,
}

///
/// RelationKind
///
/// Owning relations persist the foreign key on this entity. Inverse
/// relations are read-only navigation populated from the owning side;
/// writing through them never establishes an association.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    Owning {
        /// Field on this entity that holds the target key.
        fk_field: &'static str,
    },
    Inverse {
        /// Field on the owning (target) entity that holds this entity's key.
        owning_fk: &'static str,
    },
}
