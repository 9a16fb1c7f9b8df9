use crate::model::{field::EntityFieldModel, relation::RelationModel};

///
/// EntityModel
/// Hand-declared runtime model for one entity.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified Rust type path (for dispatch and diagnostics).
    pub path: &'static str,
    /// Stable external name used in diagnostics.
    pub entity_name: &'static str,
    /// Primary key field name (points at an entry in `fields`).
    pub primary_key: &'static str,
    /// Ordered field list (authoritative for resolution).
    pub fields: &'static [EntityFieldModel],
    /// Declared associations, owning and inverse.
    pub relations: &'static [RelationModel],
    /// Named fetch plans resolvable by `FetchPlan::Named`.
    pub fetch_plans: &'static [FetchPlanModel],
}

///
/// FetchPlanModel
/// A named set of relation paths to materialize eagerly.
///

#[derive(Debug)]
pub struct FetchPlanModel {
    pub name: &'static str,
    pub paths: &'static [&'static str],
}

impl EntityModel {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static EntityFieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&'static RelationModel> {
        self.relations.iter().find(|rel| rel.name == name)
    }

    #[must_use]
    pub fn fetch_plan(&self, name: &str) -> Option<&'static FetchPlanModel> {
        self.fetch_plans.iter().find(|plan| plan.name == name)
    }
}
