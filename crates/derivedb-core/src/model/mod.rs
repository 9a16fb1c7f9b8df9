//! Runtime data model definitions.
//!
//! Types in `model` are the runtime representations of entity schemas:
//! hand-declared statics describing fields, relations, and named fetch
//! plans. Repository building, predicate resolution, and the store all
//! plan against these models rather than against concrete entity types.

mod entity;
mod field;
mod relation;

pub use entity::{EntityModel, FetchPlanModel};
pub use field::{EntityFieldKind, EntityFieldModel};
pub use relation::{RelationKind, RelationModel};
