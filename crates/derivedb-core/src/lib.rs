//! Core runtime for DeriveDB: entity traits, values, the method-name
//! grammar, repositories, executors, and the ergonomics exported via
//! the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod traits;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::InternalError;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, or executors are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            query::{
                Direction, FetchPlan, LockMode, MethodSpec, PageRequest, Projection, QueryBody,
                QueryHints, ReturnShape, Sort,
            },
            repository::{Repository, RepositoryBuilder},
            Db, Page, ResultEnvelope, Session, SlicePage,
        },
        model::EntityModel,
        traits::{EntityKind, Path},
        types::{Key, Stamps},
        value::Value,
    };
}
