//! Facade crate for DeriveDB.
//!
//! Re-exports the runtime core and a `prelude` that covers the surface
//! application code touches: declaring repositories, opening sessions,
//! and shaping results.

pub use derivedb_core as core;

pub use derivedb_core::InternalError;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use derivedb_core::prelude::*;
}
