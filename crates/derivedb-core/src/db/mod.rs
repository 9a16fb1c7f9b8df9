//! Module: db
//! Responsibility: the engine surface. `Db` owns the store and metrics;
//! sessions, repositories, and executors all hang off it.

pub mod executor;
pub mod method;
pub mod predicate;
pub mod query;
pub mod repository;
pub mod response;
pub mod session;
pub mod store;

pub use response::{Page, ResultEnvelope, SlicePage};
pub use session::Session;

use crate::{
    db::store::{MemoryStore, Store},
    model::EntityModel,
    obs::{Metrics, MetricsSnapshot},
    traits::EntityKind,
};
use std::sync::Arc;

///
/// Db
///
/// Handle to one database: a store plus its metrics. Cheap to clone;
/// clones share the same store, sequences, and counters.
///

#[derive(Clone)]
pub struct Db {
    store: Arc<dyn Store>,
    metrics: Arc<Metrics>,
    debug: bool,
}

impl Db {
    /// A fresh in-process database.
    #[must_use]
    pub fn new() -> Self {
        let metrics = Arc::new(Metrics::default());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(Arc::clone(&metrics)));
        Self {
            store,
            metrics,
            debug: false,
        }
    }

    /// Wrap an externally constructed store.
    ///
    /// The store must report into `metrics` for the round-trip counters
    /// to be meaningful.
    #[must_use]
    pub fn with_store(store: Arc<dyn Store>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            debug: false,
        }
    }

    /// Enable executor debug logging on this handle and its clones.
    #[must_use]
    pub const fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub(crate) const fn debug(&self) -> bool {
        self.debug
    }

    /// Register an entity type with the store.
    pub fn register<E: EntityKind>(&self) {
        self.store.register_model(E::MODEL);
    }

    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn model(&self, path: &str) -> Option<&'static EntityModel> {
        self.store.model(path)
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}
