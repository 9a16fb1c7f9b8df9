//! Module: db::store
//! Responsibility: the consumed store interface and its in-process
//! implementation. The engine resolves and binds queries; the store
//! evaluates, sorts, windows, and materializes prefetched relations.
//! Does not own: working-set semantics (session) or result shaping.

mod codec;
mod memory;

pub use memory::MemoryStore;

use crate::{
    db::{
        predicate::{BoundPredicate, FieldPath},
        query::{AppliedHints, SortKey},
    },
    error::InternalError,
    model::EntityModel,
    types::Key,
    value::{RowData, Value},
};
use std::{collections::BTreeMap, time::Duration};

///
/// TxId
/// Opaque transaction handle issued by `Store::begin`.
///

pub type TxId = u64;

///
/// KeyedRow
/// One materialized row with its key and write-version.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyedRow {
    pub key: Key,
    pub version: u64,
    pub row: RowData,
}

///
/// ResolvedProjection
///

#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedProjection {
    Entity,
    /// Projected columns in declaration order; rows come back as value
    /// tuples in `ExecuteOutput::projected`.
    Fields(Vec<FieldPath>),
}

///
/// ResolvedQuery
///
/// A fully bound, executable content query. Everything the method
/// contract contributed (predicate template, hints, fetch plan) has
/// been resolved; the store only evaluates.
///

#[derive(Clone, Debug)]
pub struct ResolvedQuery {
    /// `Path::PATH` of the target entity.
    pub entity: &'static str,
    pub filter: Option<BoundPredicate>,
    /// Sort keys in declaration order; the store appends the primary
    /// key ascending as the final tie-break.
    pub order: Vec<SortKey>,
    pub projection: ResolvedProjection,
    /// Relations to materialize in this same round trip.
    pub prefetch: Vec<&'static str>,
    pub hints: AppliedHints,
    /// Caller-supplied deadline, forwarded to the store.
    pub timeout: Option<Duration>,
}

impl ResolvedQuery {
    #[must_use]
    pub fn of(entity: &'static str) -> Self {
        Self {
            entity,
            filter: None,
            order: Vec::new(),
            projection: ResolvedProjection::Entity,
            prefetch: Vec::new(),
            hints: AppliedHints::default(),
            timeout: None,
        }
    }
}

///
/// Window
/// Row window applied after ordering.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

///
/// ExecuteOutput
///
/// Content rows plus everything materialized alongside them: projected
/// value tuples (for field projections) and prefetched relation rows,
/// keyed by relation name.
///

#[derive(Debug, Default)]
pub struct ExecuteOutput {
    pub rows: Vec<KeyedRow>,
    pub projected: Option<Vec<Vec<Value>>>,
    pub prefetched: BTreeMap<&'static str, Vec<KeyedRow>>,
}

///
/// ResolvedBulk
/// A fully bound set-based update or delete statement.
///

#[derive(Clone, Debug)]
pub struct ResolvedBulk {
    pub entity: &'static str,
    pub filter: Option<BoundPredicate>,
    pub action: ResolvedBulkAction,
}

#[derive(Clone, Debug)]
pub enum ResolvedBulkAction {
    Update(Vec<ResolvedAssign>),
    Delete,
}

#[derive(Clone, Debug)]
pub struct ResolvedAssign {
    pub field: &'static str,
    pub op: ResolvedAssignOp,
}

#[derive(Clone, Debug)]
pub enum ResolvedAssignOp {
    Set(Value),
    Increment(i64),
}

///
/// Store
///
/// The persistence interface the engine consumes. Query execution, lock
/// acquisition, and bulk statements are synchronous and may block the
/// calling thread on contention; a caller-supplied timeout is surfaced
/// as a timeout-classed error.
///

pub trait Store: Send + Sync {
    fn register_model(&self, model: &'static EntityModel);
    fn model(&self, path: &str) -> Option<&'static EntityModel>;

    fn begin(&self) -> TxId;
    /// End a transaction, releasing every lock it holds.
    fn commit(&self, tx: TxId);
    fn rollback(&self, tx: TxId);

    /// Issue the next primary key from the entity's sequence.
    fn next_key(&self, entity: &'static str) -> Result<Key, InternalError>;

    fn execute(
        &self,
        query: &ResolvedQuery,
        window: Option<&Window>,
    ) -> Result<ExecuteOutput, InternalError>;

    /// Row count for the query's filter. Issued only for counted pages.
    fn count(&self, query: &ResolvedQuery) -> Result<u64, InternalError>;

    fn execute_bulk(&self, statement: &ResolvedBulk) -> Result<u64, InternalError>;

    /// Acquire write-exclusive locks on `rows` for `tx`, blocking while
    /// another transaction holds any of them. Versions are revalidated
    /// under the lock; drift is a stale-state conflict.
    fn acquire_lock(
        &self,
        entity: &'static str,
        rows: &[(Key, u64)],
        tx: TxId,
        timeout: Option<Duration>,
    ) -> Result<(), InternalError>;

    fn read_row(&self, entity: &'static str, key: Key) -> Result<Option<KeyedRow>, InternalError>;
    fn write_row(&self, entity: &'static str, key: Key, row: RowData)
    -> Result<(), InternalError>;
    fn delete_row(&self, entity: &'static str, key: Key) -> Result<bool, InternalError>;
}
