//! Module: db::query
//! Responsibility: the declarative surface of a repository method, meaning
//! its return shape, query source, and structural annotations.
//! Does not own: name parsing, binding, or execution.

mod body;
mod fetch;
mod hints;
mod lock;
mod page;

pub use body::{Projection, QueryBody};
pub use fetch::{FetchPlan, FetchPlanError};
pub(crate) use fetch::merge_paths;
pub use hints::{AppliedHints, QueryHints};
pub(crate) use hints::HintScope;
pub use lock::LockMode;
pub use page::{Direction, PageRequest, PageRequestError, Sort, SortKey};

use crate::db::predicate::{Operand, Predicate};

///
/// ReturnShape
///
/// Declared return contract of a repository method. Shaping and
/// pagination strategy both key off this: counted pages issue a count
/// query, slices over-fetch by one row instead, lists never window
/// unless a page request is supplied.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReturnShape {
    /// Exactly one entity; zero rows is a not-found error.
    One,
    /// Zero or one entity; zero rows is `None`, never an error.
    Optional,
    /// Zero or more entities; zero rows is an empty list.
    Many,
    /// Counted page with total element/page counts.
    Page,
    /// Uncounted slice with a has-next flag.
    Slice,
    /// Scalar projection column.
    Scalars,
    /// DTO projection rows, forwarded unmodified.
    Projections,
    Count,
    Exists,
    /// Affected-row count of a bulk statement.
    Affected,
}

///
/// AssignOp / BulkAssign / BulkBody
///
/// Set-based mutation body. A bulk statement executes directly against
/// the store and is never reflected in already-loaded entities; callers
/// flush and invalidate the working set before re-reading.
///

#[derive(Clone, Debug, PartialEq)]
pub enum AssignOp {
    Set(Operand),
    /// Read-modify-write of a numeric field inside the statement.
    Increment(i64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulkAssign {
    pub field: &'static str,
    pub op: AssignOp,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BulkBody {
    Update {
        filter: Option<Predicate>,
        assignments: Vec<BulkAssign>,
    },
    Delete {
        filter: Option<Predicate>,
    },
}

///
/// MethodSpec
///
/// One declared repository method: name, parameter names (declaration
/// order doubles as positional slot order), return shape, and the
/// structural annotations. Everything here is validated and compiled at
/// repository build time.
///

#[derive(Clone, Debug)]
pub struct MethodSpec {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub shape: ReturnShape,
    pub body: Option<QueryBody>,
    /// Look this name up in the contract's named-query registry before
    /// falling back to derivation.
    pub named_query: Option<&'static str>,
    pub count_body: Option<QueryBody>,
    pub bulk: Option<BulkBody>,
    pub hints: QueryHints,
    pub lock: LockMode,
    pub fetch: Option<FetchPlan>,
    /// Backed by a hand-written implementation instead of a query.
    pub custom: bool,
}

impl MethodSpec {
    #[must_use]
    pub const fn new(name: &'static str, shape: ReturnShape) -> Self {
        Self {
            name,
            params: &[],
            shape,
            body: None,
            named_query: None,
            count_body: None,
            bulk: None,
            hints: QueryHints {
                read_only: false,
                for_counting: false,
                entries: &[],
            },
            lock: LockMode::None,
            fetch: None,
            custom: false,
        }
    }

    #[must_use]
    pub const fn params(mut self, params: &'static [&'static str]) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn body(mut self, body: QueryBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn named_query(mut self, name: &'static str) -> Self {
        self.named_query = Some(name);
        self
    }

    #[must_use]
    pub fn count_body(mut self, body: QueryBody) -> Self {
        self.count_body = Some(body);
        self
    }

    #[must_use]
    pub fn bulk(mut self, bulk: BulkBody) -> Self {
        self.bulk = Some(bulk);
        self
    }

    #[must_use]
    pub const fn hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }

    #[must_use]
    pub const fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    #[must_use]
    pub const fn fetch(mut self, fetch: FetchPlan) -> Self {
        self.fetch = Some(fetch);
        self
    }

    #[must_use]
    pub const fn custom(mut self) -> Self {
        self.custom = true;
        self
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.params.len()
    }
}
