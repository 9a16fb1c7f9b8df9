//! Module: db::executor
//! Responsibility: turning a compiled method plan plus call arguments
//! into store round trips and a shaped result. Pagination strategy,
//! lock acquisition, and prefetch caching all live here.
//! Does not own: method compilation (repository) or storage (store).

mod bulk;
mod load;

#[cfg(test)]
mod tests;

pub(crate) use bulk::{execute_bulk, BulkPlan};
pub(crate) use load::{execute_load, LoadPlan};

use crate::{
    db::{
        predicate::{bind, BindError, BoundPredicate, ParamSet, Predicate},
        session::Session,
    },
    error::InternalError,
};

fn debug_log(session: &Session, s: impl AsRef<str>) {
    if session.db().debug() {
        println!("[debug] {}", s.as_ref());
    }
}

fn bind_filter(
    filter: Option<&Predicate>,
    params: &ParamSet<'_>,
) -> Result<Option<BoundPredicate>, InternalError> {
    filter
        .map(|predicate| bind(predicate, params))
        .transpose()
        .map_err(bind_failure)
}

fn bind_failure(err: BindError) -> InternalError {
    err.into()
}
