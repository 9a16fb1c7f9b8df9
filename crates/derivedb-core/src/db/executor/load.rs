use crate::{
    db::{
        executor::bind_filter,
        predicate::{ParamSet, Predicate},
        query::{HintScope, LockMode, PageRequest, QueryHints, ReturnShape},
        response::{at_most_one, exactly_one, Page, ResultEnvelope, SlicePage},
        session::Session,
        store::{ExecuteOutput, ResolvedProjection, ResolvedQuery, Window},
    },
    error::InternalError,
    model::{EntityModel, RelationKind},
    traits::EntityKind,
    types::Key,
    value::Value,
};
use std::time::Duration;

///
/// LoadPlan
///
/// Fully compiled read method: the bound-per-call predicate template
/// plus everything resolved at build time (projection paths, prefetch
/// set, hint and lock configuration).
///

#[derive(Clone, Debug)]
pub(crate) struct LoadPlan {
    pub name: &'static str,
    pub entity: &'static str,
    pub model: &'static EntityModel,
    pub shape: ReturnShape,
    pub params: &'static [&'static str],
    pub filter: Option<Predicate>,
    /// Replacement filter for the count query of a counted page.
    pub count_filter: Option<Predicate>,
    pub projection: ResolvedProjection,
    pub prefetch: Vec<&'static str>,
    pub hints: QueryHints,
    pub lock: LockMode,
    pub query_timeout: Option<Duration>,
    pub lock_timeout: Option<Duration>,
}

pub(crate) fn execute_load<E: EntityKind>(
    session: &mut Session,
    plan: &LoadPlan,
    args: &[Value],
    page: Option<&PageRequest>,
) -> Result<ResultEnvelope<E>, InternalError> {
    let params = ParamSet::new(args, plan.params);
    let bound = bind_filter(plan.filter.as_ref(), &params)?;

    super::debug_log(
        session,
        format!(
            "Load: {} entity={} shape={:?} lock={:?}",
            plan.name, plan.entity, plan.shape, plan.lock
        ),
    );

    let mut query = ResolvedQuery::of(plan.entity);
    query.filter = bound.clone();
    query.order = page.map_or_else(Vec::new, |request| request.sort().keys().to_vec());
    query.projection = plan.projection.clone();
    query.prefetch = plan.prefetch.clone();
    query.hints = plan.hints.applied(HintScope::Content);
    query.timeout = plan.query_timeout;

    match plan.shape {
        ReturnShape::One => {
            let entities = fetch_entities::<E>(session, plan, &query, None)?;
            exactly_one(entities, plan.name).map(ResultEnvelope::One)
        }
        ReturnShape::Optional => {
            let entities = fetch_entities::<E>(session, plan, &query, None)?;
            at_most_one(entities, plan.name).map(ResultEnvelope::Optional)
        }
        ReturnShape::Many => {
            let window = page.map(|request| Window {
                offset: request.offset(),
                limit: Some(request.size()),
            });
            let entities = fetch_entities::<E>(session, plan, &query, window.as_ref())?;
            Ok(ResultEnvelope::Many(entities))
        }
        ReturnShape::Page => {
            let request = require_page(plan, page)?;
            let window = Window {
                offset: request.offset(),
                limit: Some(request.size()),
            };
            let entities = fetch_entities::<E>(session, plan, &query, Some(&window))?;

            let count_bound = match &plan.count_filter {
                Some(filter) => bind_filter(Some(filter), &params)?,
                None => bound,
            };
            let mut count_query = ResolvedQuery::of(plan.entity);
            count_query.filter = count_bound;
            count_query.hints = plan.hints.applied(HintScope::Counting);
            count_query.timeout = plan.query_timeout;
            let total = session.db().store().count(&count_query)?;

            Ok(ResultEnvelope::Page(Page::new(
                entities,
                total,
                request.offset(),
                request.size(),
            )))
        }
        ReturnShape::Slice => {
            // One row past the window stands in for a count query.
            let request = require_page(plan, page)?;
            let window = Window {
                offset: request.offset(),
                limit: Some(request.size() + 1),
            };
            let mut entities = fetch_entities::<E>(session, plan, &query, Some(&window))?;
            let has_next = entities.len() as u64 > request.size();
            entities.truncate(usize::try_from(request.size()).unwrap_or(usize::MAX));

            Ok(ResultEnvelope::Slice(SlicePage::new(
                entities,
                request.offset(),
                request.size(),
                has_next,
            )))
        }
        ReturnShape::Count => {
            let total = session.db().store().count(&query)?;
            Ok(ResultEnvelope::Count(total))
        }
        ReturnShape::Exists => {
            let window = Window {
                offset: 0,
                limit: Some(1),
            };
            let out = session.db().store().execute(&query, Some(&window))?;
            Ok(ResultEnvelope::Exists(!out.rows.is_empty()))
        }
        ReturnShape::Scalars => {
            let out = session.db().store().execute(&query, window_of(page).as_ref())?;
            let rows = out.projected.ok_or_else(|| {
                InternalError::executor_invariant(format!(
                    "method '{}' declares a scalar shape but projected nothing",
                    plan.name
                ))
            })?;
            let scalars = rows
                .into_iter()
                .map(|mut tuple| {
                    if tuple.is_empty() {
                        Value::Null
                    } else {
                        tuple.remove(0)
                    }
                })
                .collect();
            Ok(ResultEnvelope::Scalars(scalars))
        }
        ReturnShape::Projections => {
            let out = session.db().store().execute(&query, window_of(page).as_ref())?;
            let rows = out.projected.ok_or_else(|| {
                InternalError::executor_invariant(format!(
                    "method '{}' declares a projection shape but projected nothing",
                    plan.name
                ))
            })?;
            Ok(ResultEnvelope::Projections(rows))
        }
        ReturnShape::Affected => Err(InternalError::executor_invariant(format!(
            "method '{}' declares a bulk shape but compiled as a load",
            plan.name
        ))),
    }
}

fn window_of(page: Option<&PageRequest>) -> Option<Window> {
    page.map(|request| Window {
        offset: request.offset(),
        limit: Some(request.size()),
    })
}

fn require_page<'a>(
    plan: &LoadPlan,
    page: Option<&'a PageRequest>,
) -> Result<&'a PageRequest, InternalError> {
    page.ok_or_else(|| {
        InternalError::executor_invariant(format!(
            "method '{}' returns a windowed shape and requires a page request",
            plan.name
        ))
    })
}

/// Execute one content query: lock if declared, cache prefetched
/// relations, and attach the loaded rows as entities.
fn fetch_entities<E: EntityKind>(
    session: &mut Session,
    plan: &LoadPlan,
    query: &ResolvedQuery,
    window: Option<&Window>,
) -> Result<Vec<E>, InternalError> {
    let out = session.db().store().execute(query, window)?;

    if plan.lock.is_locking() {
        let versions: Vec<(Key, u64)> = out
            .rows
            .iter()
            .map(|keyed| (keyed.key, keyed.version))
            .collect();
        session.db().store().acquire_lock(
            plan.entity,
            &versions,
            session.tx(),
            plan.lock_timeout,
        )?;
    }

    cache_prefetched(session, plan, &out);

    let read_only = query.hints.read_only;
    out.rows
        .iter()
        .map(|keyed| session.attach_loaded(keyed, read_only))
        .collect()
}

/// Hand prefetched relation rows to the session so later navigation is
/// satisfied without another round trip.
fn cache_prefetched(session: &mut Session, plan: &LoadPlan, out: &ExecuteOutput) {
    for (name, rows) in &out.prefetched {
        let Some(relation) = plan.model.relation(name) else {
            continue;
        };
        session.cache_related(relation.target, rows);

        if let RelationKind::Inverse { owning_fk } = relation.kind {
            for content in &out.rows {
                let targets: Vec<Key> = rows
                    .iter()
                    .filter(|keyed| {
                        keyed.row.get(owning_fk).and_then(Key::from_value) == Some(content.key)
                    })
                    .map(|keyed| keyed.key)
                    .collect();
                session.cache_inverse(plan.entity, relation.name, content.key, targets);
            }
        }
    }
}
