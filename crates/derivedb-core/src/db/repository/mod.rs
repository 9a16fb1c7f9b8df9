//! Module: db::repository
//! Responsibility: compiling declared method contracts into executable
//! plans at build time, and dispatching calls to them. Every wiring
//! defect (unparseable name, arity mismatch, unknown fetch plan,
//! missing custom implementation) surfaces here, before any call runs.
//! Does not own: execution (executor) or persistence (session/store).

use crate::{
    db::{
        executor::{execute_bulk, execute_load, BulkPlan, LoadPlan},
        method::{parse_method, MethodParseError, ShapeHint, Verb},
        predicate::{FieldPath, Operand, PathResolveError, Predicate},
        query::{
            merge_paths, BulkBody, FetchPlan, FetchPlanError, MethodSpec, PageRequest, Projection,
            QueryBody, ReturnShape, Sort,
        },
        response::{Page, ResultEnvelope},
        session::Session,
        store::ResolvedProjection,
        Db,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::EntityModel,
    traits::EntityKind,
    types::Key,
    value::Value,
};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};
use thiserror::Error as ThisError;

/// Hint keys with engine-level meaning. Everything else is forwarded to
/// the store verbatim.
const HINT_QUERY_TIMEOUT_MS: &str = "query.timeout_ms";
const HINT_LOCK_TIMEOUT_MS: &str = "lock.timeout_ms";

///
/// CustomFn
/// Hand-written method body, dispatched by name.
///

pub type CustomFn<E> =
    Arc<dyn Fn(&mut Session, &[Value]) -> Result<ResultEnvelope<E>, InternalError> + Send + Sync>;

///
/// RepositoryBuildError
///
/// Wiring-time failure. Nothing in this enum can occur at call time; a
/// built repository only fails through `InternalError`.
///

#[derive(Debug, ThisError)]
pub enum RepositoryBuildError {
    #[error("method '{name}' is declared twice")]
    DuplicateMethod { name: &'static str },

    #[error("method '{name}': {source}")]
    UnparseableMethodName {
        name: &'static str,
        #[source]
        source: MethodParseError,
    },

    #[error("method '{name}': {detail}")]
    ParameterBinding {
        name: &'static str,
        detail: String,
    },

    #[error("method '{name}' is declared custom but no implementation was registered")]
    MissingCustomImplementation { name: &'static str },

    #[error("custom implementation '{name}' has no declared method")]
    UndeclaredCustomImplementation { name: &'static str },

    #[error("method '{name}': {detail}")]
    ShapeConflict {
        name: &'static str,
        detail: String,
    },

    #[error("method '{name}': {source}")]
    FetchPlan {
        name: &'static str,
        #[source]
        source: FetchPlanError,
    },

    #[error("method '{name}': {source}")]
    UnknownPath {
        name: &'static str,
        #[source]
        source: PathResolveError,
    },

    #[error("method '{name}': hint '{key}' has an invalid value")]
    InvalidHint {
        name: &'static str,
        key: &'static str,
    },
}

enum Compiled<E: EntityKind> {
    Load(LoadPlan),
    Bulk(BulkPlan),
    Custom(CustomFn<E>),
}

struct CompiledMethod<E: EntityKind> {
    arity: usize,
    compiled: Compiled<E>,
}

///
/// RepositoryBuilder
///
/// Declarative assembly of one repository: method contracts, the named
/// query registry, and hand-written implementations. `build` validates
/// everything against the entity model and the store's registry.
///

pub struct RepositoryBuilder<E: EntityKind> {
    methods: Vec<MethodSpec>,
    named_queries: BTreeMap<&'static str, QueryBody>,
    custom: BTreeMap<&'static str, CustomFn<E>>,
}

impl<E: EntityKind> Default for RepositoryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityKind> RepositoryBuilder<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            methods: Vec::new(),
            named_queries: BTreeMap::new(),
            custom: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    #[must_use]
    pub fn named_query(mut self, name: &'static str, body: QueryBody) -> Self {
        self.named_queries.insert(name, body);
        self
    }

    #[must_use]
    pub fn custom_impl<F>(mut self, name: &'static str, body: F) -> Self
    where
        F: Fn(&mut Session, &[Value]) -> Result<ResultEnvelope<E>, InternalError>
            + Send
            + Sync
            + 'static,
    {
        self.custom.insert(name, Arc::new(body));
        self
    }

    pub fn build(mut self, db: &Db) -> Result<Repository<E>, RepositoryBuildError> {
        let model = E::MODEL;
        let lookup = |path: &str| db.model(path);

        let mut methods: BTreeMap<&'static str, CompiledMethod<E>> = BTreeMap::new();
        for spec in &self.methods {
            if methods.contains_key(spec.name) {
                return Err(RepositoryBuildError::DuplicateMethod { name: spec.name });
            }
            let compiled = compile_method(spec, model, &lookup, &self.named_queries, &mut self.custom)?;
            methods.insert(spec.name, compiled);
        }

        if let Some((name, _)) = self.custom.pop_first() {
            return Err(RepositoryBuildError::UndeclaredCustomImplementation { name });
        }

        Ok(Repository {
            db: db.clone(),
            methods,
        })
    }
}

fn compile_method<E: EntityKind>(
    spec: &MethodSpec,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
    named_queries: &BTreeMap<&'static str, QueryBody>,
    custom: &mut BTreeMap<&'static str, CustomFn<E>>,
) -> Result<CompiledMethod<E>, RepositoryBuildError> {
    if spec.custom {
        let body = custom.remove(spec.name).ok_or(
            RepositoryBuildError::MissingCustomImplementation { name: spec.name },
        )?;
        return Ok(CompiledMethod {
            arity: spec.arity(),
            compiled: Compiled::Custom(body),
        });
    }

    let (query_timeout, lock_timeout) = timeouts_of(spec)?;

    if let Some(bulk) = &spec.bulk {
        if spec.shape != ReturnShape::Affected {
            return Err(RepositoryBuildError::ShapeConflict {
                name: spec.name,
                detail: "bulk methods return an affected-row count".to_string(),
            });
        }
        validate_bulk_body(spec, bulk, model, lookup)?;
        return Ok(CompiledMethod {
            arity: spec.arity(),
            compiled: Compiled::Bulk(BulkPlan {
                name: spec.name,
                entity: model.path,
                params: spec.params,
                body: bulk.clone(),
            }),
        });
    }

    // Explicit body wins over derivation; a named-query reference falls
    // back to derivation when the registry has no entry for it.
    let body = spec.body.clone().or_else(|| {
        spec.named_query
            .and_then(|name| named_queries.get(name).cloned())
    });

    let prefetch_base = match &spec.fetch {
        Some(plan) => plan
            .resolve(model)
            .map_err(|source| RepositoryBuildError::FetchPlan {
                name: spec.name,
                source,
            })?,
        None => Vec::new(),
    };

    let mut plan = LoadPlan {
        name: spec.name,
        entity: model.path,
        model,
        shape: spec.shape,
        params: spec.params,
        filter: None,
        count_filter: None,
        projection: ResolvedProjection::Entity,
        prefetch: prefetch_base,
        hints: spec.hints,
        lock: spec.lock,
        query_timeout,
        lock_timeout,
    };

    match body {
        Some(body) => {
            if let Some(filter) = &body.filter {
                validate_template(spec, filter, model, lookup)?;
            }
            validate_shape_for_body(spec, &body)?;

            plan.projection = compile_projection(spec, &body.projection, model, lookup)?;
            let joins = FetchPlan::Paths(body.joins)
                .resolve(model)
                .map_err(|source| RepositoryBuildError::FetchPlan {
                    name: spec.name,
                    source,
                })?;
            plan.prefetch = merge_paths(&joins, &plan.prefetch);
            plan.filter = body.filter;
        }
        None => {
            let parsed = parse_method(spec.name, model, lookup).map_err(|source| {
                RepositoryBuildError::UnparseableMethodName {
                    name: spec.name,
                    source,
                }
            })?;
            if parsed.arity != spec.arity() {
                return Err(RepositoryBuildError::ParameterBinding {
                    name: spec.name,
                    detail: format!(
                        "name derives {} parameter slot(s) but {} parameter(s) are declared",
                        parsed.arity,
                        spec.arity()
                    ),
                });
            }
            validate_shape_for_verb(spec, parsed.verb, parsed.shape_hint)?;

            if parsed.verb == Verb::Delete {
                return Ok(CompiledMethod {
                    arity: spec.arity(),
                    compiled: Compiled::Bulk(BulkPlan {
                        name: spec.name,
                        entity: model.path,
                        params: spec.params,
                        body: BulkBody::Delete {
                            filter: Some(parsed.predicate),
                        },
                    }),
                });
            }
            plan.filter = Some(parsed.predicate);
        }
    }

    if let Some(count_body) = &spec.count_body {
        if spec.shape != ReturnShape::Page {
            return Err(RepositoryBuildError::ShapeConflict {
                name: spec.name,
                detail: "a count override only applies to counted pages".to_string(),
            });
        }
        if let Some(filter) = &count_body.filter {
            validate_template(spec, filter, model, lookup)?;
        }
        plan.count_filter = count_body.filter.clone();
    }

    Ok(CompiledMethod {
        arity: spec.arity(),
        compiled: Compiled::Load(plan),
    })
}

fn timeouts_of(
    spec: &MethodSpec,
) -> Result<(Option<Duration>, Option<Duration>), RepositoryBuildError> {
    let mut query_timeout = None;
    let mut lock_timeout = None;
    for &(key, value) in spec.hints.entries {
        let slot = match key {
            HINT_QUERY_TIMEOUT_MS => &mut query_timeout,
            HINT_LOCK_TIMEOUT_MS => &mut lock_timeout,
            _ => continue,
        };
        let millis: u64 = value.parse().map_err(|_| RepositoryBuildError::InvalidHint {
            name: spec.name,
            key,
        })?;
        *slot = Some(Duration::from_millis(millis));
    }
    Ok((query_timeout, lock_timeout))
}

/// Validate a body predicate template: every leaf path must resolve
/// against the model, every named operand must be a declared parameter,
/// and every positional slot must be within the declared arity.
fn validate_template(
    spec: &MethodSpec,
    predicate: &Predicate,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
) -> Result<(), RepositoryBuildError> {
    match predicate {
        Predicate::And(children) | Predicate::Or(children) => {
            for child in children {
                validate_template(spec, child, model, lookup)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => validate_template(spec, inner, model, lookup),
        Predicate::Compare(leaf) => {
            validate_path(spec, leaf.path, model, lookup)?;
            match &leaf.operand {
                Operand::Value(_) => Ok(()),
                Operand::Positional(index) => {
                    if *index >= spec.arity() {
                        return Err(RepositoryBuildError::ParameterBinding {
                            name: spec.name,
                            detail: format!(
                                "positional slot {index} exceeds declared arity {}",
                                spec.arity()
                            ),
                        });
                    }
                    Ok(())
                }
                Operand::Named(name) => {
                    if !spec.params.contains(name) {
                        return Err(RepositoryBuildError::ParameterBinding {
                            name: spec.name,
                            detail: format!("named parameter '{name}' is not declared"),
                        });
                    }
                    Ok(())
                }
            }
        }
    }
}

fn validate_path(
    spec: &MethodSpec,
    path: FieldPath,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
) -> Result<(), RepositoryBuildError> {
    let unknown = |raw: &'static str| RepositoryBuildError::UnknownPath {
        name: spec.name,
        source: PathResolveError::UnknownPath { path: raw },
    };

    match path.relation {
        None => {
            let field = model.field(path.field).ok_or_else(|| unknown(path.field))?;
            if !field.kind.is_queryable() {
                return Err(RepositoryBuildError::UnknownPath {
                    name: spec.name,
                    source: PathResolveError::NotQueryable { path: path.field },
                });
            }
            Ok(())
        }
        Some(relation) => {
            let rel = model.relation(relation).ok_or_else(|| unknown(relation))?;
            let target = lookup(rel.target).ok_or(RepositoryBuildError::UnknownPath {
                name: spec.name,
                source: PathResolveError::UnknownTarget {
                    path: path.field,
                    target: rel.target,
                },
            })?;
            target.field(path.field).ok_or_else(|| unknown(path.field))?;
            Ok(())
        }
    }
}

fn validate_bulk_body(
    spec: &MethodSpec,
    bulk: &BulkBody,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
) -> Result<(), RepositoryBuildError> {
    let filter = match bulk {
        BulkBody::Delete { filter } => filter,
        BulkBody::Update {
            filter,
            assignments,
        } => {
            for assign in assignments {
                if model.field(assign.field).is_none() {
                    return Err(RepositoryBuildError::UnknownPath {
                        name: spec.name,
                        source: PathResolveError::UnknownPath { path: assign.field },
                    });
                }
                if let crate::db::query::AssignOp::Set(Operand::Named(param)) = &assign.op {
                    if !spec.params.contains(param) {
                        return Err(RepositoryBuildError::ParameterBinding {
                            name: spec.name,
                            detail: format!("named parameter '{param}' is not declared"),
                        });
                    }
                }
            }
            filter
        }
    };
    if let Some(filter) = filter {
        validate_template(spec, filter, model, lookup)?;
    }
    Ok(())
}

fn validate_shape_for_body(
    spec: &MethodSpec,
    body: &QueryBody,
) -> Result<(), RepositoryBuildError> {
    let conflict = |detail: &str| RepositoryBuildError::ShapeConflict {
        name: spec.name,
        detail: detail.to_string(),
    };

    match (&body.projection, spec.shape) {
        (Projection::Scalar(_), ReturnShape::Scalars)
        | (Projection::Dto(_), ReturnShape::Projections) => Ok(()),
        (Projection::Scalar(_) | Projection::Dto(_), _) => Err(conflict(
            "projection bodies return scalar or projection shapes",
        )),
        (Projection::Entity, ReturnShape::Scalars | ReturnShape::Projections) => Err(conflict(
            "scalar and projection shapes require a projection body",
        )),
        (Projection::Entity, ReturnShape::Affected) => {
            Err(conflict("affected-row shapes require a bulk body"))
        }
        (Projection::Entity, _) => Ok(()),
    }
}

fn validate_shape_for_verb(
    spec: &MethodSpec,
    verb: Verb,
    hint: Option<ShapeHint>,
) -> Result<(), RepositoryBuildError> {
    let conflict = |detail: String| RepositoryBuildError::ShapeConflict {
        name: spec.name,
        detail,
    };

    match verb {
        Verb::Count if spec.shape != ReturnShape::Count => {
            return Err(conflict("count methods return a count".to_string()));
        }
        Verb::Exists if spec.shape != ReturnShape::Exists => {
            return Err(conflict("exists methods return a flag".to_string()));
        }
        Verb::Delete if spec.shape != ReturnShape::Affected => {
            return Err(conflict(
                "derived delete methods return an affected-row count".to_string(),
            ));
        }
        Verb::Find
            if !matches!(
                spec.shape,
                ReturnShape::One
                    | ReturnShape::Optional
                    | ReturnShape::Many
                    | ReturnShape::Page
                    | ReturnShape::Slice
            ) =>
        {
            return Err(conflict("find methods return entity shapes".to_string()));
        }
        _ => {}
    }

    if let Some(hint) = hint {
        let expected = match hint {
            ShapeHint::One => ReturnShape::One,
            ShapeHint::Optional => ReturnShape::Optional,
            ShapeHint::Multi | ShapeHint::List => ReturnShape::Many,
            ShapeHint::Page => ReturnShape::Page,
            ShapeHint::Slice => ReturnShape::Slice,
        };
        if spec.shape != expected {
            return Err(conflict(format!(
                "name hints {expected:?} but the method declares {:?}",
                spec.shape
            )));
        }
    }
    Ok(())
}

fn compile_projection(
    spec: &MethodSpec,
    projection: &Projection,
    model: &'static EntityModel,
    lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
) -> Result<ResolvedProjection, RepositoryBuildError> {
    let resolve = |raw: &'static str| {
        FieldPath::resolve(raw, model, lookup).map_err(|source| {
            RepositoryBuildError::UnknownPath {
                name: spec.name,
                source,
            }
        })
    };

    match projection {
        Projection::Entity => Ok(ResolvedProjection::Entity),
        Projection::Scalar(raw) => Ok(ResolvedProjection::Fields(vec![resolve(*raw)?])),
        Projection::Dto(raws) => {
            let mut paths = Vec::with_capacity(raws.len());
            for &raw in *raws {
                paths.push(resolve(raw)?);
            }
            Ok(ResolvedProjection::Fields(paths))
        }
    }
}

///
/// Repository
///
/// Built, immutable method table for one entity type. Calls dispatch by
/// method name; base persistence operations are available without any
/// declaration.
///

pub struct Repository<E: EntityKind> {
    db: Db,
    methods: BTreeMap<&'static str, CompiledMethod<E>>,
}

// custom method closures carry no Debug, so format the method table by name
impl<E: EntityKind> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::PATH)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<E: EntityKind> Repository<E> {
    #[must_use]
    pub const fn builder() -> RepositoryBuilder<E> {
        RepositoryBuilder::new()
    }

    /// Invoke a declared method by name.
    pub fn call(
        &self,
        session: &mut Session,
        name: &str,
        args: &[Value],
        page: Option<&PageRequest>,
    ) -> Result<ResultEnvelope<E>, InternalError> {
        let method = self.methods.get(name).ok_or_else(|| {
            InternalError::new(
                ErrorClass::NotFound,
                ErrorOrigin::Repository,
                format!("repository declares no method '{name}'"),
            )
        })?;
        if args.len() != method.arity {
            return Err(InternalError::new(
                ErrorClass::InvariantViolation,
                ErrorOrigin::Repository,
                format!(
                    "method '{name}' takes {} argument(s), {} supplied",
                    method.arity,
                    args.len()
                ),
            ));
        }

        match &method.compiled {
            Compiled::Load(plan) => execute_load(session, plan, args, page),
            Compiled::Bulk(plan) => {
                execute_bulk(session, plan, args).map(ResultEnvelope::Affected)
            }
            Compiled::Custom(body) => body(session, args),
        }
    }

    // ------------------------------------------------------------------
    // Base persistence surface
    // ------------------------------------------------------------------

    pub fn save(&self, session: &mut Session, entity: E) -> Result<E, InternalError> {
        session.save(entity)
    }

    pub fn find_by_id(
        &self,
        session: &mut Session,
        key: Key,
    ) -> Result<Option<E>, InternalError> {
        session.find(key)
    }

    pub fn exists_by_id(&self, session: &Session, key: Key) -> Result<bool, InternalError> {
        Ok(session.db().store().read_row(E::PATH, key)?.is_some())
    }

    pub fn delete_by_id(&self, session: &mut Session, key: Key) -> Result<bool, InternalError> {
        session.delete::<E>(key)
    }

    pub fn find_all(&self, session: &mut Session) -> Result<Vec<E>, InternalError> {
        execute_load::<E>(session, &self.base_plan(ReturnShape::Many), &[], None)?.into_many()
    }

    pub fn find_all_sorted(
        &self,
        session: &mut Session,
        sort: Sort,
    ) -> Result<Vec<E>, InternalError> {
        let request = PageRequest::at_offset(0, u64::MAX, sort)
            .map_err(|err| InternalError::query_invariant(err.to_string()))?;
        execute_load::<E>(session, &self.base_plan(ReturnShape::Many), &[], Some(&request))?
            .into_many()
    }

    pub fn find_page(
        &self,
        session: &mut Session,
        page: &PageRequest,
    ) -> Result<Page<E>, InternalError> {
        execute_load::<E>(session, &self.base_plan(ReturnShape::Page), &[], Some(page))?
            .into_page()
    }

    pub fn count_all(&self, session: &mut Session) -> Result<u64, InternalError> {
        execute_load::<E>(session, &self.base_plan(ReturnShape::Count), &[], None)?.into_count()
    }

    fn base_plan(&self, shape: ReturnShape) -> LoadPlan {
        LoadPlan {
            name: "base",
            entity: E::MODEL.path,
            model: E::MODEL,
            shape,
            params: &[],
            filter: None,
            count_filter: None,
            projection: ResolvedProjection::Entity,
            prefetch: Vec::new(),
            hints: crate::db::query::QueryHints::default(),
            lock: crate::db::query::LockMode::None,
            query_timeout: None,
            lock_timeout: None,
        }
    }

    #[must_use]
    pub fn db(&self) -> &Db {
        &self.db
    }
}
