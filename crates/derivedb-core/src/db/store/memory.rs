use crate::{
    db::{
        predicate::eval,
        query::{AppliedHints, Direction, SortKey},
        store::{
            codec::{decode_row, encode_row},
            ExecuteOutput, KeyedRow, ResolvedAssignOp, ResolvedBulk, ResolvedBulkAction,
            ResolvedProjection, ResolvedQuery, Store, TxId, Window,
        },
    },
    error::InternalError,
    model::{EntityModel, RelationKind},
    obs::Metrics,
    types::Key,
    value::{RowData, Value},
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

///
/// MemoryStore
///
/// In-process, thread-safe store. Rows are kept CBOR-encoded with a
/// per-row write-version; write-exclusive locks live in a separate lock
/// table guarded by a condvar so waiters block instead of spinning.
///
/// `query_delay` injects simulated execution latency, checked against a
/// query's deadline before any row is touched.
///

pub struct MemoryStore {
    metrics: Arc<Metrics>,
    inner: Mutex<StoreInner>,
    locks: Mutex<LockTable>,
    lock_released: Condvar,
    next_tx: AtomicU64,
    query_delay: Mutex<Option<Duration>>,
    last_content_hints: Mutex<Option<AppliedHints>>,
    last_count_hints: Mutex<Option<AppliedHints>>,
}

#[derive(Default)]
struct StoreInner {
    models: BTreeMap<&'static str, &'static EntityModel>,
    tables: BTreeMap<&'static str, Table>,
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<u64, StoredRow>,
    next_key: u64,
}

struct StoredRow {
    version: u64,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct LockTable {
    held: BTreeMap<(&'static str, u64), TxId>,
}

// Mutex poisoning carries no recovery value here; the guarded state is
// plain data, so a panicked writer's guard is taken as-is.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            inner: Mutex::new(StoreInner::default()),
            locks: Mutex::new(LockTable::default()),
            lock_released: Condvar::new(),
            next_tx: AtomicU64::new(1),
            query_delay: Mutex::new(None),
            last_content_hints: Mutex::new(None),
            last_count_hints: Mutex::new(None),
        }
    }

    /// Simulated per-query execution latency.
    pub fn set_query_delay(&self, delay: Option<Duration>) {
        *lock(&self.query_delay) = delay;
    }

    /// Hints applied to the most recent content query.
    #[must_use]
    pub fn last_content_hints(&self) -> Option<AppliedHints> {
        lock(&self.last_content_hints).clone()
    }

    /// Hints applied to the most recent count query.
    #[must_use]
    pub fn last_count_hints(&self) -> Option<AppliedHints> {
        lock(&self.last_count_hints).clone()
    }

    fn check_deadline(&self, query: &ResolvedQuery) -> Result<(), InternalError> {
        let delay = *lock(&self.query_delay);
        if let (Some(delay), Some(timeout)) = (delay, query.timeout) {
            if delay > timeout {
                let limit_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(InternalError::query_timeout(query.entity, limit_ms));
            }
        }
        Ok(())
    }

    /// Decode, filter, and sort the full candidate set for a query.
    fn scan(
        &self,
        inner: &StoreInner,
        query: &ResolvedQuery,
    ) -> Result<Vec<KeyedRow>, InternalError> {
        let model = inner.model_of(query.entity)?;
        let Some(table) = inner.tables.get(query.entity) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        let mut scanned = 0_u64;
        for (key, stored) in &table.rows {
            scanned += 1;
            let row = decode_row(&stored.bytes)?;
            let keep = match &query.filter {
                None => true,
                Some(filter) => {
                    let mut related =
                        |relation: &str| inner.related_row(model, &row, relation);
                    eval(filter, &row, &mut related)
                }
            };
            if keep {
                matched.push(KeyedRow {
                    key: Key(*key),
                    version: stored.version,
                    row,
                });
            }
        }
        self.metrics.add_rows_scanned(scanned);

        if !query.order.is_empty() {
            validate_order(model, &query.order)?;
            sort_rows(&mut matched, &query.order);
        }

        Ok(matched)
    }
}

impl StoreInner {
    fn model_of(&self, entity: &'static str) -> Result<&'static EntityModel, InternalError> {
        self.models
            .get(entity)
            .copied()
            .ok_or_else(|| InternalError::store_internal(format!("entity not registered: {entity}")))
    }

    /// Resolve one relation hop for a row. Owning hops follow the stored
    /// foreign key; inverse hops have no single row and resolve to none.
    fn related_row(
        &self,
        model: &EntityModel,
        row: &RowData,
        relation: &str,
    ) -> Option<RowData> {
        let relation = model.relation(relation)?;
        let RelationKind::Owning { fk_field } = relation.kind else {
            return None;
        };
        let fk = Key::from_value(row.get(fk_field)?)?;
        let table = self.tables.get(relation.target)?;
        let stored = table.rows.get(&fk.get())?;
        decode_row(&stored.bytes).ok()
    }
}

fn validate_order(model: &EntityModel, order: &[SortKey]) -> Result<(), InternalError> {
    for key in order {
        let known = model
            .field(&key.field)
            .is_some_and(|field| field.kind.is_queryable());
        if !known {
            return Err(InternalError::store_unsupported(format!(
                "cannot sort {} by unknown field '{}'",
                model.entity_name, key.field
            )));
        }
    }
    Ok(())
}

fn sort_rows(rows: &mut [KeyedRow], order: &[SortKey]) {
    rows.sort_by(|a, b| {
        for key in order {
            let left = a.row.get(&key.field).cloned().unwrap_or(Value::Null);
            let right = b.row.get(&key.field).cloned().unwrap_or(Value::Null);
            let ord = match key.direction {
                Direction::Asc => left.total_cmp(&right),
                Direction::Desc => right.total_cmp(&left),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        // Ties break by primary key ascending regardless of direction.
        a.key.get().cmp(&b.key.get())
    });
}

fn apply_window(rows: Vec<KeyedRow>, window: Option<&Window>) -> Vec<KeyedRow> {
    let Some(window) = window else {
        return rows;
    };
    let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
    let iter = rows.into_iter().skip(offset);
    match window.limit {
        Some(limit) => iter.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
        None => iter.collect(),
    }
}

fn project_rows(
    inner: &StoreInner,
    model: &EntityModel,
    rows: &[KeyedRow],
    projection: &ResolvedProjection,
) -> Option<Vec<Vec<Value>>> {
    let ResolvedProjection::Fields(paths) = projection else {
        return None;
    };

    let projected = rows
        .iter()
        .map(|keyed| {
            paths
                .iter()
                .map(|path| match path.relation {
                    None => keyed.row.get(path.field).cloned().unwrap_or(Value::Null),
                    Some(relation) => inner
                        .related_row(model, &keyed.row, relation)
                        .and_then(|row| row.get(path.field).cloned())
                        .unwrap_or(Value::Null),
                })
                .collect()
        })
        .collect();
    Some(projected)
}

/// Materialize the rows behind each prefetched relation of the content
/// set, so the caller can satisfy navigation without further queries.
fn prefetch_relations(
    inner: &StoreInner,
    model: &EntityModel,
    rows: &[KeyedRow],
    prefetch: &[&'static str],
) -> Result<BTreeMap<&'static str, Vec<KeyedRow>>, InternalError> {
    let mut out = BTreeMap::new();
    for name in prefetch {
        let Some(relation) = model.relation(name) else {
            return Err(InternalError::store_internal(format!(
                "prefetch names unknown relation '{name}' on {}",
                model.entity_name
            )));
        };
        let Some(table) = inner.tables.get(relation.target) else {
            out.insert(relation.name, Vec::new());
            continue;
        };

        let related = match relation.kind {
            RelationKind::Owning { fk_field } => {
                let mut keys: Vec<u64> = rows
                    .iter()
                    .filter_map(|keyed| keyed.row.get(fk_field))
                    .filter_map(Key::from_value)
                    .map(Key::get)
                    .collect();
                keys.sort_unstable();
                keys.dedup();

                let mut related = Vec::new();
                for key in keys {
                    if let Some(stored) = table.rows.get(&key) {
                        related.push(KeyedRow {
                            key: Key(key),
                            version: stored.version,
                            row: decode_row(&stored.bytes)?,
                        });
                    }
                }
                related
            }
            RelationKind::Inverse { owning_fk } => {
                let content_keys: Vec<Value> =
                    rows.iter().map(|keyed| Value::from(keyed.key)).collect();

                let mut related = Vec::new();
                for (key, stored) in &table.rows {
                    let row = decode_row(&stored.bytes)?;
                    let hit = row
                        .get(owning_fk)
                        .is_some_and(|fk| content_keys.iter().any(|k| fk.semantic_eq(k)));
                    if hit {
                        related.push(KeyedRow {
                            key: Key(*key),
                            version: stored.version,
                            row,
                        });
                    }
                }
                related
            }
        };
        out.insert(relation.name, related);
    }
    Ok(out)
}

impl Store for MemoryStore {
    fn register_model(&self, model: &'static EntityModel) {
        let mut inner = lock(&self.inner);
        inner.models.insert(model.path, model);
        inner.tables.entry(model.path).or_insert_with(|| Table {
            rows: BTreeMap::new(),
            next_key: 1,
        });
    }

    fn model(&self, path: &str) -> Option<&'static EntityModel> {
        lock(&self.inner).models.get(path).copied()
    }

    fn begin(&self) -> TxId {
        self.next_tx.fetch_add(1, Ordering::Relaxed)
    }

    fn commit(&self, tx: TxId) {
        let mut locks = lock(&self.locks);
        locks.held.retain(|_, holder| *holder != tx);
        self.lock_released.notify_all();
    }

    fn rollback(&self, tx: TxId) {
        // Rows are written through at flush time; rollback only releases
        // the transaction's locks.
        self.commit(tx);
    }

    fn next_key(&self, entity: &'static str) -> Result<Key, InternalError> {
        let mut inner = lock(&self.inner);
        inner.model_of(entity)?;
        let table = inner.tables.entry(entity).or_default();
        if table.next_key == 0 {
            table.next_key = 1;
        }
        let key = table.next_key;
        table.next_key += 1;
        Ok(Key(key))
    }

    fn execute(
        &self,
        query: &ResolvedQuery,
        window: Option<&Window>,
    ) -> Result<ExecuteOutput, InternalError> {
        self.check_deadline(query)?;
        self.metrics.incr_content_queries();
        *lock(&self.last_content_hints) = Some(query.hints.clone());

        let inner = lock(&self.inner);
        let model = inner.model_of(query.entity)?;

        let matched = self.scan(&inner, query)?;
        let rows = apply_window(matched, window);
        self.metrics.add_rows_loaded(rows.len() as u64);

        let projected = project_rows(&inner, model, &rows, &query.projection);
        let prefetched = prefetch_relations(&inner, model, &rows, &query.prefetch)?;

        Ok(ExecuteOutput {
            rows,
            projected,
            prefetched,
        })
    }

    fn count(&self, query: &ResolvedQuery) -> Result<u64, InternalError> {
        self.check_deadline(query)?;
        self.metrics.incr_count_queries();
        *lock(&self.last_count_hints) = Some(query.hints.clone());

        let inner = lock(&self.inner);
        let matched = self.scan(&inner, query)?;
        Ok(matched.len() as u64)
    }

    fn execute_bulk(&self, statement: &ResolvedBulk) -> Result<u64, InternalError> {
        self.metrics.incr_bulk_statements();

        let mut inner = lock(&self.inner);
        let model = inner.model_of(statement.entity)?;

        // Match first against an immutable view, then apply.
        let mut matched: Vec<(u64, RowData)> = Vec::new();
        if let Some(table) = inner.tables.get(statement.entity) {
            let mut scanned = 0_u64;
            for (key, stored) in &table.rows {
                scanned += 1;
                let row = decode_row(&stored.bytes)?;
                let keep = match &statement.filter {
                    None => true,
                    Some(filter) => {
                        let mut related =
                            |relation: &str| inner.related_row(model, &row, relation);
                        eval(filter, &row, &mut related)
                    }
                };
                if keep {
                    matched.push((*key, row));
                }
            }
            self.metrics.add_rows_scanned(scanned);
        }

        let affected = matched.len() as u64;
        let Some(table) = inner.tables.get_mut(statement.entity) else {
            return Ok(0);
        };

        match &statement.action {
            ResolvedBulkAction::Delete => {
                for (key, _) in &matched {
                    table.rows.remove(key);
                }
            }
            ResolvedBulkAction::Update(assigns) => {
                for (key, mut row) in matched {
                    for assign in assigns {
                        let next = match &assign.op {
                            ResolvedAssignOp::Set(value) => value.clone(),
                            ResolvedAssignOp::Increment(delta) => {
                                incremented(row.get(assign.field), *delta, assign.field)?
                            }
                        };
                        row.insert(assign.field.to_string(), next);
                    }
                    if let Some(stored) = table.rows.get_mut(&key) {
                        stored.bytes = encode_row(&row)?;
                        stored.version += 1;
                    }
                }
            }
        }

        Ok(affected)
    }

    fn acquire_lock(
        &self,
        entity: &'static str,
        rows: &[(Key, u64)],
        tx: TxId,
        timeout: Option<Duration>,
    ) -> Result<(), InternalError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut locks = lock(&self.locks);

        loop {
            let blocked = rows.iter().any(|(key, _)| {
                locks
                    .held
                    .get(&(entity, key.get()))
                    .is_some_and(|holder| *holder != tx)
            });
            if !blocked {
                break;
            }

            match deadline {
                None => {
                    locks = self
                        .lock_released
                        .wait(locks)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    let waited_ms = || {
                        timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                    };
                    if now >= deadline {
                        return Err(InternalError::lock_timeout(entity, waited_ms()));
                    }
                    let (guard, result) = self
                        .lock_released
                        .wait_timeout(locks, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    locks = guard;
                    if result.timed_out() && Instant::now() >= deadline {
                        return Err(InternalError::lock_timeout(entity, waited_ms()));
                    }
                }
            }
        }

        for (key, _) in rows {
            locks.held.insert((entity, key.get()), tx);
        }

        // Revalidate versions under the lock; drift means another writer
        // got in between the read and the lock.
        let inner = lock(&self.inner);
        for (key, expected) in rows {
            let current = inner
                .tables
                .get(entity)
                .and_then(|table| table.rows.get(&key.get()))
                .map(|stored| stored.version);
            if current != Some(*expected) {
                drop(inner);
                for (key, _) in rows {
                    locks.held.remove(&(entity, key.get()));
                }
                self.lock_released.notify_all();
                return Err(InternalError::stale_state(entity, key.to_string()));
            }
        }

        self.metrics.add_locks_acquired(rows.len() as u64);
        Ok(())
    }

    fn read_row(&self, entity: &'static str, key: Key) -> Result<Option<KeyedRow>, InternalError> {
        let inner = lock(&self.inner);
        let Some(stored) = inner
            .tables
            .get(entity)
            .and_then(|table| table.rows.get(&key.get()))
        else {
            return Ok(None);
        };
        Ok(Some(KeyedRow {
            key,
            version: stored.version,
            row: decode_row(&stored.bytes)?,
        }))
    }

    fn write_row(
        &self,
        entity: &'static str,
        key: Key,
        row: RowData,
    ) -> Result<(), InternalError> {
        if !key.is_set() {
            return Err(InternalError::store_internal(format!(
                "write to {entity} with unset key"
            )));
        }

        let bytes = encode_row(&row)?;
        let mut inner = lock(&self.inner);
        inner.model_of(entity)?;
        let table = inner.tables.entry(entity).or_default();
        if key.get() >= table.next_key {
            table.next_key = key.get() + 1;
        }
        match table.rows.get_mut(&key.get()) {
            Some(stored) => {
                stored.bytes = bytes;
                stored.version += 1;
            }
            None => {
                table.rows.insert(key.get(), StoredRow { version: 1, bytes });
            }
        }
        Ok(())
    }

    fn delete_row(&self, entity: &'static str, key: Key) -> Result<bool, InternalError> {
        let mut inner = lock(&self.inner);
        let Some(table) = inner.tables.get_mut(entity) else {
            return Ok(false);
        };
        Ok(table.rows.remove(&key.get()).is_some())
    }
}

fn incremented(
    current: Option<&Value>,
    delta: i64,
    field: &str,
) -> Result<Value, InternalError> {
    match current {
        Some(Value::Int(i)) => i.checked_add(delta).map(Value::Int).ok_or_else(|| {
            InternalError::store_internal(format!("increment overflow on '{field}'"))
        }),
        Some(Value::Uint(u)) => {
            let base = i64::try_from(*u).map_err(|_| {
                InternalError::store_internal(format!("increment overflow on '{field}'"))
            })?;
            let next = base.checked_add(delta).ok_or_else(|| {
                InternalError::store_internal(format!("increment overflow on '{field}'"))
            })?;
            u64::try_from(next).map(Value::Uint).map_err(|_| {
                InternalError::store_internal(format!("increment drove '{field}' negative"))
            })
        }
        _ => Err(InternalError::store_unsupported(format!(
            "cannot increment non-numeric field '{field}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            predicate::{BoundCompare, BoundPredicate, CompareOp, FieldPath},
            store::ResolvedAssign,
        },
        test_fixtures::{Member, Team},
        traits::{EntityKind, Path},
    };

    fn store() -> MemoryStore {
        let store = MemoryStore::new(Arc::new(Metrics::default()));
        store.register_model(Member::MODEL);
        store.register_model(Team::MODEL);
        store
    }

    fn seed_member(store: &MemoryStore, username: &str, age: u32) -> Key {
        let key = store.next_key(Member::PATH).expect("key");
        let mut member = Member::new(username, age);
        member.id = key;
        store
            .write_row(Member::PATH, key, member.to_row())
            .expect("write");
        key
    }

    fn age_over(age: u64) -> BoundPredicate {
        BoundPredicate::Compare(BoundCompare {
            path: FieldPath::direct("age"),
            op: CompareOp::Gt,
            value: Value::Uint(age),
        })
    }

    #[test]
    fn execute_filters_sorts_and_windows() {
        let store = store();
        for i in 1..=5 {
            seed_member(&store, &format!("member{i}"), 10 * i);
        }

        let mut query = ResolvedQuery::of(Member::PATH);
        query.filter = Some(age_over(10));
        query.order = vec![SortKey {
            field: "username".to_string(),
            direction: Direction::Desc,
        }];

        let out = store
            .execute(
                &query,
                Some(&Window {
                    offset: 0,
                    limit: Some(3),
                }),
            )
            .expect("execute");

        let names: Vec<&Value> = out
            .rows
            .iter()
            .map(|keyed| keyed.row.get("username").expect("field"))
            .collect();
        assert_eq!(
            names,
            vec![
                &Value::from("member5"),
                &Value::from("member4"),
                &Value::from("member3")
            ]
        );
    }

    #[test]
    fn count_matches_filter_not_window() {
        let store = store();
        for age in [10, 19, 20, 21, 40] {
            seed_member(&store, &format!("m{age}"), age);
        }

        let mut query = ResolvedQuery::of(Member::PATH);
        query.filter = Some(age_over(19));

        assert_eq!(store.count(&query).expect("count"), 3);
    }

    #[test]
    fn bulk_increment_bumps_versions() {
        let store = store();
        for age in [10, 19, 20, 21, 40] {
            seed_member(&store, &format!("m{age}"), age);
        }

        let statement = ResolvedBulk {
            entity: Member::PATH,
            filter: Some(BoundPredicate::Not(Box::new(BoundPredicate::Compare(
                BoundCompare {
                    path: FieldPath::direct("age"),
                    op: CompareOp::Lt,
                    value: Value::Uint(20),
                },
            )))),
            action: ResolvedBulkAction::Update(vec![ResolvedAssign {
                field: "age",
                op: ResolvedAssignOp::Increment(1),
            }]),
        };

        assert_eq!(store.execute_bulk(&statement).expect("bulk"), 3);

        let mut query = ResolvedQuery::of(Member::PATH);
        query.filter = Some(age_over(20));
        let out = store.execute(&query, None).expect("execute");
        assert_eq!(out.rows.len(), 3);
        assert!(out.rows.iter().all(|keyed| keyed.version == 2));
    }

    #[test]
    fn increment_overflow_is_an_error_not_a_panic() {
        let err = incremented(Some(&Value::Int(i64::MAX)), 1, "age").expect_err("overflow");
        assert!(err.to_string().contains("overflow"));

        let err = incremented(Some(&Value::Uint(0)), -1, "age").expect_err("negative");
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn stale_version_is_rejected_by_lock_acquisition() {
        let store = store();
        let key = seed_member(&store, "locked", 30);

        let tx = store.begin();
        let err = store
            .acquire_lock(Member::PATH, &[(key, 7)], tx, Some(Duration::from_millis(10)))
            .expect_err("version drift");
        assert!(err.is_stale_state());
        store.rollback(tx);
    }

    #[test]
    fn contended_lock_times_out() {
        let store = store();
        let key = seed_member(&store, "locked", 30);

        let holder = store.begin();
        store
            .acquire_lock(Member::PATH, &[(key, 1)], holder, None)
            .expect("first lock");

        let waiter = store.begin();
        let err = store
            .acquire_lock(
                Member::PATH,
                &[(key, 1)],
                waiter,
                Some(Duration::from_millis(25)),
            )
            .expect_err("contended");
        assert!(err.is_lock_timeout());

        store.commit(holder);
        store
            .acquire_lock(Member::PATH, &[(key, 1)], waiter, Some(Duration::from_millis(25)))
            .expect("lock after release");
        store.commit(waiter);
    }

    #[test]
    fn simulated_latency_trips_the_deadline() {
        let store = store();
        seed_member(&store, "slow", 1);
        store.set_query_delay(Some(Duration::from_millis(50)));

        let mut query = ResolvedQuery::of(Member::PATH);
        query.timeout = Some(Duration::from_millis(10));

        let err = store.execute(&query, None).expect_err("deadline");
        assert!(err.is_query_timeout());

        query.timeout = Some(Duration::from_millis(100));
        assert!(store.execute(&query, None).is_ok());
    }
}
