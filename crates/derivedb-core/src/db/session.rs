//! Module: db::session
//! Responsibility: the unit-of-work. Tracks loaded entities, dirty-checks
//! them at flush, caches prefetched relation rows, and scopes one store
//! transaction. Does not own: query planning or result shaping.

use crate::{
    db::{
        predicate::{BoundCompare, BoundPredicate, CompareOp, FieldPath},
        store::{KeyedRow, ResolvedQuery, TxId},
        Db,
    },
    error::InternalError,
    model::RelationKind,
    traits::EntityKind,
    types::Key,
    value::{RowData, Value},
};
use chrono::{DateTime, Utc};
use std::{
    any::Any,
    collections::HashMap,
};

///
/// Tracked
///
/// One working-set entry: the live entity (type-erased), the row
/// snapshot it was loaded or last flushed as, and its store version.
/// Read-only entries are never flushed.
///

struct Tracked {
    entity: Box<dyn Any + Send>,
    loaded: RowData,
    version: u64,
    read_only: bool,
    to_row: fn(&(dyn Any + Send)) -> Option<RowData>,
    touch: fn(&mut (dyn Any + Send), DateTime<Utc>) -> bool,
}

fn row_of<E: EntityKind>(any: &(dyn Any + Send)) -> Option<RowData> {
    any.downcast_ref::<E>().map(EntityKind::to_row)
}

fn touch_of<E: EntityKind>(any: &mut (dyn Any + Send), now: DateTime<Utc>) -> bool {
    match any.downcast_mut::<E>() {
        Some(entity) => {
            entity.touch(now, false);
            true
        }
        None => false,
    }
}

///
/// Session
///
/// A unit-of-work over one `Db`. Dropping an unfinished session rolls
/// its transaction back, releasing any locks it still holds.
///

pub struct Session {
    db: Db,
    tx: TxId,
    working: HashMap<(&'static str, Key), Tracked>,
    /// Prefetched or previously loaded relation rows, by target entity
    /// path and key. Owning-side navigation is satisfied from here
    /// before touching the store.
    related_rows: HashMap<(&'static str, u64), KeyedRow>,
    /// Prefetched inverse associations: content (entity, relation, key)
    /// to the target keys that point back at it.
    inverse_index: HashMap<(&'static str, &'static str, u64), Vec<Key>>,
    finished: bool,
}

impl Session {
    pub(crate) fn new(db: Db) -> Self {
        let tx = db.store().begin();
        Self {
            db,
            tx,
            working: HashMap::new(),
            related_rows: HashMap::new(),
            inverse_index: HashMap::new(),
            finished: false,
        }
    }

    #[must_use]
    pub(crate) const fn tx(&self) -> TxId {
        self.tx
    }

    #[must_use]
    pub(crate) const fn db(&self) -> &Db {
        &self.db
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist an entity and attach it to the working set.
    ///
    /// An unset key is assigned from the entity's sequence; timestamps
    /// are touched. The stored row is written through immediately so
    /// subsequent queries in any session observe it.
    pub fn save<E: EntityKind>(&mut self, mut entity: E) -> Result<E, InternalError> {
        let created = !entity.key().is_set();
        if created {
            entity.set_key(self.db.store().next_key(E::PATH)?);
        }
        entity.touch(Utc::now(), created);

        let key = entity.key();
        let row = entity.to_row();
        self.db.store().write_row(E::PATH, key, row.clone())?;
        let version = self
            .db
            .store()
            .read_row(E::PATH, key)?
            .map_or(1, |keyed| keyed.version);

        self.working.insert(
            (E::PATH, key),
            Tracked {
                entity: Box::new(entity.clone()),
                loaded: row,
                version,
                read_only: false,
                to_row: row_of::<E>,
                touch: touch_of::<E>,
            },
        );
        Ok(entity)
    }

    /// Load one entity by key, working set first.
    pub fn find<E: EntityKind>(&mut self, key: Key) -> Result<Option<E>, InternalError> {
        if let Some(tracked) = self.working.get(&(E::PATH, key)) {
            let entity = tracked
                .entity
                .downcast_ref::<E>()
                .ok_or_else(|| working_set_mismatch(E::PATH, key))?;
            return Ok(Some(entity.clone()));
        }

        let Some(keyed) = self.db.store().read_row(E::PATH, key)? else {
            return Ok(None);
        };
        self.attach_loaded(&keyed, false).map(Some)
    }

    /// Mutable view of a tracked entity, for in-place modification
    /// ahead of a flush.
    pub fn working_mut<E: EntityKind>(&mut self, key: Key) -> Option<&mut E> {
        self.working
            .get_mut(&(E::PATH, key))
            .and_then(|tracked| tracked.entity.downcast_mut::<E>())
    }

    /// Remove one entity, from the working set and the store.
    pub fn delete<E: EntityKind>(&mut self, key: Key) -> Result<bool, InternalError> {
        self.working.remove(&(E::PATH, key));
        self.db.store().delete_row(E::PATH, key)
    }

    /// Write every dirty, non-read-only entity back to the store.
    pub fn flush(&mut self) -> Result<(), InternalError> {
        let now = Utc::now();
        let store = self.db.store();
        for (&(entity_path, key), tracked) in &mut self.working {
            if tracked.read_only {
                continue;
            }
            let current = (tracked.to_row)(tracked.entity.as_ref())
                .ok_or_else(|| working_set_mismatch(entity_path, key))?;
            if current == tracked.loaded {
                continue;
            }

            if !(tracked.touch)(tracked.entity.as_mut(), now) {
                return Err(working_set_mismatch(entity_path, key));
            }
            let touched = (tracked.to_row)(tracked.entity.as_ref())
                .ok_or_else(|| working_set_mismatch(entity_path, key))?;

            store.write_row(entity_path, key, touched.clone())?;
            tracked.version = store
                .read_row(entity_path, key)?
                .map_or(tracked.version + 1, |keyed| keyed.version);
            tracked.loaded = touched;
        }
        Ok(())
    }

    /// Detach everything. Required after a bulk statement, which writes
    /// past the working set.
    pub fn invalidate_working_set(&mut self) {
        self.working.clear();
        self.related_rows.clear();
        self.inverse_index.clear();
    }

    /// Flush and end the transaction.
    pub fn commit(mut self) -> Result<(), InternalError> {
        self.flush()?;
        self.db.store().commit(self.tx);
        self.finished = true;
        Ok(())
    }

    /// Discard unflushed changes and end the transaction.
    pub fn rollback(mut self) {
        self.db.store().rollback(self.tx);
        self.finished = true;
    }

    // ------------------------------------------------------------------
    // Attachment (executor side)
    // ------------------------------------------------------------------

    /// Decode a loaded row into an entity and attach it.
    ///
    /// A row already in the working set wins: its live entity is
    /// returned instead, so in-session modifications are never clobbered
    /// by a re-read.
    pub(crate) fn attach_loaded<E: EntityKind>(
        &mut self,
        keyed: &KeyedRow,
        read_only: bool,
    ) -> Result<E, InternalError> {
        if let Some(tracked) = self.working.get(&(E::PATH, keyed.key)) {
            let entity = tracked
                .entity
                .downcast_ref::<E>()
                .ok_or_else(|| working_set_mismatch(E::PATH, keyed.key))?;
            return Ok(entity.clone());
        }

        let entity = E::from_row(&keyed.row).map_err(|err| {
            InternalError::session_invariant(format!(
                "row {}/{} does not decode: {err}",
                E::PATH,
                keyed.key
            ))
        })?;

        self.working.insert(
            (E::PATH, keyed.key),
            Tracked {
                entity: Box::new(entity.clone()),
                loaded: keyed.row.clone(),
                version: keyed.version,
                read_only,
                to_row: row_of::<E>,
                touch: touch_of::<E>,
            },
        );
        Ok(entity)
    }

    /// Tracked store versions for a set of loaded keys, as expected by
    /// lock acquisition.
    #[cfg(test)]
    pub(crate) fn versions_of(&self, entity: &'static str, keys: &[Key]) -> Vec<(Key, u64)> {
        keys.iter()
            .map(|key| {
                let version = self
                    .working
                    .get(&(entity, *key))
                    .map_or(0, |tracked| tracked.version);
                (*key, version)
            })
            .collect()
    }

    pub(crate) fn cache_related(&mut self, target: &'static str, rows: &[KeyedRow]) {
        for keyed in rows {
            self.related_rows
                .insert((target, keyed.key.get()), keyed.clone());
        }
    }

    pub(crate) fn cache_inverse(
        &mut self,
        entity: &'static str,
        relation: &'static str,
        content_key: Key,
        targets: Vec<Key>,
    ) {
        self.inverse_index
            .insert((entity, relation, content_key.get()), targets);
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate an owning (to-one) association. Satisfied from the
    /// relation cache when the row was prefetched; otherwise one store
    /// query is issued.
    pub fn relation_one<E: EntityKind, T: EntityKind>(
        &mut self,
        entity: &E,
        relation: &str,
    ) -> Result<Option<T>, InternalError> {
        let model = E::MODEL
            .relation(relation)
            .ok_or_else(|| unknown_relation(E::PATH, relation))?;
        let RelationKind::Owning { fk_field } = model.kind else {
            return Err(InternalError::session_invariant(format!(
                "relation '{relation}' on {} is inverse; navigate it as a collection",
                E::PATH
            )));
        };

        let row = entity.to_row();
        let Some(fk) = row.get(fk_field).and_then(Key::from_value) else {
            return Ok(None);
        };
        if !fk.is_set() {
            return Ok(None);
        }

        if let Some(keyed) = self.related_rows.get(&(model.target, fk.get())) {
            let keyed = keyed.clone();
            return self.attach_loaded(&keyed, false).map(Some);
        }

        let mut query = ResolvedQuery::of(model.target);
        query.filter = Some(key_equals(T::MODEL.primary_key, fk));
        let out = self.db.store().execute(&query, None)?;
        match out.rows.into_iter().next() {
            None => Ok(None),
            Some(keyed) => {
                self.cache_related(model.target, std::slice::from_ref(&keyed));
                self.attach_loaded(&keyed, false).map(Some)
            }
        }
    }

    /// Navigate an inverse (to-many) association, reflecting the owning
    /// side as of the last flush.
    pub fn relation_many<E: EntityKind, T: EntityKind>(
        &mut self,
        entity: &E,
        relation: &str,
    ) -> Result<Vec<T>, InternalError> {
        let model = E::MODEL
            .relation(relation)
            .ok_or_else(|| unknown_relation(E::PATH, relation))?;
        let RelationKind::Inverse { owning_fk } = model.kind else {
            return Err(InternalError::session_invariant(format!(
                "relation '{relation}' on {} is owning; navigate it as a single row",
                E::PATH
            )));
        };

        let key = entity.key();
        if let Some(targets) = self
            .inverse_index
            .get(&(E::PATH, model.name, key.get()))
            .cloned()
        {
            let mut out = Vec::with_capacity(targets.len());
            for target_key in targets {
                if let Some(keyed) = self.related_rows.get(&(model.target, target_key.get())) {
                    let keyed = keyed.clone();
                    out.push(self.attach_loaded(&keyed, false)?);
                }
            }
            return Ok(out);
        }

        let mut query = ResolvedQuery::of(model.target);
        query.filter = Some(key_equals(owning_fk, key));
        let out = self.db.store().execute(&query, None)?;
        out.rows
            .iter()
            .map(|keyed| self.attach_loaded(keyed, false))
            .collect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            self.db.store().rollback(self.tx);
        }
    }
}

fn key_equals(field: &'static str, key: Key) -> BoundPredicate {
    BoundPredicate::Compare(BoundCompare {
        path: FieldPath::direct(field),
        op: CompareOp::Eq,
        value: Value::from(key),
    })
}

fn working_set_mismatch(entity: &'static str, key: Key) -> InternalError {
    InternalError::session_invariant(format!(
        "working-set entry {entity}/{key} does not downcast to its registered type"
    ))
}

fn unknown_relation(entity: &'static str, relation: &str) -> InternalError {
    InternalError::session_invariant(format!("unknown relation '{relation}' on {entity}"))
}
