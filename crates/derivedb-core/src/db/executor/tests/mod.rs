//! End-to-end scenarios: repositories declared against the member/team
//! fixtures, executed through sessions against the in-process store.

mod fetch;
mod pagination;

use crate::{
    db::{store::MemoryStore, Db},
    obs::Metrics,
    test_fixtures::{Member, Team},
};
use std::sync::Arc;

pub(crate) fn db() -> Db {
    let db = Db::new();
    db.register::<Member>();
    db.register::<Team>();
    db
}

/// A db plus direct handles on its concrete store and metrics, for
/// tests that observe applied hints or inject latency.
pub(crate) fn db_with_memory() -> (Db, Arc<MemoryStore>, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::default());
    let store = Arc::new(MemoryStore::new(Arc::clone(&metrics)));
    let db = Db::with_store(store.clone(), Arc::clone(&metrics));
    db.register::<Member>();
    db.register::<Team>();
    (db, store, metrics)
}

pub(crate) fn seed_members(db: &Db, rows: &[(&str, u32)]) {
    let mut session = db.session();
    for (name, age) in rows {
        session.save(Member::new(name, *age)).expect("seed member");
    }
    session.commit().expect("seed commit");
}
