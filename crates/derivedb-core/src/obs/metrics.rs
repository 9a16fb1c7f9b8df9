use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

///
/// Metrics
///
/// Ephemeral, in-memory counters for store round trips and row traffic.
/// One instance per `Db`; counters are monotonically increasing until
/// reset. The fetch-plan round-trip contract is asserted against
/// `content_queries`.
///

#[derive(Debug, Default)]
pub struct Metrics {
    /// Content-query round trips (`Store::execute`).
    pub content_queries: AtomicU64,
    /// Count-query round trips (`Store::count`). Slices must not move this.
    pub count_queries: AtomicU64,
    /// Set-based update/delete statements.
    pub bulk_statements: AtomicU64,
    /// Rows evaluated against a predicate during scans.
    pub rows_scanned: AtomicU64,
    /// Rows returned to the engine.
    pub rows_loaded: AtomicU64,
    /// Write-exclusive row locks acquired.
    pub locks_acquired: AtomicU64,
}

impl Metrics {
    pub(crate) fn incr_content_queries(&self) {
        self.content_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_count_queries(&self) {
        self.count_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_bulk_statements(&self) {
        self.bulk_statements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_rows_scanned(&self, n: u64) {
        self.rows_scanned.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_rows_loaded(&self, n: u64) {
        self.rows_loaded.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_locks_acquired(&self, n: u64) {
        self.locks_acquired.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            content_queries: self.content_queries.load(Ordering::Relaxed),
            count_queries: self.count_queries.load(Ordering::Relaxed),
            bulk_statements: self.bulk_statements.load(Ordering::Relaxed),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            locks_acquired: self.locks_acquired.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.content_queries.store(0, Ordering::Relaxed);
        self.count_queries.store(0, Ordering::Relaxed);
        self.bulk_statements.store(0, Ordering::Relaxed);
        self.rows_scanned.store(0, Ordering::Relaxed);
        self.rows_loaded.store(0, Ordering::Relaxed);
        self.locks_acquired.store(0, Ordering::Relaxed);
    }
}

///
/// MetricsSnapshot
/// Point-in-time copy of the counters, cheap to compare in tests.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub content_queries: u64,
    pub count_queries: u64,
    pub bulk_statements: u64,
    pub rows_scanned: u64,
    pub rows_loaded: u64,
    pub locks_acquired: u64,
}
