//! Observability: in-memory operation counters for the engine.
//!
//! This module does not access storage internals directly; the store
//! increments counters as it executes.

pub(crate) mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
