use crate::{
    model::EntityModel,
    types::Key,
    value::{RowData, Value},
};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use thiserror::Error as ThisError;

///
/// Path
/// Fully-qualified type path for dispatch and diagnostics.
///

pub trait Path {
    const PATH: &'static str;
}

///
/// EntityDecodeError
/// A stored row could not be projected back onto the entity type.
///

#[derive(Debug, ThisError)]
pub enum EntityDecodeError {
    #[error("entity {entity}: missing field '{field}'")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("entity {entity}: field '{field}' has unexpected shape: {value}")]
    WrongShape {
        entity: &'static str,
        field: &'static str,
        value: Value,
    },
}

///
/// EntityKind
///
/// Fully runtime-bound entity: identity, model, and row projection.
/// This is the maximum entity contract; only code that touches storage
/// or execution should require it.
///

pub trait EntityKind: Path + Clone + Debug + Send + Sized + 'static {
    const MODEL: &'static EntityModel;

    /// Primary key of this instance (`Key::UNSET` before first save).
    fn key(&self) -> Key;

    /// Assign a store-issued primary key. Called once, at first save.
    fn set_key(&mut self, key: Key);

    /// Project this instance into row data for storage and dirty checking.
    fn to_row(&self) -> RowData;

    /// Rebuild an instance from row data.
    fn from_row(row: &RowData) -> Result<Self, EntityDecodeError>;

    /// Lifecycle hook invoked by the session on save (`created == true`)
    /// and on every flushed update. Entities embedding `Stamps` forward
    /// the call; the default is a no-op.
    fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        let _ = (now, created);
    }
}

/// Fetch a required field out of row data during entity decoding.
pub fn require_field<'a>(
    row: &'a RowData,
    entity: &'static str,
    field: &'static str,
) -> Result<&'a Value, EntityDecodeError> {
    row.get(field)
        .ok_or(EntityDecodeError::MissingField { entity, field })
}
