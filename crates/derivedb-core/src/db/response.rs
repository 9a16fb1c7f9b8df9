//! Module: db::response
//! Responsibility: shaping executed results into the declared return
//! contract of a method, and the page/slice containers themselves.
//! Does not own: query execution or entity attachment.

use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    value::Value,
};

///
/// Page
///
/// Counted page: a window of content plus the total element count of
/// the unwindowed query, from which page arithmetic derives.
///

#[derive(Clone, Debug)]
pub struct Page<T> {
    content: Vec<T>,
    total_elements: u64,
    offset: u64,
    size: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub(crate) const fn new(content: Vec<T>, total_elements: u64, offset: u64, size: u64) -> Self {
        Self {
            content,
            total_elements,
            offset,
            size,
        }
    }

    #[must_use]
    pub fn content(&self) -> &[T] {
        &self.content
    }

    #[must_use]
    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// Total page count, rounding the final partial page up.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.size)
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.offset / self.size
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.offset == 0
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.offset + self.size < self.total_elements
    }

    /// Transform the content while keeping the page geometry.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            offset: self.offset,
            size: self.size,
        }
    }
}

///
/// SlicePage
///
/// Uncounted slice: a window of content plus a has-next flag derived
/// from over-fetching one row, never from a count query.
///

#[derive(Clone, Debug)]
pub struct SlicePage<T> {
    content: Vec<T>,
    offset: u64,
    size: u64,
    has_next: bool,
}

impl<T> SlicePage<T> {
    #[must_use]
    pub(crate) const fn new(content: Vec<T>, offset: u64, size: u64, has_next: bool) -> Self {
        Self {
            content,
            offset,
            size,
            has_next,
        }
    }

    #[must_use]
    pub fn content(&self) -> &[T] {
        &self.content
    }

    #[must_use]
    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.offset / self.size
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.offset == 0
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.has_next
    }
}

///
/// ResultEnvelope
///
/// Shaped outcome of one repository call, one variant per declared
/// return shape. Accessors enforce the contract: asking for a shape the
/// call did not produce is a response-origin invariant violation.
///

#[derive(Debug)]
pub enum ResultEnvelope<E> {
    One(E),
    Optional(Option<E>),
    Many(Vec<E>),
    Page(Page<E>),
    Slice(SlicePage<E>),
    Scalars(Vec<Value>),
    Projections(Vec<Vec<Value>>),
    Count(u64),
    Exists(bool),
    Affected(u64),
}

impl<E> ResultEnvelope<E> {
    fn shape_error(&self, wanted: &str) -> InternalError {
        InternalError::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Response,
            format!("result is {}, not {wanted}", self.label()),
        )
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::One(_) => "one",
            Self::Optional(_) => "optional",
            Self::Many(_) => "many",
            Self::Page(_) => "page",
            Self::Slice(_) => "slice",
            Self::Scalars(_) => "scalars",
            Self::Projections(_) => "projections",
            Self::Count(_) => "count",
            Self::Exists(_) => "exists",
            Self::Affected(_) => "affected",
        }
    }

    pub fn into_one(self) -> Result<E, InternalError> {
        match self {
            Self::One(entity) => Ok(entity),
            other => Err(other.shape_error("one")),
        }
    }

    pub fn into_optional(self) -> Result<Option<E>, InternalError> {
        match self {
            Self::Optional(entity) => Ok(entity),
            Self::One(entity) => Ok(Some(entity)),
            other => Err(other.shape_error("optional")),
        }
    }

    pub fn into_many(self) -> Result<Vec<E>, InternalError> {
        match self {
            Self::Many(entities) => Ok(entities),
            other => Err(other.shape_error("many")),
        }
    }

    pub fn into_page(self) -> Result<Page<E>, InternalError> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(other.shape_error("page")),
        }
    }

    pub fn into_slice(self) -> Result<SlicePage<E>, InternalError> {
        match self {
            Self::Slice(slice) => Ok(slice),
            other => Err(other.shape_error("slice")),
        }
    }

    pub fn into_scalars(self) -> Result<Vec<Value>, InternalError> {
        match self {
            Self::Scalars(values) => Ok(values),
            other => Err(other.shape_error("scalars")),
        }
    }

    pub fn into_projections(self) -> Result<Vec<Vec<Value>>, InternalError> {
        match self {
            Self::Projections(rows) => Ok(rows),
            other => Err(other.shape_error("projections")),
        }
    }

    pub fn into_count(self) -> Result<u64, InternalError> {
        match self {
            Self::Count(count) => Ok(count),
            other => Err(other.shape_error("count")),
        }
    }

    pub fn into_exists(self) -> Result<bool, InternalError> {
        match self {
            Self::Exists(exists) => Ok(exists),
            other => Err(other.shape_error("exists")),
        }
    }

    pub fn into_affected(self) -> Result<u64, InternalError> {
        match self {
            Self::Affected(affected) => Ok(affected),
            other => Err(other.shape_error("affected")),
        }
    }
}

/// One-entity shaping over a loaded list.
pub(crate) fn exactly_one<E>(
    mut entities: Vec<E>,
    context: &'static str,
) -> Result<E, InternalError> {
    match entities.len() {
        1 => Ok(entities.remove(0)),
        0 => Err(InternalError::new(
            ErrorClass::NotFound,
            ErrorOrigin::Response,
            format!("{context}: no matching row"),
        )),
        n => Err(InternalError::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Response,
            format!("{context}: expected one row, got {n}"),
        )),
    }
}

/// Zero-or-one shaping over a loaded list.
pub(crate) fn at_most_one<E>(
    mut entities: Vec<E>,
    context: &'static str,
) -> Result<Option<E>, InternalError> {
    match entities.len() {
        0 => Ok(None),
        1 => Ok(Some(entities.remove(0))),
        n => Err(InternalError::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Response,
            format!("{context}: expected at most one row, got {n}"),
        )),
    }
}
