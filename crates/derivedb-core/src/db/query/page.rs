use thiserror::Error as ThisError;

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

///
/// SortKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

///
/// Sort
///
/// Ordered list of sort keys, applied in declaration order. Ties within
/// the final key are broken by primary key ascending, so repeated calls
/// over an unchanged data set paginate deterministically.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sort(Vec<SortKey>);

impl Sort {
    #[must_use]
    pub const fn unsorted() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn by(field: impl Into<String>, direction: Direction) -> Self {
        Self(vec![SortKey {
            field: field.into(),
            direction,
        }])
    }

    #[must_use]
    pub fn and(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.0.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

///
/// PageRequestError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum PageRequestError {
    #[error("page size must be greater than zero")]
    ZeroSize,
}

///
/// PageRequest
///
/// Immutable pagination window: a row offset, a page size, and the
/// requested sort order.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRequest {
    offset: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    /// Window addressed by page number, the common controller surface.
    pub fn of(page: u64, size: u64, sort: Sort) -> Result<Self, PageRequestError> {
        if size == 0 {
            return Err(PageRequestError::ZeroSize);
        }

        Ok(Self {
            offset: page * size,
            size,
            sort,
        })
    }

    /// Window addressed by raw row offset.
    pub fn at_offset(offset: u64, size: u64, sort: Sort) -> Result<Self, PageRequestError> {
        if size == 0 {
            return Err(PageRequestError::ZeroSize);
        }

        Ok(Self { offset, size, sort })
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Page number derived from the offset.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.offset / self.size
    }

    #[must_use]
    pub const fn sort(&self) -> &Sort {
        &self.sort
    }
}
