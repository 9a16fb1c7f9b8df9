///
/// LockMode
///
/// Row-lock mode applied to a query's result set. `WriteExclusive`
/// locks every returned row against the store for the remainder of the
/// enclosing transaction; contending transactions block until the
/// holder commits or rolls back.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LockMode {
    #[default]
    None,
    WriteExclusive,
}

impl LockMode {
    #[must_use]
    pub const fn is_locking(self) -> bool {
        matches!(self, Self::WriteExclusive)
    }
}
