///
/// QueryHints
///
/// Declared execution hints for one method. `read_only` is a no-write
/// contract: entities loaded under it are attached untracked, so
/// mutating them and flushing persists nothing. `entries` are opaque
/// store hints forwarded verbatim. By default hints apply to the
/// content query only; `for_counting` extends them to the associated
/// count query of a counted-page method.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryHints {
    pub read_only: bool,
    pub for_counting: bool,
    pub entries: &'static [(&'static str, &'static str)],
}

impl QueryHints {
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            read_only: true,
            for_counting: false,
            entries: &[],
        }
    }

    #[must_use]
    pub const fn counting(mut self) -> Self {
        self.for_counting = true;
        self
    }

    #[must_use]
    pub const fn with_entries(mut self, entries: &'static [(&'static str, &'static str)]) -> Self {
        self.entries = entries;
        self
    }

    /// Hints as applied to one execution scope.
    #[must_use]
    pub(crate) fn applied(&self, scope: HintScope) -> AppliedHints {
        match scope {
            HintScope::Counting if !self.for_counting => AppliedHints::default(),
            HintScope::Content | HintScope::Counting => AppliedHints {
                read_only: self.read_only,
                entries: self
                    .entries
                    .iter()
                    .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                    .collect(),
            },
        }
    }
}

///
/// HintScope
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum HintScope {
    Content,
    Counting,
}

///
/// AppliedHints
/// Hints resolved for one store round trip.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppliedHints {
    pub read_only: bool,
    pub entries: Vec<(String, String)>,
}
