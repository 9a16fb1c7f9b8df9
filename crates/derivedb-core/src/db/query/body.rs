use crate::db::predicate::Predicate;

///
/// Projection
///
/// What an explicit query body selects: whole entities, one scalar
/// column, or a DTO row built from several columns. Paths may traverse
/// one relation hop (`team_name`).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Entity,
    Scalar(&'static str),
    Dto(&'static [&'static str]),
}

///
/// QueryBody
///
/// Explicit query body for a method. When present it takes precedence
/// over name-derived parsing. Filter operands reference declared
/// parameter names; the repository builder enforces the one-to-one
/// correspondence between the two sets at wiring time.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryBody {
    pub filter: Option<Predicate>,
    pub projection: Projection,
    /// Relations the body joins explicitly; overlapping fetch-plan
    /// entries become no-ops for these paths.
    pub joins: &'static [&'static str],
}

impl QueryBody {
    #[must_use]
    pub const fn entity() -> Self {
        Self {
            filter: None,
            projection: Projection::Entity,
            joins: &[],
        }
    }

    #[must_use]
    pub const fn scalar(path: &'static str) -> Self {
        Self {
            filter: None,
            projection: Projection::Scalar(path),
            joins: &[],
        }
    }

    #[must_use]
    pub const fn dto(fields: &'static [&'static str]) -> Self {
        Self {
            filter: None,
            projection: Projection::Dto(fields),
            joins: &[],
        }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = match self.filter.take() {
            Some(existing) => Some(Predicate::And(vec![existing, predicate])),
            None => Some(predicate),
        };
        self
    }

    #[must_use]
    pub const fn joins(mut self, joins: &'static [&'static str]) -> Self {
        self.joins = joins;
        self
    }
}
