mod bind;
mod eval;

pub use bind::{BindError, ParamSet};
pub use eval::eval;
pub(crate) use bind::bind;

use crate::model::EntityModel;
use std::fmt;
use thiserror::Error as ThisError;

///
/// FieldPath
///
/// A resolved property path: a direct field, or one relation hop into a
/// related entity's field. Deeper traversal is not supported.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldPath {
    pub relation: Option<&'static str>,
    pub field: &'static str,
}

impl FieldPath {
    #[must_use]
    pub const fn direct(field: &'static str) -> Self {
        Self {
            relation: None,
            field,
        }
    }

    #[must_use]
    pub const fn via(relation: &'static str, field: &'static str) -> Self {
        Self {
            relation: Some(relation),
            field,
        }
    }

    /// Resolve a raw snake_case path against an entity model.
    ///
    /// Tries the whole string as a direct field first, then every split
    /// point as `relation_field`. The relation hop is validated against
    /// the target entity's model via `lookup`.
    pub fn resolve(
        raw: &'static str,
        model: &'static EntityModel,
        lookup: &dyn Fn(&str) -> Option<&'static EntityModel>,
    ) -> Result<Self, PathResolveError> {
        if let Some(field) = model.field(raw) {
            if !field.kind.is_queryable() {
                return Err(PathResolveError::NotQueryable { path: raw });
            }
            return Ok(Self::direct(field.name));
        }

        for (idx, _) in raw.match_indices('_') {
            let (head, tail) = (&raw[..idx], &raw[idx + 1..]);
            let Some(relation) = model.relation(head) else {
                continue;
            };
            let Some(target) = lookup(relation.target) else {
                return Err(PathResolveError::UnknownTarget {
                    path: raw,
                    target: relation.target,
                });
            };
            if let Some(field) = target.field(tail) {
                if !field.kind.is_queryable() {
                    return Err(PathResolveError::NotQueryable { path: raw });
                }
                return Ok(Self::via(relation.name, field.name));
            }
        }

        Err(PathResolveError::UnknownPath { path: raw })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Some(relation) => write!(f, "{relation}.{}", self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

///
/// PathResolveError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum PathResolveError {
    #[error("'{path}' does not resolve to a known property path")]
    UnknownPath { path: &'static str },

    #[error("'{path}' resolves to a non-queryable field")]
    NotQueryable { path: &'static str },

    #[error("'{path}' traverses relation to unregistered entity '{target}'")]
    UnknownTarget {
        path: &'static str,
        target: &'static str,
    },
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    /// Collection-valued operand; true when the field is a member.
    In,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::In => "in",
        };
        write!(f, "{label}")
    }
}

///
/// Operand
///
/// Right-hand side of a comparison: a literal, a positional parameter
/// slot (derived methods), or a named parameter (query bodies).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(crate::value::Value),
    Positional(usize),
    Named(&'static str),
}

///
/// ComparePredicate
/// One comparison leaf.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ComparePredicate {
    pub path: FieldPath,
    pub op: CompareOp,
    pub operand: Operand,
}

///
/// Predicate
///
/// Immutable predicate tree. Built once (at repository construction or
/// from an explicit query body) and bound to arguments per call.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
}

impl Predicate {
    #[must_use]
    pub fn compare(path: FieldPath, op: CompareOp, operand: Operand) -> Self {
        Self::Compare(ComparePredicate { path, op, operand })
    }

    /// Number of parameter slots in declaration order.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::slot_count).sum()
            }
            Self::Not(inner) => inner.slot_count(),
            Self::Compare(leaf) => match leaf.operand {
                Operand::Positional(_) | Operand::Named(_) => 1,
                Operand::Value(_) => 0,
            },
        }
    }

    /// Leaf count, used by the parser contract tests.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::leaf_count).sum()
            }
            Self::Not(inner) => inner.leaf_count(),
            Self::Compare(_) => 1,
        }
    }
}

///
/// BoundCompare / BoundPredicate
///
/// Predicate tree with every operand bound to a concrete value; the only
/// form the store evaluates.
///

#[derive(Clone, Debug, PartialEq)]
pub struct BoundCompare {
    pub path: FieldPath,
    pub op: CompareOp,
    pub value: crate::value::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BoundPredicate {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(BoundCompare),
}
