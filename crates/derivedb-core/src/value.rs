use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

///
/// RowData
///
/// Store-side representation of one persisted row: field name to scalar.
/// This is the unit the store codec encodes at rest.
///

pub type RowData = BTreeMap<String, Value>;

///
/// Value
///
/// Dynamic scalar used for predicate operands, parameter bindings, sort
/// comparison, and projection output.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Rank used to order values of different families deterministically.
    const fn family_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Uint(_) => 2,
            Self::Text(_) => 3,
            Self::Timestamp(_) => 4,
            Self::List(_) => 5,
        }
    }

    /// Total order over values.
    ///
    /// `Int` and `Uint` compare numerically across representations; all
    /// other cross-family comparisons fall back to family rank so sorting
    /// stays deterministic even over mixed columns.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Uint(a), Self::Uint(b)) => a.cmp(b),
            (Self::Int(a), Self::Uint(b)) => cmp_int_uint(*a, *b),
            (Self::Uint(a), Self::Int(b)) => cmp_int_uint(*b, *a).reverse(),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.family_rank().cmp(&other.family_rank()),
        }
    }

    /// Ordered comparison for predicate evaluation.
    ///
    /// Returns `None` when the operands are not comparable (`Null` on
    /// either side, or a cross-family pair outside the numeric bridge);
    /// predicate comparisons against incomparable operands are false.
    #[must_use]
    pub fn partial_order(&self, other: &Self) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if self.family_rank() != other.family_rank() {
            return None;
        }

        Some(self.total_cmp(other))
    }

    /// Equality for predicate evaluation. `Null` never equals anything.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.partial_order(other) == Some(Ordering::Equal)
    }

    /// Membership test against a `List` operand.
    #[must_use]
    pub fn in_set(&self, set: &Self) -> bool {
        match set {
            Self::List(items) => items.iter().any(|item| self.semantic_eq(item)),
            _ => false,
        }
    }
}

const fn cmp_int_uint(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        let a = a as u64;
        if a < b {
            Ordering::Less
        } else if a > b {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Timestamp(v) => write!(f, "@{v}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<V: Into<Self>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_bridge_compares_across_representations() {
        assert_eq!(
            Value::Int(3).partial_order(&Value::Uint(4)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Uint(4).partial_order(&Value::Int(4)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Int(-1).partial_order(&Value::Uint(0)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn null_is_never_comparable() {
        assert_eq!(Value::Null.partial_order(&Value::Null), None);
        assert!(!Value::Null.semantic_eq(&Value::Null));
        assert!(!Value::Int(1).semantic_eq(&Value::Null));
    }

    #[test]
    fn cross_family_order_falls_back_to_rank() {
        assert_eq!(
            Value::Bool(true).total_cmp(&Value::Text("a".into())),
            Ordering::Less
        );
        assert_eq!(Value::Text("a".into()).partial_order(&Value::Int(1)), None);
    }

    #[test]
    fn in_set_matches_list_members_only() {
        let set = Value::from(vec!["aaa", "bbb"]);
        assert!(Value::from("aaa").in_set(&set));
        assert!(!Value::from("ccc").in_set(&set));
        assert!(!Value::from("aaa").in_set(&Value::from("aaa")));
    }
}
