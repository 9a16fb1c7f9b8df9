use crate::{
    db::predicate::{BoundCompare, BoundPredicate, Operand, Predicate},
    error::InternalError,
    value::Value,
};
use thiserror::Error as ThisError;

///
/// ParamSet
///
/// One call's argument list, addressable positionally (derived methods)
/// or by declared parameter name (query bodies). Arity is validated at
/// repository build time, so misses here are invariant violations.
///

pub struct ParamSet<'a> {
    args: &'a [Value],
    names: &'a [&'static str],
}

impl<'a> ParamSet<'a> {
    #[must_use]
    pub const fn new(args: &'a [Value], names: &'a [&'static str]) -> Self {
        Self { args, names }
    }

    pub fn positional(&self, index: usize) -> Result<&Value, BindError> {
        self.args.get(index).ok_or(BindError::MissingPositional {
            index,
            supplied: self.args.len(),
        })
    }

    pub fn named(&self, name: &'static str) -> Result<&Value, BindError> {
        let index = self
            .names
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or(BindError::UnknownName { name })?;
        self.positional(index)
    }
}

///
/// BindError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum BindError {
    #[error("parameter slot {index} has no argument ({supplied} supplied)")]
    MissingPositional { index: usize, supplied: usize },

    #[error("named parameter '{name}' is not declared by the method")]
    UnknownName { name: &'static str },
}

impl From<BindError> for InternalError {
    fn from(err: BindError) -> Self {
        Self::query_invariant(err.to_string())
    }
}

/// Bind every parameter slot in `predicate` from `params`.
///
/// Positional slots consume arguments by declared slot index; named slots
/// resolve through the method's declared parameter names.
pub(crate) fn bind(
    predicate: &Predicate,
    params: &ParamSet<'_>,
) -> Result<BoundPredicate, BindError> {
    match predicate {
        Predicate::And(children) => Ok(BoundPredicate::And(
            children
                .iter()
                .map(|child| bind(child, params))
                .collect::<Result<_, _>>()?,
        )),
        Predicate::Or(children) => Ok(BoundPredicate::Or(
            children
                .iter()
                .map(|child| bind(child, params))
                .collect::<Result<_, _>>()?,
        )),
        Predicate::Not(inner) => Ok(BoundPredicate::Not(Box::new(bind(inner, params)?))),
        Predicate::Compare(leaf) => {
            let value = match &leaf.operand {
                Operand::Value(value) => value.clone(),
                Operand::Positional(index) => params.positional(*index)?.clone(),
                Operand::Named(name) => params.named(name)?.clone(),
            };

            Ok(BoundPredicate::Compare(BoundCompare {
                path: leaf.path,
                op: leaf.op,
                value,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::predicate::{CompareOp, FieldPath};

    fn template() -> Predicate {
        Predicate::And(vec![
            Predicate::compare(
                FieldPath::direct("username"),
                CompareOp::Eq,
                Operand::Positional(0),
            ),
            Predicate::compare(
                FieldPath::direct("age"),
                CompareOp::Gt,
                Operand::Positional(1),
            ),
        ])
    }

    #[test]
    fn positional_binding_follows_slot_order() {
        let args = [Value::from("aaa"), Value::from(15_u64)];
        let params = ParamSet::new(&args, &[]);
        let bound = bind(&template(), &params).expect("binding should succeed");

        let BoundPredicate::And(children) = bound else {
            panic!("expected conjunction");
        };
        let BoundPredicate::Compare(first) = &children[0] else {
            panic!("expected leaf");
        };
        assert_eq!(first.value, Value::from("aaa"));
    }

    #[test]
    fn missing_argument_is_reported_with_slot() {
        let args = [Value::from("aaa")];
        let params = ParamSet::new(&args, &[]);
        let err = bind(&template(), &params).expect_err("one argument short");
        assert_eq!(
            err,
            BindError::MissingPositional {
                index: 1,
                supplied: 1
            }
        );
    }

    #[test]
    fn named_binding_resolves_through_declared_names() {
        let predicate = Predicate::compare(
            FieldPath::direct("username"),
            CompareOp::Eq,
            Operand::Named("username"),
        );
        let args = [Value::from("bbb")];
        let params = ParamSet::new(&args, &["username"]);
        let bound = bind(&predicate, &params).expect("binding should succeed");
        let BoundPredicate::Compare(leaf) = bound else {
            panic!("expected leaf");
        };
        assert_eq!(leaf.value, Value::from("bbb"));
    }

    #[test]
    fn undeclared_name_is_an_error() {
        let predicate = Predicate::compare(
            FieldPath::direct("username"),
            CompareOp::Eq,
            Operand::Named("nope"),
        );
        let params = ParamSet::new(&[], &["username"]);
        let err = bind(&predicate, &params).expect_err("unknown name");
        assert_eq!(err, BindError::UnknownName { name: "nope" });
    }
}
