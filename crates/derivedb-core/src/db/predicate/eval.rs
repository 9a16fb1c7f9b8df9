use crate::{
    db::predicate::{BoundCompare, BoundPredicate, CompareOp},
    value::RowData,
};
use std::cmp::Ordering;

/// Evaluate a bound predicate against one row.
///
/// `related` resolves a relation hop for the row under evaluation and
/// returns the related row, if the association is present. Comparisons
/// against missing fields, absent relations, or incomparable operand
/// pairs are false, never errors.
pub fn eval(
    predicate: &BoundPredicate,
    row: &RowData,
    related: &mut dyn FnMut(&str) -> Option<RowData>,
) -> bool {
    match predicate {
        BoundPredicate::And(children) => children.iter().all(|child| eval(child, row, related)),
        BoundPredicate::Or(children) => children.iter().any(|child| eval(child, row, related)),
        BoundPredicate::Not(inner) => !eval(inner, row, related),
        BoundPredicate::Compare(leaf) => eval_compare(leaf, row, related),
    }
}

fn eval_compare(
    leaf: &BoundCompare,
    row: &RowData,
    related: &mut dyn FnMut(&str) -> Option<RowData>,
) -> bool {
    let field_value = match leaf.path.relation {
        None => row.get(leaf.path.field).cloned(),
        Some(relation) => related(relation).and_then(|row| row.get(leaf.path.field).cloned()),
    };
    let Some(field_value) = field_value else {
        return false;
    };

    match leaf.op {
        CompareOp::Eq => field_value.semantic_eq(&leaf.value),
        CompareOp::Ne => field_value
            .partial_order(&leaf.value)
            .is_some_and(|ord| ord != Ordering::Equal),
        CompareOp::Gt => field_value.partial_order(&leaf.value) == Some(Ordering::Greater),
        CompareOp::Lt => field_value.partial_order(&leaf.value) == Some(Ordering::Less),
        CompareOp::In => field_value.in_set(&leaf.value),
    }
}
