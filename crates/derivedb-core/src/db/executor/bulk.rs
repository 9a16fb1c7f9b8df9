use crate::{
    db::{
        executor::bind_filter,
        predicate::{Operand, ParamSet},
        query::{AssignOp, BulkBody},
        session::Session,
        store::{ResolvedAssign, ResolvedAssignOp, ResolvedBulk, ResolvedBulkAction},
    },
    error::InternalError,
    value::Value,
};

///
/// BulkPlan
///
/// Compiled set-based modification. Executes directly against the
/// store; callers flush before and invalidate the working set after.
///

#[derive(Clone, Debug)]
pub(crate) struct BulkPlan {
    pub name: &'static str,
    pub entity: &'static str,
    pub params: &'static [&'static str],
    pub body: BulkBody,
}

pub(crate) fn execute_bulk(
    session: &mut Session,
    plan: &BulkPlan,
    args: &[Value],
) -> Result<u64, InternalError> {
    let params = ParamSet::new(args, plan.params);

    super::debug_log(
        session,
        format!("Bulk: {} entity={}", plan.name, plan.entity),
    );

    let statement = match &plan.body {
        BulkBody::Delete { filter } => ResolvedBulk {
            entity: plan.entity,
            filter: bind_filter(filter.as_ref(), &params)?,
            action: ResolvedBulkAction::Delete,
        },
        BulkBody::Update {
            filter,
            assignments,
        } => {
            let mut resolved = Vec::with_capacity(assignments.len());
            for assign in assignments {
                let op = match &assign.op {
                    AssignOp::Increment(delta) => ResolvedAssignOp::Increment(*delta),
                    AssignOp::Set(operand) => {
                        ResolvedAssignOp::Set(resolve_operand(operand, &params)?)
                    }
                };
                resolved.push(ResolvedAssign {
                    field: assign.field,
                    op,
                });
            }
            ResolvedBulk {
                entity: plan.entity,
                filter: bind_filter(filter.as_ref(), &params)?,
                action: ResolvedBulkAction::Update(resolved),
            }
        }
    };

    session.db().store().execute_bulk(&statement)
}

fn resolve_operand(operand: &Operand, params: &ParamSet<'_>) -> Result<Value, InternalError> {
    match operand {
        Operand::Value(value) => Ok(value.clone()),
        Operand::Positional(index) => params
            .positional(*index)
            .cloned()
            .map_err(super::bind_failure),
        Operand::Named(name) => params.named(*name).cloned().map_err(super::bind_failure),
    }
}
