use crate::model::EntityModel;
use thiserror::Error as ThisError;

///
/// FetchPlan
///
/// Relations to materialize eagerly, in the same store round trip as the
/// content rows. Named plans resolve against the entity model; inline
/// plans list relation paths directly. Fetch plans apply to content
/// queries only, never to bulk statements.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchPlan {
    Named(&'static str),
    Paths(&'static [&'static str]),
}

///
/// FetchPlanError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum FetchPlanError {
    #[error("entity '{entity}' declares no fetch plan named '{name}'")]
    UnknownPlan {
        entity: &'static str,
        name: &'static str,
    },

    #[error("entity '{entity}' has no relation '{path}'")]
    UnknownRelation {
        entity: &'static str,
        path: &'static str,
    },
}

impl FetchPlan {
    /// Resolve to concrete relation paths, validated against the model.
    pub fn resolve(
        &self,
        model: &'static EntityModel,
    ) -> Result<Vec<&'static str>, FetchPlanError> {
        let paths: &[&'static str] = match self {
            Self::Named(name) => {
                let plan = model
                    .fetch_plan(name)
                    .ok_or(FetchPlanError::UnknownPlan {
                        entity: model.entity_name,
                        name,
                    })?;
                plan.paths
            }
            Self::Paths(paths) => paths,
        };

        for path in paths {
            if model.relation(path).is_none() {
                return Err(FetchPlanError::UnknownRelation {
                    entity: model.entity_name,
                    path,
                });
            }
        }

        Ok(paths.to_vec())
    }
}

/// Merge plan paths with a query body's explicit joins.
///
/// A relation already forced by the body is a no-op for the plan: the
/// path appears once, in join-then-plan order.
pub(crate) fn merge_paths(
    joins: &[&'static str],
    plan_paths: &[&'static str],
) -> Vec<&'static str> {
    let mut merged: Vec<&'static str> = joins.to_vec();
    for path in plan_paths {
        if !merged.contains(path) {
            merged.push(path);
        }
    }
    merged
}
