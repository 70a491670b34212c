//! # Winner Selection
//!
//! The full search engine lives outside this crate. What it needs from here is the
//! last step of implementing a group: given the physical alternatives generated for
//! one logical operator, keep those whose provided properties satisfy the parent's
//! requirement and pick the cheapest by cumulative cost.
//!
//! Selection is order-independent: ties on cost are broken by the lower `PrelId`, so
//! costing the same candidates in any order yields the same winner.

use crate::cost::{Cost, CostModel};
use crate::error::PlanError;
use crate::plan::PlanRef;
use crate::properties::PhysicalPropertySet;
use crate::stats::RowCountEstimator;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};

/// A costed candidate plan.
#[derive(Debug, Clone)]
pub struct Winner {
    pub plan: PlanRef,
    pub cost: Cost,
}

/// Cost every candidate and return all of them with their cumulative cost, in input
/// order. Infeasible candidates are included; callers filter as they need.
pub fn cost_alternatives(
    candidates: &[PlanRef],
    cost_model: &dyn CostModel,
    estimator: &dyn RowCountEstimator,
) -> Vec<Winner> {
    candidates
        .iter()
        .map(|plan| Winner {
            plan: Arc::clone(plan),
            cost: cost_model.cumulative_cost(plan, estimator),
        })
        .collect()
}

/// Pick the cheapest candidate that satisfies `required`.
pub fn choose_best(
    candidates: &[PlanRef],
    required: &PhysicalPropertySet,
    cost_model: &dyn CostModel,
    estimator: &dyn RowCountEstimator,
) -> Result<Winner, PlanError> {
    let mut best: Option<Winner> = None;
    for candidate in cost_alternatives(candidates, cost_model, estimator) {
        if !required.satisfied_by(&candidate.plan.properties()) {
            trace!(
                "Skipping {} {}: provided properties do not satisfy {:?}",
                candidate.plan.name(),
                candidate.plan.id(),
                required
            );
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => match candidate.cost.partial_cmp(&current.cost) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => candidate.plan.id() < current.plan.id(),
                _ => false,
            },
        };
        if better {
            best = Some(candidate);
        }
    }

    match best {
        Some(winner) => {
            debug!(
                "Chose {} {} with cost {:?} out of {} candidates",
                winner.plan.name(),
                winner.plan.id(),
                winner.cost,
                candidates.len()
            );
            Ok(winner)
        }
        None => Err(PlanError::NoFeasiblePlan),
    }
}
