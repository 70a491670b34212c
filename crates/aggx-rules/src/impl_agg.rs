//! # Stream Aggregate Implementation Rule
//!
//! Processes input rows in a single pass, detecting group boundaries from the sorted
//! order. When the group-by columns change, the current group is finalized and emitted.
//!
//! **Cost trade-off**: O(n) CPU + O(1) memory (only the current group's accumulators).
//! Cheaper than hash aggregation but requires input sorted on the group-by columns.
//!
//! ## Alternatives
//!
//! - Child already ascending on the grouping columns and dense: one aggregate directly
//!   over the child.
//! - Otherwise: one aggregate over a sort enforcer supplying the required collation.
//!   A child sorted descending on the keys is re-sorted, because the aggregate
//!   advertises ascending output and emits groups in input order.
//!
//! Either way the node is single-phase and carries a cardinality reduction hint
//! computed from the estimator, which the executor may use to size its output.

use crate::enforcer::enforce_collation;
use aggx_core::expr::OperatorPhase;
use aggx_core::plan::PlanRef;
use aggx_core::rule::{LogicalAggregate, OptContext, Rule};
use aggx_core::stats::{derive_aggregate_rows, RowCountEstimator};
use aggx_core::stream_agg::StreamAggPrel;
use std::sync::Arc;
use tracing::debug;

/// Implement a logical aggregate as a streaming aggregate.
pub struct ImplStreamAggregateRule;

impl ImplStreamAggregateRule {
    /// Input for the aggregate: the child itself, or the child under a sort.
    fn input_for(logical: &LogicalAggregate, child: &PlanRef) -> Option<PlanRef> {
        let required = StreamAggPrel::required_collation(&logical.group_set);
        match enforce_collation(child, &required) {
            Ok(input) => Some(input),
            Err(e) => {
                debug!("Cannot enforce {} on {} {}: {}", required, child.name(), child.id(), e);
                None
            }
        }
    }
}

/// Estimated output rows over input rows for `logical` reading `input`.
pub fn reduction_hint(
    logical: &LogicalAggregate,
    input: &PlanRef,
    estimator: &dyn RowCountEstimator,
) -> f32 {
    let input_rows = estimator.row_count(input);
    if !input_rows.is_finite() || input_rows <= 0.0 {
        return 1.0;
    }
    let ndvs: Vec<Option<f64>> = logical
        .group_set
        .iter()
        .map(|col| estimator.column_ndv(input, col))
        .collect();
    let sets = logical.grouping_sets.as_ref().map_or(1, Vec::len);
    (derive_aggregate_rows(input_rows, &ndvs, sets) / input_rows) as f32
}

impl Rule for ImplStreamAggregateRule {
    fn name(&self) -> &str {
        "ImplStreamAggregate"
    }

    fn apply(&self, logical: &LogicalAggregate, child: &PlanRef, ctx: &OptContext) -> Vec<PlanRef> {
        let Some(input) = Self::input_for(logical, child) else {
            return vec![];
        };
        let hint = reduction_hint(logical, &input, ctx.estimator);
        match StreamAggPrel::new(
            Arc::clone(&input),
            logical.group_set.clone(),
            logical.grouping_sets.clone(),
            logical.aggregate_calls.clone(),
            OperatorPhase::Single,
        ) {
            Ok(agg) => {
                let agg = agg.with_reduction_hint(hint);
                debug!(
                    "Rule '{}' built {} over {} {}",
                    self.name(),
                    agg,
                    input.name(),
                    input.id()
                );
                vec![Arc::new(agg.into())]
            }
            Err(e) => {
                debug!(
                    "Rule '{}' skipped {} {}: {}",
                    self.name(),
                    input.name(),
                    input.id(),
                    e
                );
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggx_core::expr::{AggFunc, AggregateCall, DataType, Field, GroupSet, Schema};
    use aggx_core::plan::{PhysicalPlan, ScanPrel};
    use aggx_core::properties::{Collation, FieldCollation};
    use aggx_core::stats::{ColumnStatistics, Statistics, StatsRowCountEstimator};

    fn orders(collation: Collation) -> PlanRef {
        let schema = Schema::new(vec![
            Field::new("o_custkey", DataType::Int64),
            Field::new("o_orderstatus", DataType::Utf8),
            Field::new("o_totalprice", DataType::Decimal),
        ]);
        let stats = Statistics::new(1500.0, 36_000.0)
            .with_column(0, ColumnStatistics::new(100.0, 0.0))
            .with_column(1, ColumnStatistics::new(3.0, 0.0));
        Arc::new(ScanPrel::new("orders", schema, stats).sorted_by(collation).into())
    }

    fn by_customer() -> LogicalAggregate {
        LogicalAggregate::new(
            GroupSet::new(vec![0]).unwrap(),
            vec![AggregateCall::new(AggFunc::Sum, vec![2], DataType::Decimal)],
        )
    }

    fn apply(logical: &LogicalAggregate, child: &PlanRef) -> Vec<PlanRef> {
        let ctx = OptContext {
            estimator: &StatsRowCountEstimator,
        };
        ImplStreamAggregateRule.apply(logical, child, &ctx)
    }

    #[test]
    fn test_direct_over_sorted_child() {
        let child = orders(Collation::new(vec![FieldCollation::asc(0), FieldCollation::desc(1)]));
        let out = apply(&by_customer(), &child);
        assert_eq!(out.len(), 1);
        let agg = out[0].as_stream_agg().unwrap();
        assert_eq!(agg.child().id(), child.id());
        assert_eq!(agg.phase(), OperatorPhase::Single);
        // 100 customers out of 1500 orders.
        assert!((agg.cardinality_reduction() - 100.0 / 1500.0).abs() < 1e-6);
    }

    #[test]
    fn test_descending_child_is_resorted() {
        let child = orders(Collation::new(vec![FieldCollation::desc(0)]));
        let out = apply(&by_customer(), &child);
        assert_eq!(out.len(), 1);
        let agg = out[0].as_stream_agg().unwrap();
        match agg.child().as_ref() {
            PhysicalPlan::Sort(sort) => {
                assert_eq!(sort.collation, Collation::ascending([0]));
                assert_eq!(sort.child.id(), child.id());
            }
            other => panic!("expected a sort under the aggregate, got {}", other.name()),
        }
        assert_eq!(out[0].properties().collation, Collation::ascending([0]));
    }

    #[test]
    fn test_enforced_over_unsorted_child() {
        let child = orders(Collation::empty());
        let logical = LogicalAggregate::new(GroupSet::new(vec![1, 0]).unwrap(), vec![]);
        let out = apply(&logical, &child);
        assert_eq!(out.len(), 1);
        let agg = out[0].as_stream_agg().unwrap();
        match agg.child().as_ref() {
            PhysicalPlan::Sort(sort) => {
                assert_eq!(sort.collation, Collation::ascending([1, 0]));
                assert_eq!(sort.child.id(), child.id());
            }
            other => panic!("expected a sort under the aggregate, got {}", other.name()),
        }
        // 3 * 100 groups out of 1500 rows.
        assert!((agg.cardinality_reduction() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_alternative_is_skipped() {
        let child = orders(Collation::ascending([0]));
        let logical = LogicalAggregate::new(
            GroupSet::new(vec![0]).unwrap(),
            vec![AggregateCall::new(AggFunc::Max, vec![], DataType::Int64)],
        );
        assert!(apply(&logical, &child).is_empty());

        let bad_key = LogicalAggregate::new(GroupSet::new(vec![9]).unwrap(), vec![]);
        assert!(apply(&bad_key, &child).is_empty());
    }

    #[test]
    fn test_hint_for_global_aggregate() {
        let child = orders(Collation::empty());
        let global = LogicalAggregate::new(GroupSet::empty(), vec![AggregateCall::count_star()]);
        let out = apply(&global, &child);
        assert_eq!(out.len(), 1);
        // No ordering needed, so no sort.
        assert_eq!(out[0].as_stream_agg().unwrap().child().id(), child.id());
        assert!((reduction_hint(&global, &child, &StatsRowCountEstimator) - 1.0 / 1500.0).abs() < 1e-6);
    }
}
