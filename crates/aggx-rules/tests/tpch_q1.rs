//! End-to-end planning of the TPC-H Q1 aggregation.
//!
//! ```sql
//! SELECT l_returnflag, l_linestatus,
//!        SUM(l_quantity), SUM(l_extendedprice), AVG(l_discount), COUNT(*)
//! FROM lineitem
//! GROUP BY l_returnflag, l_linestatus
//! ORDER BY l_returnflag, l_linestatus
//! ```
//!
//! The lineitem group has two physical alternatives: a heap scan with no ordering and
//! a scan of a copy clustered on (returnflag, linestatus). The rule is applied to each,
//! the candidates are costed, and the winner is converted into an operator tree.

use aggx_core::cost::{CostModel, DefaultCostModel};
use aggx_core::expr::*;
use aggx_core::operator::{OperatorConverter, PhysicalOperator, PhysicalPlanCreator};
use aggx_core::plan::{PhysicalPlan, PlanRef, ScanPrel};
use aggx_core::properties::{Collation, FieldCollation, PhysicalPropertySet};
use aggx_core::rule::{LogicalAggregate, OptContext};
use aggx_core::search::{choose_best, cost_alternatives};
use aggx_core::settings::PlannerSettings;
use aggx_core::stats::{ColumnStatistics, Statistics, StatsRowCountEstimator};
use aggx_core::visitor::{ExplainVisitor, PlanValidator};
use aggx_rules::default_rule_registry;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const LINEITEM_ROWS: f64 = 6_001_215.0;

fn lineitem_schema() -> Schema {
    Schema::new(vec![
        Field::new("l_quantity", DataType::Decimal),
        Field::new("l_extendedprice", DataType::Decimal),
        Field::new("l_discount", DataType::Decimal),
        Field::new("l_returnflag", DataType::Utf8).not_null(),
        Field::new("l_linestatus", DataType::Utf8).not_null(),
    ])
}

fn lineitem_stats() -> Statistics {
    Statistics::new(LINEITEM_ROWS, LINEITEM_ROWS * 40.0)
        .with_column(3, ColumnStatistics::new(3.0, 0.0))
        .with_column(4, ColumnStatistics::new(2.0, 0.0))
}

fn heap_scan() -> PlanRef {
    Arc::new(ScanPrel::new("tpch.lineitem", lineitem_schema(), lineitem_stats()).into())
}

fn clustered_scan() -> PlanRef {
    Arc::new(
        ScanPrel::new("tpch.lineitem_by_flag", lineitem_schema(), lineitem_stats())
            .sorted_by(Collation::ascending([3, 4]))
            .into(),
    )
}

fn q1() -> LogicalAggregate {
    LogicalAggregate::new(
        GroupSet::new(vec![3, 4]).unwrap(),
        vec![
            AggregateCall::new(AggFunc::Sum, vec![0], DataType::Decimal).named("sum_qty"),
            AggregateCall::new(AggFunc::Sum, vec![1], DataType::Decimal).named("sum_base_price"),
            AggregateCall::new(AggFunc::Avg, vec![2], DataType::Decimal).named("avg_disc"),
            AggregateCall::count_star().named("count_order"),
        ],
    )
}

fn implement(logical: &LogicalAggregate, children: &[PlanRef]) -> Vec<PlanRef> {
    let registry = default_rule_registry();
    let ctx = OptContext {
        estimator: &StatsRowCountEstimator,
    };
    children
        .iter()
        .flat_map(|child| registry.implement(logical, child, &ctx))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn clustered_scan_beats_sorting_the_heap() {
    let settings = PlannerSettings::default();
    let candidates = implement(&q1(), &[heap_scan(), clustered_scan()]);
    assert_eq!(candidates.len(), 2);

    let model = DefaultCostModel::new(settings);
    let winner = choose_best(&candidates, &PhysicalPropertySet::any(), &model, &StatsRowCountEstimator).unwrap();
    let agg = winner.plan.as_stream_agg().unwrap();
    assert!(matches!(agg.child().as_ref(), PhysicalPlan::Scan(scan) if scan.table == "tpch.lineitem_by_flag"));

    // The heap alternative pays for the sort.
    let costed = cost_alternatives(&candidates, &model, &StatsRowCountEstimator);
    let loser = costed.iter().find(|w| w.plan.id() != winner.plan.id()).unwrap();
    assert!(winner.cost.cpu < loser.cost.cpu);
    assert!(winner.cost.is_le(&loser.cost));
}

#[test]
fn order_by_is_satisfied_by_the_aggregate() {
    let candidates = implement(&q1(), &[heap_scan()]);
    // ORDER BY l_returnflag, l_linestatus: output columns 0 and 1.
    let required = PhysicalPropertySet::with_collation(Collation::ascending([0, 1]));
    let model = DefaultCostModel::default();
    let winner = choose_best(&candidates, &required, &model, &StatsRowCountEstimator).unwrap();
    assert_eq!(winner.plan.properties().collation, Collation::ascending([0, 1]));
    assert_eq!(PlanValidator::validate(&winner.plan).unwrap(), 3);
}

#[test]
fn descending_cluster_is_resorted_for_order_by() {
    let reverse_clustered: PlanRef = Arc::new(
        ScanPrel::new("tpch.lineitem_by_flag_desc", lineitem_schema(), lineitem_stats())
            .sorted_by(Collation::new(vec![FieldCollation::desc(3), FieldCollation::desc(4)]))
            .into(),
    );
    let candidates = implement(&q1(), &[reverse_clustered.clone()]);
    let required = PhysicalPropertySet::with_collation(Collation::ascending([0, 1]));
    let winner = choose_best(&candidates, &required, &DefaultCostModel::default(), &StatsRowCountEstimator).unwrap();

    let agg = winner.plan.as_stream_agg().unwrap();
    match agg.child().as_ref() {
        PhysicalPlan::Sort(sort) => {
            assert_eq!(sort.collation, Collation::ascending([3, 4]));
            assert_eq!(sort.child.id(), reverse_clustered.id());
        }
        other => panic!("descending input reached the aggregate unsorted: {}", other.name()),
    }
    assert!(ExplainVisitor::explain(&winner.plan).contains("Sort(collation=[$3 ASC, $4 ASC])"));
}

#[test]
fn winner_converts_to_operator_tree() {
    let candidates = implement(&q1(), &[heap_scan()]);
    let plan = &candidates[0];

    let creator = PhysicalPlanCreator::new();
    let op = OperatorConverter::new(&creator).convert(plan).unwrap();
    let PhysicalOperator::StreamingAggregate {
        group_by,
        aggregate_calls,
        cardinality_reduction,
        child,
        ..
    } = &op
    else {
        panic!("expected a streaming aggregate, got {op:?}");
    };
    assert_eq!(group_by, &vec![3, 4]);
    assert_eq!(aggregate_calls, &q1().aggregate_calls);
    // 3 flags x 2 statuses out of ~6M rows.
    assert!((*cardinality_reduction as f64 - 6.0 / LINEITEM_ROWS).abs() < 1e-9);
    assert!(matches!(child.as_ref(), PhysicalOperator::Sort { .. }));
    assert_eq!(creator.metadata().len(), 3);

    assert_eq!(
        ExplainVisitor::explain(plan),
        "StreamAgg(group={$3, $4}, phase=OnePhase, sum_qty=SUM($0), sum_base_price=SUM($1), \
         avg_disc=AVG($2), count_order=COUNT(*))\n  Sort(collation=[$3 ASC, $4 ASC])\n    Scan(table=tpch.lineitem)\n"
    );
}

#[test]
fn default_costing_scales_the_aggregate_only() {
    let detailed = PlannerSettings::default();
    let coarse = PlannerSettings::default_costing();
    let plan = implement(&q1(), &[clustered_scan()]).remove(0);

    let detailed_cost = DefaultCostModel::new(detailed).compute_self_cost(&plan, &StatsRowCountEstimator);
    let coarse_cost = DefaultCostModel::new(coarse).compute_self_cost(&plan, &StatsRowCountEstimator);
    assert!(coarse_cost < detailed_cost);
    assert_eq!(coarse_cost.cpu, 0.0);

    // The scan is priced the same in both modes.
    let scan = plan.inputs().next().unwrap();
    assert_eq!(
        DefaultCostModel::new(detailed).compute_self_cost(scan, &StatsRowCountEstimator),
        DefaultCostModel::new(coarse).compute_self_cost(scan, &StatsRowCountEstimator),
    );
}

#[test]
fn rollup_keeps_its_grouping_sets() {
    let group = GroupSet::new(vec![3, 4]).unwrap();
    let rollup = q1().with_grouping_sets(vec![
        group.clone(),
        GroupSet::new(vec![3]).unwrap(),
        GroupSet::empty(),
    ]);
    let candidates = implement(&rollup, &[clustered_scan()]);
    let agg = candidates[0].as_stream_agg().unwrap();
    assert_eq!(agg.grouping_sets().len(), 3);
    // 6 groups per set, three sets.
    assert!((agg.cardinality_reduction() as f64 - 18.0 / LINEITEM_ROWS).abs() < 1e-9);

    let malformed = q1().with_grouping_sets(vec![GroupSet::new(vec![0]).unwrap()]);
    assert!(implement(&malformed, &[clustered_scan()]).is_empty());
}
