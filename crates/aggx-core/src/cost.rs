//! # Cost Model
//!
//! This module defines the cost value and the default cost model for physical nodes.
//!
//! ## Multi-Dimensional Cost
//!
//! A `Cost` keeps four dimensions apart: estimated rows, CPU, disk I/O and network.
//! Costs are compared lexicographically in that order, with an epsilon on equality.
//! `is_le` offers the stricter dominance test (every dimension no worse).
//!
//! ## Cost Accumulation
//!
//! `compute_self_cost` prices one node in isolation. Costs are additive: the
//! cumulative cost of a plan is its root's self cost plus the cumulative costs of its
//! inputs (`cumulative_cost`).
//!
//! ## Costing Modes
//!
//! With `use_default_costing` set, aggregates are priced by the coarse generic
//! aggregation formula, and a streaming aggregate gets a fixed favourable factor on
//! top. Otherwise every operator uses its detailed formula over the shared
//! `CostConstants`.
//!
//! ## Pluggable Design
//!
//! The `CostModel` trait allows replacing the default model. Implementations must be
//! pure: the search may cost alternatives in any order, on any thread.

use crate::expr::{AggFunc, AggregateCall};
use crate::plan::{PhysicalPlan, ScanPrel, SortPrel};
use crate::settings::PlannerSettings;
use crate::stats::{derive_aggregate_rows, RowCountEstimator};
use crate::stream_agg::StreamAggPrel;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::trace;

const EPSILON: f64 = 1e-5;

/// Estimated expense of a plan or operator. Immutable once built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub rows: f64,
    pub cpu: f64,
    pub io: f64,
    pub network: f64,
}

impl Cost {
    pub fn new(rows: f64, cpu: f64, io: f64, network: f64) -> Self {
        Self {
            rows,
            cpu,
            io,
            network,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Smallest non-zero cost, for nodes that are nearly free.
    pub fn tiny() -> Self {
        Self::new(1.0, 1.0, 0.0, 0.0)
    }

    pub fn infinite() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY, f64::INFINITY, f64::INFINITY)
    }

    pub fn is_infinite(&self) -> bool {
        self.rows.is_infinite()
            || self.cpu.is_infinite()
            || self.io.is_infinite()
            || self.network.is_infinite()
    }

    pub fn plus(&self, other: &Cost) -> Cost {
        Cost::new(
            self.rows + other.rows,
            self.cpu + other.cpu,
            self.io + other.io,
            self.network + other.network,
        )
    }

    pub fn multiply_by(&self, factor: f64) -> Cost {
        Cost::new(
            self.rows * factor,
            self.cpu * factor,
            self.io * factor,
            self.network * factor,
        )
    }

    /// True when no dimension of `self` exceeds the same dimension of `other`.
    pub fn is_le(&self, other: &Cost) -> bool {
        self.dims()
            .iter()
            .zip(other.dims().iter())
            .all(|(a, b)| *a <= *b + EPSILON)
    }

    fn dims(&self) -> [f64; 4] {
        [self.rows, self.cpu, self.io, self.network]
    }
}

impl Default for Cost {
    fn default() -> Self {
        Self::zero()
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() < EPSILON
}

/// Epsilon-based equality on every dimension.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.dims()
            .iter()
            .zip(other.dims().iter())
            .all(|(a, b)| approx_eq(*a, *b))
    }
}

/// Lexicographic: rows, then CPU, then I/O, then network.
impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        for (a, b) in self.dims().iter().zip(other.dims().iter()) {
            if approx_eq(*a, *b) {
                continue;
            }
            return a.partial_cmp(b);
        }
        Some(Ordering::Equal)
    }
}

/// Trait for pluggable cost models.
pub trait CostModel: Send + Sync {
    /// Cost of `plan`'s own work, excluding its inputs.
    fn compute_self_cost(&self, plan: &PhysicalPlan, estimator: &dyn RowCountEstimator) -> Cost;

    /// Self cost plus the cumulative cost of every input.
    fn cumulative_cost(&self, plan: &PhysicalPlan, estimator: &dyn RowCountEstimator) -> Cost {
        plan.inputs().fold(self.compute_self_cost(plan, estimator), |acc, input| {
            acc.plus(&self.cumulative_cost(input, estimator))
        })
    }
}

/// Default cost model over `PlannerSettings`.
#[derive(Debug, Clone, Default)]
pub struct DefaultCostModel {
    pub settings: PlannerSettings,
}

impl DefaultCostModel {
    pub fn new(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    /// Streaming aggregate cost given the estimated input rows.
    ///
    /// Detailed mode charges one comparison per grouping column and one function
    /// evaluation per aggregate call, for every input row. The node itself does no I/O
    /// and moves nothing over the network.
    pub fn stream_agg_cost(&self, agg: &StreamAggPrel, input_rows: f64) -> Cost {
        if self.settings.use_default_costing {
            // Only whether any key is present matters once every NDV is unknown.
            let unknown_ndvs: &[Option<f64>] = if agg.group_set().is_empty() {
                &[]
            } else {
                &[None]
            };
            let output_rows =
                derive_aggregate_rows(input_rows, unknown_ndvs, agg.grouping_sets().len());
            return aggregate_base_cost(agg.aggregate_calls(), output_rows)
                .multiply_by(self.settings.stream_agg_default_cost_factor);
        }
        let c = &self.settings.cost;
        let group_fields = agg.group_set().len() as f64;
        let agg_fields = agg.aggregate_calls().len() as f64;
        let cpu = c.compare_cpu * group_fields * input_rows + c.func_cpu * agg_fields * input_rows;
        Cost::new(input_rows, cpu, 0.0, 0.0)
    }

    /// Sorting `rows` rows: n log n comparisons per sort key.
    pub fn sort_cost(&self, sort: &SortPrel, rows: f64) -> Cost {
        let n_log_n = if rows > 1.0 { rows * rows.log2() } else { rows.max(0.0) };
        let keys = sort.collation.len().max(1) as f64;
        Cost::new(rows, self.settings.cost.compare_cpu * keys * n_log_n, 0.0, 0.0)
    }

    /// Reading every field of every row from disk.
    pub fn scan_cost(&self, scan: &ScanPrel) -> Cost {
        let c = &self.settings.cost;
        let rows = scan.stats.row_count.max(0.0);
        let fields = scan.schema.len().max(1) as f64;
        Cost::new(
            rows,
            c.base_cpu * rows * fields,
            c.byte_disk_read * c.avg_field_width * rows * fields,
            0.0,
        )
    }
}

/// Generic aggregation cost: the output rows weighted by the number of calls, with a
/// small surcharge per SUM.
pub fn aggregate_base_cost(calls: &[AggregateCall], output_rows: f64) -> Cost {
    let mut multiplier = 1.0 + 0.125 * calls.len() as f64;
    multiplier += 0.0125 * calls.iter().filter(|c| c.func == AggFunc::Sum).count() as f64;
    Cost::new(output_rows * multiplier, 0.0, 0.0, 0.0)
}

impl CostModel for DefaultCostModel {
    fn compute_self_cost(&self, plan: &PhysicalPlan, estimator: &dyn RowCountEstimator) -> Cost {
        let cost = match plan {
            PhysicalPlan::Scan(scan) => self.scan_cost(scan),
            PhysicalPlan::Sort(sort) => self.sort_cost(sort, estimator.row_count(&sort.child)),
            PhysicalPlan::StreamAgg(agg) => {
                self.stream_agg_cost(agg, estimator.row_count(agg.child()))
            }
        };
        trace!("Self cost of {} {}: {:?}", plan.name(), plan.id(), cost);
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_order() {
        let a = Cost::new(10.0, 500.0, 0.0, 0.0);
        let b = Cost::new(10.0, 600.0, 0.0, 0.0);
        let c = Cost::new(9.0, 10_000.0, 0.0, 0.0);
        assert!(a < b);
        assert!(c < a);
        assert_eq!(a, Cost::new(10.0, 500.0 + 1e-9, 0.0, 0.0));
    }

    #[test]
    fn test_dominance() {
        let a = Cost::new(10.0, 500.0, 0.0, 0.0);
        let b = Cost::new(10.0, 600.0, 1.0, 0.0);
        assert!(a.is_le(&b));
        assert!(!b.is_le(&a));
        assert!(!Cost::new(5.0, 700.0, 0.0, 0.0).is_le(&b));
    }

    #[test]
    fn test_arithmetic() {
        let a = Cost::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(a.plus(&a), Cost::new(2.0, 4.0, 6.0, 8.0));
        assert_eq!(a.multiply_by(0.5), Cost::new(0.5, 1.0, 1.5, 2.0));
        assert!(Cost::infinite().is_infinite());
        assert!(Cost::zero() < Cost::tiny());
    }

    #[test]
    fn test_aggregate_base_cost() {
        let calls = vec![
            AggregateCall::new(AggFunc::Sum, vec![0], crate::expr::DataType::Int64),
            AggregateCall::count_star(),
        ];
        // 1 + 2 * 0.125 + 0.0125
        assert_eq!(aggregate_base_cost(&calls, 100.0), Cost::new(126.25, 0.0, 0.0, 0.0));
        assert_eq!(aggregate_base_cost(&[], 100.0), Cost::new(100.0, 0.0, 0.0, 0.0));
    }
}
