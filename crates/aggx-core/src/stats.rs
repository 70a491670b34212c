//! # Statistics and Cardinality Estimation
//!
//! Row-count estimates feed the cost model. They are planner-time approximations,
//! derived bottom-up from table statistics, never measurements.
//!
//! ## Statistics Hierarchy
//!
//! - **Table-level**: row count and total size in bytes.
//! - **Column-level**: number of distinct values (NDV) and null fraction, keyed by the
//!   column's position in the scan's output.
//!
//! ## Derivation Formulas
//!
//! - **Scan**: the table's row count.
//! - **Sort**: passes its input's row count through.
//! - **Aggregate**: product of the grouping columns' NDVs, capped by the input rows.
//!   When any NDV is unknown, a tenth of the input rows. Floored at 1 and multiplied by
//!   the number of grouping sets. A global aggregate (no grouping columns) produces
//!   exactly one row.

use crate::expr::ColumnIndex;
use crate::plan::PhysicalPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fraction of input rows an aggregate is assumed to keep when NDVs are unknown.
pub const DEFAULT_AGG_REDUCTION: f64 = 0.1;

/// Statistics for a relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    #[serde(default)]
    pub total_size_bytes: f64,
    #[serde(default)]
    pub column_stats: HashMap<ColumnIndex, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnIndex, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(column, stats);
        self
    }
}

/// Per-column statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV).
    pub distinct_count: f64,
    /// Fraction of rows that are NULL [0.0, 1.0].
    #[serde(default)]
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

/// Estimate the output rows of an aggregation.
///
/// `group_ndvs` holds one entry per grouping column, `None` where the NDV is unknown.
pub fn derive_aggregate_rows(
    input_rows: f64,
    group_ndvs: &[Option<f64>],
    grouping_set_count: usize,
) -> f64 {
    if group_ndvs.is_empty() {
        return 1.0;
    }
    let known: Option<Vec<f64>> = group_ndvs.iter().copied().collect();
    let groups = match known {
        Some(ndvs) => ndvs.iter().product::<f64>().min(input_rows),
        None => input_rows * DEFAULT_AGG_REDUCTION,
    };
    groups.max(1.0) * grouping_set_count.max(1) as f64
}

/// Source of row-count estimates for sub-plans.
///
/// Estimates are non-negative and finite; nothing else is assumed about them.
pub trait RowCountEstimator: Send + Sync {
    fn row_count(&self, plan: &PhysicalPlan) -> f64;

    /// NDV of an output column of `plan`, if known.
    fn column_ndv(&self, _plan: &PhysicalPlan, _column: ColumnIndex) -> Option<f64> {
        None
    }
}

/// Estimator deriving row counts from scan statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsRowCountEstimator;

impl RowCountEstimator for StatsRowCountEstimator {
    fn row_count(&self, plan: &PhysicalPlan) -> f64 {
        match plan {
            PhysicalPlan::Scan(scan) => scan.stats.row_count.max(0.0),
            PhysicalPlan::Sort(sort) => self.row_count(&sort.child),
            PhysicalPlan::StreamAgg(agg) => {
                let child = agg.child();
                let ndvs: Vec<Option<f64>> = agg
                    .group_set()
                    .iter()
                    .map(|col| self.column_ndv(child, col))
                    .collect();
                derive_aggregate_rows(self.row_count(child), &ndvs, agg.grouping_sets().len())
            }
        }
    }

    fn column_ndv(&self, plan: &PhysicalPlan, column: ColumnIndex) -> Option<f64> {
        match plan {
            PhysicalPlan::Scan(scan) => scan
                .stats
                .column_stats
                .get(&column)
                .map(|cs| cs.distinct_count),
            PhysicalPlan::Sort(sort) => self.column_ndv(&sort.child, column),
            // Grouping columns come first in the aggregate's output.
            PhysicalPlan::StreamAgg(agg) => agg
                .group_set()
                .columns()
                .get(column)
                .and_then(|input_col| self.column_ndv(agg.child(), *input_col)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_aggregate_is_one_row() {
        assert_eq!(derive_aggregate_rows(1_000_000.0, &[], 1), 1.0);
    }

    #[test]
    fn test_known_ndvs_capped_by_input() {
        assert_eq!(derive_aggregate_rows(1000.0, &[Some(10.0), Some(5.0)], 1), 50.0);
        assert_eq!(derive_aggregate_rows(20.0, &[Some(10.0), Some(5.0)], 1), 20.0);
    }

    #[test]
    fn test_unknown_ndv_falls_back_to_reduction() {
        assert_eq!(derive_aggregate_rows(1000.0, &[Some(10.0), None], 1), 100.0);
        assert_eq!(derive_aggregate_rows(5.0, &[None], 1), 1.0);
    }

    #[test]
    fn test_grouping_sets_multiply() {
        assert_eq!(derive_aggregate_rows(1000.0, &[Some(10.0)], 3), 30.0);
    }
}
