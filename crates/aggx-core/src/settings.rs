//! # Planner Settings
//!
//! Cost unit constants and costing switches. A `PlannerSettings` value is handed to the
//! cost model when it is built; there is no global table. Every operator formula reads
//! the same `CostConstants`, which is what makes costs of structurally different
//! strategies comparable.

use serde::{Deserialize, Serialize};

/// Multiplier applied to the generic aggregation cost for a streaming aggregate when
/// default costing is on. A hand-tuned bias in favour of not building a hash table.
pub const STREAM_AGG_DEFAULT_COST_FACTOR: f64 = 0.1;

/// Per-unit costs shared by all operator cost formulas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConstants {
    /// Cost of touching one field of one row.
    pub base_cpu: f64,
    /// Cost of one key comparison per row.
    pub compare_cpu: f64,
    /// Cost of evaluating one function per row.
    pub func_cpu: f64,
    /// Cost of reading one byte from disk.
    pub byte_disk_read: f64,
    /// Assumed width of a field in bytes.
    pub avg_field_width: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        let base_cpu = 1.0;
        Self {
            base_cpu,
            compare_cpu: 4.0 * base_cpu,
            func_cpu: 12.0 * base_cpu,
            byte_disk_read: 32.0 * base_cpu,
            avg_field_width: 8.0,
        }
    }
}

/// Settings that influence costing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Use the coarse generic formulas instead of per-operator detailed costing.
    pub use_default_costing: bool,
    pub stream_agg_default_cost_factor: f64,
    pub cost: CostConstants,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            use_default_costing: false,
            stream_agg_default_cost_factor: STREAM_AGG_DEFAULT_COST_FACTOR,
            cost: CostConstants::default(),
        }
    }
}

impl PlannerSettings {
    pub fn default_costing() -> Self {
        Self {
            use_default_costing: true,
            ..Self::default()
        }
    }

    pub fn with_cost_constants(mut self, cost: CostConstants) -> Self {
        self.cost = cost;
        self
    }
}
