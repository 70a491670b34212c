//! # HTTP Route Handlers
//!
//! This module defines the Axum route handlers for the planner service.
//!
//! ## Planning Pipeline
//!
//! `POST /aggregate/plan` runs one implementation step for a logical aggregate:
//!
//! 1. **Validate**: Check the input description and the aggregate's column references.
//! 2. **Implement**: Apply every registered rule to the input scan.
//! 3. **Select**: Cost the alternatives and keep the cheapest one that satisfies the
//!    required properties.
//! 4. **Convert**: Turn the winner into its executable operator tree.
//!
//! ## Error Handling
//!
//! Errors are returned as HTTP status codes with descriptive messages:
//! - 400 Bad Request: malformed input (bad column references, invalid statistics)
//! - 422 Unprocessable Entity: no alternative satisfies the required properties
//! - 500 Internal Server Error: the winner failed validation or conversion

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use aggx_core::cost::{Cost, DefaultCostModel};
use aggx_core::error::PlanError;
use aggx_core::expr::{ColumnIndex, Schema};
use aggx_core::operator::{OperatorConverter, PhysicalOperator, PhysicalPlanCreator};
use aggx_core::plan::{PlanRef, ScanPrel};
use aggx_core::properties::{Collation, Distribution, PhysicalPropertySet, RowEncoding};
use aggx_core::rule::{LogicalAggregate, OptContext};
use aggx_core::search::{choose_best, cost_alternatives};
use aggx_core::settings::PlannerSettings;
use aggx_core::stats::{ColumnStatistics, Statistics, StatsRowCountEstimator};
use aggx_core::visitor::{ExplainVisitor, PlanValidator};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Request body for `POST /aggregate/plan`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAggregateRequest {
    /// The already-implemented input the aggregate reads.
    pub input: InputInfo,
    pub aggregate: LogicalAggregate,
    /// Properties the parent requires of the aggregate's output.
    #[serde(default)]
    pub required: PhysicalPropertySet,
    /// Per-request settings; the server's settings are used when absent.
    #[serde(default)]
    pub settings: Option<PlannerSettings>,
}

/// A table scan feeding the aggregate, with its statistics and physical properties.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputInfo {
    pub table: String,
    pub schema: Schema,
    /// Estimated row count from table statistics.
    pub row_count: f64,
    /// Estimated total size in bytes.
    #[serde(default)]
    pub size_bytes: f64,
    /// Per-column statistics (NDV, null fraction).
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    /// Order the table is stored in.
    #[serde(default)]
    pub collation: Collation,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub encoding: RowEncoding,
}

/// Per-column statistics for cost estimation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub index: ColumnIndex,
    /// Number of distinct values (NDV).
    pub ndv: f64,
    /// Fraction of values that are NULL (0.0 to 1.0).
    #[serde(default)]
    pub null_fraction: f64,
}

/// One costed alternative.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeInfo {
    pub id: u64,
    pub explain: String,
    pub cost: Cost,
    /// Whether the alternative's properties satisfy the request's requirement.
    pub feasible: bool,
}

/// Response body for `POST /aggregate/plan`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAggregateResponse {
    pub alternatives: Vec<AlternativeInfo>,
    pub winner: WinnerInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerInfo {
    pub id: u64,
    pub explain: String,
    pub cost: Cost,
    pub operator: PhysicalOperator,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /settings: the settings applied to requests that carry none.
pub async fn settings(State(state): State<Arc<AppState>>) -> Json<PlannerSettings> {
    Json(state.config.settings)
}

/// POST /aggregate/plan: implement, cost and convert a logical aggregate.
pub async fn plan_aggregate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanAggregateRequest>,
) -> Result<Json<PlanAggregateResponse>, (StatusCode, String)> {
    let settings = req.settings.unwrap_or(state.config.settings);
    let input = build_input(&req.input)?;
    req.aggregate
        .validate(input.schema())
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid aggregate: {}", e)))?;

    let cost_model = DefaultCostModel::new(settings);
    let estimator = StatsRowCountEstimator;
    let ctx = OptContext {
        estimator: &estimator,
    };
    let candidates = state.rule_registry.implement(&req.aggregate, &input, &ctx);
    debug!(
        "Planning aggregate over '{}': {} alternatives",
        req.input.table,
        candidates.len()
    );

    let alternatives = cost_alternatives(&candidates, &cost_model, &estimator)
        .into_iter()
        .map(|w| AlternativeInfo {
            id: w.plan.id().as_u64(),
            explain: ExplainVisitor::explain(&w.plan),
            feasible: req.required.satisfied_by(&w.plan.properties()),
            cost: w.cost,
        })
        .collect();

    let winner = choose_best(&candidates, &req.required, &cost_model, &estimator).map_err(|e| match e {
        PlanError::NoFeasiblePlan => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("No alternative satisfies {:?}", req.required),
        ),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    PlanValidator::validate(&winner.plan).map_err(internal)?;
    let creator = PhysicalPlanCreator::new();
    let operator = OperatorConverter::new(&creator)
        .convert(&winner.plan)
        .map_err(internal)?;

    Ok(Json(PlanAggregateResponse {
        alternatives,
        winner: WinnerInfo {
            id: winner.plan.id().as_u64(),
            explain: ExplainVisitor::explain(&winner.plan),
            cost: winner.cost,
            operator,
        },
    }))
}

fn internal(e: PlanError) -> (StatusCode, String) {
    warn!("Winner failed a plan pass: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Turn the request's input description into a scan node.
fn build_input(info: &InputInfo) -> Result<PlanRef, (StatusCode, String)> {
    let bad = |msg: String| (StatusCode::BAD_REQUEST, msg);
    if info.schema.is_empty() {
        return Err(bad("Input schema has no columns".to_string()));
    }
    if !info.row_count.is_finite() || info.row_count < 0.0 {
        return Err(bad(format!("Invalid row count: {}", info.row_count)));
    }

    let mut stats = Statistics::new(info.row_count, info.size_bytes);
    for col in &info.columns {
        info.schema
            .check_index("column statistics", col.index)
            .map_err(|e| bad(e.to_string()))?;
        if !col.ndv.is_finite() || col.ndv < 0.0 {
            return Err(bad(format!("Invalid NDV for column {}: {}", col.index, col.ndv)));
        }
        if !(0.0..=1.0).contains(&col.null_fraction) {
            return Err(bad(format!(
                "Invalid null fraction for column {}: {}",
                col.index, col.null_fraction
            )));
        }
        stats = stats.with_column(col.index, ColumnStatistics::new(col.ndv, col.null_fraction));
    }
    for key in info.collation.fields() {
        info.schema
            .check_index("input collation", key.field)
            .map_err(|e| bad(e.to_string()))?;
    }
    if let Distribution::Hash(keys) = &info.distribution {
        for key in keys {
            info.schema
                .check_index("hash distribution", *key)
                .map_err(|e| bad(e.to_string()))?;
        }
    }

    let scan = ScanPrel::new(info.table.clone(), info.schema.clone(), stats)
        .sorted_by(info.collation.clone())
        .distributed_by(info.distribution.clone())
        .with_encoding(info.encoding);
    Ok(Arc::new(scan.into()))
}
