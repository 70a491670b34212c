//! # Planner Errors
//!
//! Two classes of failure exist in the aggregation planner:
//!
//! - **`InvalidStrategyError`**: a requested grouping / aggregate-call shape cannot be
//!   realized by a physical strategy. The rule that asked for the alternative simply
//!   drops it; the planning pass continues.
//! - **`PlanError`**: a whole-plan pass (validation, conversion) found something it
//!   cannot process. Construction failures re-surfaced by a pass are wrapped.
//!
//! Structural copies (`with_child`) never return an error: a failure there is a
//! broken invariant and panics with the original error attached.

use crate::expr::ColumnIndex;
use crate::properties::{Collation, RowEncoding};
use thiserror::Error;

/// Construction-time contract violation for a physical strategy node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStrategyError {
    #[error("grouping column {0} appears more than once")]
    DuplicateGroupingColumn(ColumnIndex),

    #[error("{context} references column {index}, but the input has only {width} columns")]
    ColumnOutOfRange {
        context: &'static str,
        index: ColumnIndex,
        width: usize,
    },

    #[error("malformed grouping sets: {0}")]
    MalformedGroupingSets(String),

    #[error("aggregate {function} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("input collation {provided} does not start with grouping columns {required:?}")]
    MissingInputCollation {
        required: Vec<ColumnIndex>,
        provided: Collation,
    },

    #[error("input encoding {0:?} is not supported by this operator")]
    UnsupportedInputEncoding(RowEncoding),

    #[error("expected exactly {expected} input(s), got {actual}")]
    InputArity { expected: usize, actual: usize },
}

/// Failure of a plan-wide pass.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid node {node}: {source}")]
    InvalidNode {
        node: String,
        #[source]
        source: InvalidStrategyError,
    },

    #[error("sort node has an empty collation")]
    EmptySort,

    #[error("{pass} does not handle {node} nodes")]
    Unsupported {
        pass: &'static str,
        node: &'static str,
    },

    #[error("no alternative satisfies the required properties")]
    NoFeasiblePlan,
}
