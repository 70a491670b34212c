//! # Executable Operator Descriptors
//!
//! Once the search settles on a plan, each physical node is converted into a
//! `PhysicalOperator`: a plain description the execution-plan builder consumes. The
//! conversion is deterministic. Its only side effect is recording which plan node
//! produced which operator in the `PhysicalPlanCreator`, for explain output and
//! diagnostics.
//!
//! The creator may be shared between threads of a build pass: ids come from an atomic
//! counter and the metadata map is append-only behind a lock.

use crate::error::PlanError;
use crate::expr::{AggregateCall, ColumnIndex, OperatorPhase, Schema};
use crate::plan::{PhysicalPlan, PrelId, ScanPrel, SortPrel};
use crate::properties::Collation;
use crate::stream_agg::StreamAggPrel;
use crate::visitor::PrelVisitor;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

/// Identity of an executable operator within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperatorId(pub u32);

/// Executable operator description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PhysicalOperator {
    Scan {
        id: OperatorId,
        table: String,
        schema: Schema,
    },
    Sort {
        id: OperatorId,
        child: Box<PhysicalOperator>,
        collation: Collation,
    },
    StreamingAggregate {
        id: OperatorId,
        child: Box<PhysicalOperator>,
        group_by: Vec<ColumnIndex>,
        aggregate_calls: Vec<AggregateCall>,
        phase: OperatorPhase,
        /// Estimated output rows over input rows, forwarded from planning.
        cardinality_reduction: f32,
    },
}

impl PhysicalOperator {
    pub fn id(&self) -> OperatorId {
        match self {
            PhysicalOperator::Scan { id, .. }
            | PhysicalOperator::Sort { id, .. }
            | PhysicalOperator::StreamingAggregate { id, .. } => *id,
        }
    }

    pub fn child(&self) -> Option<&PhysicalOperator> {
        match self {
            PhysicalOperator::Scan { .. } => None,
            PhysicalOperator::Sort { child, .. }
            | PhysicalOperator::StreamingAggregate { child, .. } => Some(child),
        }
    }
}

/// Build context for converting a plan into operators.
#[derive(Debug, Default)]
pub struct PhysicalPlanCreator {
    next_id: AtomicU32,
    metadata: Mutex<BTreeMap<PrelId, OperatorId>>,
}

impl PhysicalPlanCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_operator_id(&self) -> OperatorId {
        OperatorId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record that `prel` produced `op` and hand `op` back unchanged.
    ///
    /// A plan node converted twice keeps its first operator.
    pub fn add_metadata(&self, prel: PrelId, op: PhysicalOperator) -> PhysicalOperator {
        let mut metadata = self.metadata.lock();
        metadata.entry(prel).or_insert_with(|| op.id());
        trace!("Registered operator {:?} for plan node {}", op.id(), prel);
        op
    }

    pub fn operator_for(&self, prel: PrelId) -> Option<OperatorId> {
        self.metadata.lock().get(&prel).copied()
    }

    /// Snapshot of every plan-node to operator mapping recorded so far.
    pub fn metadata(&self) -> Vec<(PrelId, OperatorId)> {
        self.metadata.lock().iter().map(|(p, o)| (*p, *o)).collect()
    }
}

/// Converts a whole plan into operators, inputs first.
pub struct OperatorConverter<'a> {
    creator: &'a PhysicalPlanCreator,
}

impl<'a> OperatorConverter<'a> {
    pub fn new(creator: &'a PhysicalPlanCreator) -> Self {
        Self { creator }
    }

    pub fn convert(&mut self, plan: &PhysicalPlan) -> Result<PhysicalOperator, PlanError> {
        plan.accept(self, &())
    }
}

impl PrelVisitor for OperatorConverter<'_> {
    type Output = PhysicalOperator;
    type Context = ();
    type Error = PlanError;

    fn visit_prel(&mut self, prel: &PhysicalPlan, _ctx: &()) -> Result<PhysicalOperator, PlanError> {
        Err(PlanError::Unsupported {
            pass: "operator conversion",
            node: prel.name(),
        })
    }

    fn visit_scan(
        &mut self,
        _prel: &PhysicalPlan,
        scan: &ScanPrel,
        _ctx: &(),
    ) -> Result<PhysicalOperator, PlanError> {
        let op = PhysicalOperator::Scan {
            id: self.creator.next_operator_id(),
            table: scan.table.clone(),
            schema: scan.schema.clone(),
        };
        Ok(self.creator.add_metadata(scan.id(), op))
    }

    fn visit_sort(
        &mut self,
        _prel: &PhysicalPlan,
        sort: &SortPrel,
        _ctx: &(),
    ) -> Result<PhysicalOperator, PlanError> {
        let child = self.convert(&sort.child)?;
        let op = PhysicalOperator::Sort {
            id: self.creator.next_operator_id(),
            child: Box::new(child),
            collation: sort.collation.clone(),
        };
        Ok(self.creator.add_metadata(sort.id(), op))
    }

    fn visit_stream_agg(
        &mut self,
        _prel: &PhysicalPlan,
        agg: &StreamAggPrel,
        _ctx: &(),
    ) -> Result<PhysicalOperator, PlanError> {
        let child = self.convert(agg.child())?;
        Ok(agg.to_executable_operator(child, self.creator))
    }
}
