//! # Physical Plan Nodes
//!
//! A physical plan is a tree of immutable nodes shared through `PlanRef`
//! (`Arc<PhysicalPlan>`). Once a node is handed to the search engine it is never
//! mutated: alternative shapes are built as new nodes (see `with_new_inputs`).
//!
//! `PhysicalPlan` is a closed enum of node kinds. Generic passes do not match on it
//! directly; they implement `PrelVisitor` and call `accept`, which dispatches to the
//! node-specific visit method.
//!
//! Every node gets a process-unique `PrelId` when constructed. The build context uses
//! it to record which plan node produced which executable operator.

use crate::error::InvalidStrategyError;
use crate::expr::Schema;
use crate::properties::{
    Collation, Distribution, EncodingContract, PhysicalPropertySet, RowEncoding,
};
use crate::stats::Statistics;
use crate::stream_agg::StreamAggPrel;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, immutable handle to a plan node.
pub type PlanRef = Arc<PhysicalPlan>;

/// Identity of a plan node, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PrelId(u64);

impl PrelId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PrelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Physical plan node kinds.
#[derive(Debug, Clone)]
pub enum PhysicalPlan {
    Scan(ScanPrel),
    Sort(SortPrel),
    StreamAgg(StreamAggPrel),
}

impl PhysicalPlan {
    pub fn id(&self) -> PrelId {
        match self {
            PhysicalPlan::Scan(s) => s.id,
            PhysicalPlan::Sort(s) => s.id,
            PhysicalPlan::StreamAgg(a) => a.id(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhysicalPlan::Scan(_) => "Scan",
            PhysicalPlan::Sort(_) => "Sort",
            PhysicalPlan::StreamAgg(_) => "StreamAgg",
        }
    }

    /// Direct inputs of this node. Each call starts a fresh pass.
    pub fn inputs(&self) -> std::slice::Iter<'_, PlanRef> {
        match self {
            PhysicalPlan::Scan(_) => Default::default(),
            PhysicalPlan::Sort(s) => std::slice::from_ref(&s.child).iter(),
            PhysicalPlan::StreamAgg(a) => a.inputs(),
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            PhysicalPlan::Scan(s) => &s.schema,
            PhysicalPlan::Sort(s) => s.child.schema(),
            PhysicalPlan::StreamAgg(a) => a.schema(),
        }
    }

    /// Properties this node provides to its parent.
    pub fn properties(&self) -> PhysicalPropertySet {
        match self {
            PhysicalPlan::Scan(s) => PhysicalPropertySet {
                collation: s.collation.clone(),
                distribution: s.distribution.clone(),
                encoding: Some(s.encoding),
            },
            PhysicalPlan::Sort(s) => s.properties(),
            PhysicalPlan::StreamAgg(a) => a.properties(),
        }
    }

    pub fn encoding_contract(&self) -> EncodingContract {
        match self {
            PhysicalPlan::Scan(s) => EncodingContract {
                supported_inputs: RowEncoding::ALL,
                output: s.encoding,
            },
            PhysicalPlan::Sort(_) => SortPrel::ENCODING,
            PhysicalPlan::StreamAgg(_) => StreamAggPrel::ENCODING,
        }
    }

    /// Structural copy with replaced inputs. The arity must match.
    pub fn with_new_inputs(&self, inputs: Vec<PlanRef>) -> Result<PlanRef, InvalidStrategyError> {
        let expected = self.inputs().len();
        if inputs.len() != expected {
            return Err(InvalidStrategyError::InputArity {
                expected,
                actual: inputs.len(),
            });
        }
        let mut inputs = inputs.into_iter();
        let plan = match (self, inputs.next()) {
            (PhysicalPlan::Scan(s), _) => PhysicalPlan::Scan(ScanPrel {
                id: PrelId::next(),
                ..s.clone()
            }),
            (PhysicalPlan::Sort(s), Some(child)) => {
                PhysicalPlan::Sort(SortPrel::new(child, s.collation.clone())?)
            }
            (PhysicalPlan::StreamAgg(a), Some(child)) => PhysicalPlan::StreamAgg(a.with_child(child)),
            (_, None) => unreachable!("arity checked above"),
        };
        Ok(Arc::new(plan))
    }

    pub fn as_stream_agg(&self) -> Option<&StreamAggPrel> {
        match self {
            PhysicalPlan::StreamAgg(a) => Some(a),
            _ => None,
        }
    }
}

impl From<ScanPrel> for PhysicalPlan {
    fn from(scan: ScanPrel) -> Self {
        PhysicalPlan::Scan(scan)
    }
}

impl From<SortPrel> for PhysicalPlan {
    fn from(sort: SortPrel) -> Self {
        PhysicalPlan::Sort(sort)
    }
}

impl From<StreamAggPrel> for PhysicalPlan {
    fn from(agg: StreamAggPrel) -> Self {
        PhysicalPlan::StreamAgg(agg)
    }
}

/// Leaf node reading a table.
#[derive(Debug, Clone)]
pub struct ScanPrel {
    pub(crate) id: PrelId,
    pub table: String,
    pub schema: Schema,
    pub collation: Collation,
    pub distribution: Distribution,
    pub encoding: RowEncoding,
    pub stats: Statistics,
}

impl ScanPrel {
    pub fn new(table: impl Into<String>, schema: Schema, stats: Statistics) -> Self {
        Self {
            id: PrelId::next(),
            table: table.into(),
            schema,
            collation: Collation::empty(),
            distribution: Distribution::Any,
            encoding: RowEncoding::Dense,
            stats,
        }
    }

    /// Declare that the table is stored in `collation` order.
    pub fn sorted_by(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn distributed_by(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_encoding(mut self, encoding: RowEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn id(&self) -> PrelId {
        self.id
    }
}

/// Sorts its input by a collation. Also used as the enforcer for a missing ordering.
#[derive(Debug, Clone)]
pub struct SortPrel {
    pub(crate) id: PrelId,
    pub child: PlanRef,
    pub collation: Collation,
}

impl SortPrel {
    /// Sorting buffers every input batch, so any input encoding works; output is
    /// compacted.
    pub const ENCODING: EncodingContract = EncodingContract {
        supported_inputs: RowEncoding::ALL,
        output: RowEncoding::Dense,
    };

    pub fn new(child: PlanRef, collation: Collation) -> Result<Self, InvalidStrategyError> {
        let schema = child.schema();
        for key in collation.fields() {
            schema.check_index("sort key", key.field)?;
        }
        Ok(Self {
            id: PrelId::next(),
            child,
            collation,
        })
    }

    pub fn id(&self) -> PrelId {
        self.id
    }

    pub fn properties(&self) -> PhysicalPropertySet {
        PhysicalPropertySet {
            collation: self.collation.clone(),
            distribution: self.child.properties().distribution,
            encoding: Some(Self::ENCODING.output),
        }
    }
}
