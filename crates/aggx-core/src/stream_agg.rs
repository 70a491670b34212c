//! # Streaming Aggregate
//!
//! `StreamAggPrel` is the order-dependent physical strategy for a grouping aggregation.
//! It consumes input already sorted on the grouping columns and emits one row per
//! group as soon as the group key changes.
//!
//! **Trade-off**: O(rows) CPU with memory for the in-flight group only, against hash
//! aggregation's O(distinct groups) memory and no ordering requirement. The sort is
//! assumed to be paid for by the input (a sorted scan, a preceding merge, or a Sort
//! enforcer whose cost the search engine accounts for separately).
//!
//! ## Contract
//!
//! - Grouping columns are distinct and exist in the input schema.
//! - The input's collation starts with the grouping columns, in order. Directions are
//!   not checked.
//! - Output schema: grouping columns first (in grouping order), then one column per
//!   aggregate call. The node therefore provides an ascending collation on output
//!   columns `0..|group_set|`.
//! - Input must be dense; output is always dense.
//!
//! Grouping columns, grouping sets, aggregate calls and phase are fixed at
//! construction. `with_child` shares them with the copy.

use crate::error::InvalidStrategyError;
use crate::expr::{AggregateCall, GroupSet, OperatorPhase, Schema};
use crate::operator::{PhysicalOperator, PhysicalPlanCreator};
use crate::plan::{PlanRef, PrelId};
use crate::properties::{
    Collation, Distribution, EncodingContract, PhysicalPropertySet, RowEncoding,
};
use ordered_float::OrderedFloat;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StreamAggPrel {
    id: PrelId,
    child: PlanRef,
    group_set: GroupSet,
    grouping_sets: Arc<[GroupSet]>,
    aggregate_calls: Arc<[AggregateCall]>,
    phase: OperatorPhase,
    schema: Schema,
    cardinality_reduction: OrderedFloat<f32>,
}

impl StreamAggPrel {
    pub const ENCODING: EncodingContract = EncodingContract {
        supported_inputs: RowEncoding::DEFAULT,
        output: RowEncoding::Dense,
    };

    /// Build a streaming aggregate over `child`.
    ///
    /// `grouping_sets` defaults to `[group_set]` when `None`.
    pub fn new(
        child: PlanRef,
        group_set: GroupSet,
        grouping_sets: Option<Vec<GroupSet>>,
        aggregate_calls: Vec<AggregateCall>,
        phase: OperatorPhase,
    ) -> Result<Self, InvalidStrategyError> {
        let grouping_sets = match grouping_sets {
            Some(sets) => {
                validate_grouping_sets(&group_set, &sets)?;
                sets
            }
            None => vec![group_set.clone()],
        };
        Self::build(
            child,
            group_set,
            grouping_sets.into(),
            aggregate_calls.into(),
            phase,
        )
    }

    fn build(
        child: PlanRef,
        group_set: GroupSet,
        grouping_sets: Arc<[GroupSet]>,
        aggregate_calls: Arc<[AggregateCall]>,
        phase: OperatorPhase,
    ) -> Result<Self, InvalidStrategyError> {
        let input = child.schema();
        for col in group_set.iter() {
            input.check_index("grouping column", col)?;
        }
        for call in aggregate_calls.iter() {
            call.validate(input)?;
        }

        let input_props = child.properties();
        let input_encoding = input_props.encoding.unwrap_or_default();
        if !Self::ENCODING.accepts(input_encoding) {
            return Err(InvalidStrategyError::UnsupportedInputEncoding(input_encoding));
        }
        if !input_props.collation.has_prefix_columns(group_set.columns()) {
            return Err(InvalidStrategyError::MissingInputCollation {
                required: group_set.columns().to_vec(),
                provided: input_props.collation,
            });
        }

        let mut fields: Vec<_> = group_set
            .iter()
            .filter_map(|col| input.field(col).cloned())
            .collect();
        let group_count = fields.len();
        fields.extend(
            aggregate_calls
                .iter()
                .enumerate()
                .map(|(i, call)| call.output_field(group_count + i)),
        );

        Ok(Self {
            id: PrelId::next(),
            child,
            group_set,
            grouping_sets,
            aggregate_calls,
            phase,
            schema: Schema::new(fields),
            cardinality_reduction: OrderedFloat(1.0),
        })
    }

    /// Attach the planning-time estimate of output rows over input rows.
    pub fn with_reduction_hint(mut self, reduction: f32) -> Self {
        self.cardinality_reduction = OrderedFloat(reduction);
        self
    }

    /// Copy of this node reading from `child`.
    ///
    /// # Panics
    ///
    /// If `child` cannot host this aggregate (wrong schema or missing collation).
    /// Callers substitute equivalent subtrees only, so this is a broken invariant.
    pub fn with_child(&self, child: PlanRef) -> Self {
        match Self::build(
            child,
            self.group_set.clone(),
            Arc::clone(&self.grouping_sets),
            Arc::clone(&self.aggregate_calls),
            self.phase,
        ) {
            Ok(copy) => copy.with_reduction_hint(self.cardinality_reduction.0),
            Err(e) => panic!("structural copy of stream aggregate {} failed: {e}", self.id),
        }
    }

    /// Ordering the input must already have: one ascending key per grouping column,
    /// in grouping order, on input column indices.
    pub fn required_collation(group_set: &GroupSet) -> Collation {
        Collation::ascending(group_set.iter())
    }

    /// Ordering a streaming aggregate over `group_count` grouping columns provides:
    /// ascending on output columns `0..group_count`.
    pub fn collation(group_count: usize) -> Collation {
        Collation::ascending(0..group_count)
    }

    pub fn properties(&self) -> PhysicalPropertySet {
        PhysicalPropertySet {
            collation: Self::collation(self.group_set.len()),
            distribution: self.output_distribution(),
            encoding: Some(Self::ENCODING.output),
        }
    }

    /// Input distribution expressed on output columns, when it survives grouping.
    fn output_distribution(&self) -> Distribution {
        match self.child.properties().distribution {
            Distribution::Singleton => Distribution::Singleton,
            Distribution::Hash(keys) => {
                let remapped: Option<Vec<_>> =
                    keys.iter().map(|k| self.group_set.position(*k)).collect();
                match remapped {
                    Some(keys) if !keys.is_empty() => Distribution::Hash(keys),
                    _ => Distribution::Any,
                }
            }
            _ => Distribution::Any,
        }
    }

    pub fn encoding_contract(&self) -> EncodingContract {
        Self::ENCODING
    }

    /// Convert into an executable operator over the already converted `child`.
    pub fn to_executable_operator(
        &self,
        child: PhysicalOperator,
        creator: &PhysicalPlanCreator,
    ) -> PhysicalOperator {
        let op = PhysicalOperator::StreamingAggregate {
            id: creator.next_operator_id(),
            child: Box::new(child),
            group_by: self.group_set.columns().to_vec(),
            aggregate_calls: self.aggregate_calls.to_vec(),
            phase: self.phase,
            cardinality_reduction: self.cardinality_reduction.0,
        };
        creator.add_metadata(self.id, op)
    }

    pub fn id(&self) -> PrelId {
        self.id
    }

    pub fn child(&self) -> &PlanRef {
        &self.child
    }

    pub fn inputs(&self) -> std::slice::Iter<'_, PlanRef> {
        std::slice::from_ref(&self.child).iter()
    }

    pub fn group_set(&self) -> &GroupSet {
        &self.group_set
    }

    pub fn grouping_sets(&self) -> &[GroupSet] {
        &self.grouping_sets
    }

    pub fn aggregate_calls(&self) -> &[AggregateCall] {
        &self.aggregate_calls
    }

    pub fn phase(&self) -> OperatorPhase {
        self.phase
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn cardinality_reduction(&self) -> f32 {
        self.cardinality_reduction.0
    }

    /// True when the grouping shape, calls and phase are identical to `other`'s.
    pub fn same_shape(&self, other: &StreamAggPrel) -> bool {
        self.group_set == other.group_set
            && self.grouping_sets == other.grouping_sets
            && self.aggregate_calls == other.aggregate_calls
            && self.phase == other.phase
            && self.cardinality_reduction == other.cardinality_reduction
    }
}

/// Structural identity: the same child node under the same grouping shape. The
/// node's own `PrelId` is ignored, so a rebuilt duplicate compares equal.
impl PartialEq for StreamAggPrel {
    fn eq(&self, other: &Self) -> bool {
        self.child.id() == other.child.id() && self.same_shape(other)
    }
}

impl Eq for StreamAggPrel {}

impl Hash for StreamAggPrel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.child.id().hash(state);
        self.group_set.hash(state);
        self.grouping_sets.hash(state);
        self.aggregate_calls.hash(state);
        self.phase.hash(state);
        self.cardinality_reduction.hash(state);
    }
}

pub(crate) fn validate_grouping_sets(
    group_set: &GroupSet,
    sets: &[GroupSet],
) -> Result<(), InvalidStrategyError> {
    if sets.is_empty() {
        return Err(InvalidStrategyError::MalformedGroupingSets(
            "at least one grouping set is required".to_string(),
        ));
    }
    for (i, set) in sets.iter().enumerate() {
        if !set.is_subset_of(group_set) {
            return Err(InvalidStrategyError::MalformedGroupingSets(format!(
                "grouping set {set} is not contained in {group_set}"
            )));
        }
        if sets[..i].contains(set) {
            return Err(InvalidStrategyError::MalformedGroupingSets(format!(
                "grouping set {set} is listed twice"
            )));
        }
    }
    Ok(())
}

impl fmt::Display for StreamAggPrel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamAgg(group={}", self.group_set)?;
        if self.grouping_sets.len() > 1 || self.grouping_sets[0] != self.group_set {
            write!(f, ", groups=[")?;
            for (i, set) in self.grouping_sets.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{set}")?;
            }
            write!(f, "]")?;
        }
        write!(f, ", phase={}", self.phase)?;
        for (i, call) in self.aggregate_calls.iter().enumerate() {
            write!(f, ", {}={}", self.schema.fields[self.group_set.len() + i].name, call)?;
        }
        write!(f, ")")
    }
}
