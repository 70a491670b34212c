//! # Plan Visitor Protocol
//!
//! Generic passes (validation, explain, operator conversion, subtree rewriting) walk a
//! physical plan through double dispatch: `PhysicalPlan::accept` calls the visit method
//! for the concrete node kind, passing the node and a caller-supplied context, and
//! returns whatever the visitor produces.
//!
//! Every kind-specific method falls back to `visit_prel`, so a pass only overrides the
//! kinds it cares about and still handles the rest uniformly.
//!
//! Children are reached with `PhysicalPlan::inputs()`, which hands out a fresh
//! single-pass iterator on every call.

use crate::error::{InvalidStrategyError, PlanError};
use crate::plan::{PhysicalPlan, PlanRef, PrelId, ScanPrel, SortPrel};
use crate::stream_agg::StreamAggPrel;
use std::fmt::Write;
use std::sync::Arc;

pub trait PrelVisitor {
    type Output;
    type Context;
    type Error;

    /// Fallback for node kinds the visitor does not special-case.
    fn visit_prel(
        &mut self,
        prel: &PhysicalPlan,
        ctx: &Self::Context,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_scan(
        &mut self,
        prel: &PhysicalPlan,
        _scan: &ScanPrel,
        ctx: &Self::Context,
    ) -> Result<Self::Output, Self::Error> {
        self.visit_prel(prel, ctx)
    }

    fn visit_sort(
        &mut self,
        prel: &PhysicalPlan,
        _sort: &SortPrel,
        ctx: &Self::Context,
    ) -> Result<Self::Output, Self::Error> {
        self.visit_prel(prel, ctx)
    }

    fn visit_stream_agg(
        &mut self,
        prel: &PhysicalPlan,
        _agg: &StreamAggPrel,
        ctx: &Self::Context,
    ) -> Result<Self::Output, Self::Error> {
        self.visit_prel(prel, ctx)
    }
}

impl PhysicalPlan {
    /// Dispatch to the visit method for this node's kind.
    pub fn accept<V>(&self, visitor: &mut V, ctx: &V::Context) -> Result<V::Output, V::Error>
    where
        V: PrelVisitor + ?Sized,
    {
        match self {
            PhysicalPlan::Scan(scan) => visitor.visit_scan(self, scan, ctx),
            PhysicalPlan::Sort(sort) => visitor.visit_sort(self, sort, ctx),
            PhysicalPlan::StreamAgg(agg) => visitor.visit_stream_agg(self, agg, ctx),
        }
    }
}

/// Re-checks the structural invariants of every node in a plan.
///
/// Nodes are validated at construction; this pass guards plans assembled from
/// deserialized or externally rewritten pieces.
#[derive(Debug, Default)]
pub struct PlanValidator {
    visited: usize,
}

impl PlanValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `plan` and return how many nodes were checked.
    pub fn validate(plan: &PhysicalPlan) -> Result<usize, PlanError> {
        let mut validator = Self::new();
        plan.accept(&mut validator, &())?;
        Ok(validator.visited)
    }

    fn invalid(prel: &PhysicalPlan, source: InvalidStrategyError) -> PlanError {
        PlanError::InvalidNode {
            node: format!("{} {}", prel.name(), prel.id()),
            source,
        }
    }
}

impl PrelVisitor for PlanValidator {
    type Output = ();
    type Context = ();
    type Error = PlanError;

    fn visit_prel(&mut self, prel: &PhysicalPlan, ctx: &()) -> Result<(), PlanError> {
        self.visited += 1;
        for input in prel.inputs() {
            input.accept(self, ctx)?;
        }
        Ok(())
    }

    fn visit_sort(&mut self, prel: &PhysicalPlan, sort: &SortPrel, ctx: &()) -> Result<(), PlanError> {
        if sort.collation.is_empty() {
            return Err(PlanError::EmptySort);
        }
        self.visit_prel(prel, ctx)
    }

    fn visit_stream_agg(
        &mut self,
        prel: &PhysicalPlan,
        agg: &StreamAggPrel,
        ctx: &(),
    ) -> Result<(), PlanError> {
        let input = agg.child().properties();
        let encoding = input.encoding.unwrap_or_default();
        if !agg.encoding_contract().accepts(encoding) {
            return Err(Self::invalid(
                prel,
                InvalidStrategyError::UnsupportedInputEncoding(encoding),
            ));
        }
        if !input.collation.has_prefix_columns(agg.group_set().columns()) {
            return Err(Self::invalid(
                prel,
                InvalidStrategyError::MissingInputCollation {
                    required: agg.group_set().columns().to_vec(),
                    provided: input.collation,
                },
            ));
        }
        self.visit_prel(prel, ctx)
    }
}

/// Renders a plan as indented text, one node per line.
#[derive(Debug, Default)]
pub struct ExplainVisitor {
    out: String,
}

impl ExplainVisitor {
    pub fn explain(plan: &PhysicalPlan) -> String {
        let mut visitor = Self::default();
        // Rendering into a String cannot fail.
        let _ = plan.accept(&mut visitor, &0);
        visitor.out
    }

    fn line(&mut self, depth: usize, text: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{:indent$}{}", "", text, indent = depth * 2);
    }

    fn children(&mut self, prel: &PhysicalPlan, depth: usize) -> Result<(), std::fmt::Error> {
        for input in prel.inputs() {
            input.accept(self, &(depth + 1))?;
        }
        Ok(())
    }
}

impl PrelVisitor for ExplainVisitor {
    type Output = ();
    type Context = usize;
    type Error = std::fmt::Error;

    fn visit_prel(&mut self, prel: &PhysicalPlan, depth: &usize) -> Result<(), std::fmt::Error> {
        self.line(*depth, format_args!("{}", prel.name()));
        self.children(prel, *depth)
    }

    fn visit_scan(&mut self, _prel: &PhysicalPlan, scan: &ScanPrel, depth: &usize) -> Result<(), std::fmt::Error> {
        if scan.collation.is_empty() {
            self.line(*depth, format_args!("Scan(table={})", scan.table));
        } else {
            self.line(
                *depth,
                format_args!("Scan(table={}, collation={})", scan.table, scan.collation),
            );
        }
        Ok(())
    }

    fn visit_sort(&mut self, prel: &PhysicalPlan, sort: &SortPrel, depth: &usize) -> Result<(), std::fmt::Error> {
        self.line(*depth, format_args!("Sort(collation={})", sort.collation));
        self.children(prel, *depth)
    }

    fn visit_stream_agg(
        &mut self,
        prel: &PhysicalPlan,
        agg: &StreamAggPrel,
        depth: &usize,
    ) -> Result<(), std::fmt::Error> {
        self.line(*depth, format_args!("{agg}"));
        self.children(prel, *depth)
    }
}

/// Replaces the subtree rooted at `target` with `replacement`, copying every ancestor.
///
/// This is how an equivalent input found by the search is spliced into a candidate.
/// Ancestors are rebuilt through `with_new_inputs`; the original plan is untouched.
pub struct SubtreeReplacer {
    target: PrelId,
    replacement: PlanRef,
}

impl SubtreeReplacer {
    pub fn new(target: PrelId, replacement: PlanRef) -> Self {
        Self {
            target,
            replacement,
        }
    }

    /// Returns `None` when `target` does not occur in `plan`.
    pub fn replace(mut self, plan: &PlanRef) -> Result<Option<PlanRef>, InvalidStrategyError> {
        plan.accept(&mut self, &())
    }
}

impl PrelVisitor for SubtreeReplacer {
    type Output = Option<PlanRef>;
    type Context = ();
    type Error = InvalidStrategyError;

    fn visit_prel(
        &mut self,
        prel: &PhysicalPlan,
        ctx: &(),
    ) -> Result<Option<PlanRef>, InvalidStrategyError> {
        if prel.id() == self.target {
            return Ok(Some(Arc::clone(&self.replacement)));
        }
        let mut changed = false;
        let mut inputs = Vec::new();
        for input in prel.inputs() {
            match input.accept(self, ctx)? {
                Some(new_input) => {
                    changed = true;
                    inputs.push(new_input);
                }
                None => inputs.push(Arc::clone(input)),
            }
        }
        if changed {
            prel.with_new_inputs(inputs).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AggregateCall, DataType, Field, GroupSet, OperatorPhase, Schema};
    use crate::properties::Collation;
    use crate::stats::Statistics;

    fn scan(collation: Collation) -> PlanRef {
        let schema = Schema::new(vec![
            Field::new("k", DataType::Int64),
            Field::new("v", DataType::Int64),
        ]);
        Arc::new(ScanPrel::new("t", schema, Statistics::new(100.0, 1600.0)).sorted_by(collation).into())
    }

    fn agg_over(child: PlanRef) -> PlanRef {
        Arc::new(
            StreamAggPrel::new(
                child,
                GroupSet::new(vec![0]).unwrap(),
                None,
                vec![AggregateCall::count_star()],
                OperatorPhase::Single,
            )
            .unwrap()
            .into(),
        )
    }

    struct CountNodes;

    impl PrelVisitor for CountNodes {
        type Output = usize;
        type Context = ();
        type Error = ();

        fn visit_prel(&mut self, prel: &PhysicalPlan, ctx: &()) -> Result<usize, ()> {
            let mut n = 1;
            for input in prel.inputs() {
                n += input.accept(self, ctx)?;
            }
            Ok(n)
        }
    }

    #[test]
    fn test_fallback_reaches_every_kind() {
        let sort: PlanRef = Arc::new(SortPrel::new(scan(Collation::empty()), Collation::ascending([0])).unwrap().into());
        let plan = agg_over(sort);
        assert_eq!(plan.accept(&mut CountNodes, &()), Ok(3));
    }

    #[test]
    fn test_inputs_restartable() {
        let child = scan(Collation::ascending([0]));
        let plan = agg_over(child.clone());
        let first: Vec<_> = plan.inputs().map(|p| p.id()).collect();
        let second: Vec<_> = plan.inputs().map(|p| p.id()).collect();
        assert_eq!(first, vec![child.id()]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validator_counts_nodes() {
        let plan = agg_over(scan(Collation::ascending([0])));
        assert_eq!(PlanValidator::validate(&plan).unwrap(), 2);
    }

    #[test]
    fn test_validator_rejects_empty_sort() {
        let sort: PlanRef = Arc::new(SortPrel::new(scan(Collation::empty()), Collation::empty()).unwrap().into());
        assert!(matches!(PlanValidator::validate(&sort), Err(PlanError::EmptySort)));
    }

    #[test]
    fn test_explain() {
        let sort: PlanRef = Arc::new(SortPrel::new(scan(Collation::empty()), Collation::ascending([0])).unwrap().into());
        let text = ExplainVisitor::explain(&agg_over(sort));
        assert_eq!(
            text,
            "StreamAgg(group={$0}, phase=OnePhase, EXPR$1=COUNT(*))\n  Sort(collation=[$0 ASC])\n    Scan(table=t)\n"
        );
    }

    #[test]
    fn test_replace_subtree_copies_ancestors() {
        let original_scan = scan(Collation::ascending([0]));
        let plan = agg_over(original_scan.clone());
        let replacement = scan(Collation::ascending([0, 1]));

        let rewritten = SubtreeReplacer::new(original_scan.id(), replacement.clone())
            .replace(&plan)
            .unwrap()
            .unwrap();
        assert_ne!(rewritten.id(), plan.id());
        assert_eq!(rewritten.inputs().next().unwrap().id(), replacement.id());
        // The original is untouched.
        assert_eq!(plan.inputs().next().unwrap().id(), original_scan.id());

        let missing = SubtreeReplacer::new(replacement.id(), original_scan).replace(&plan).unwrap();
        assert!(missing.is_none());
    }
}
