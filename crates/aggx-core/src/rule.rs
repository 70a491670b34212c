//! # Rule System
//!
//! Implementation rules map a logical aggregation onto physical alternatives. The
//! search engine hands each rule the logical operator and its already-implemented
//! child; the rule returns zero or more candidate plans, which are then costed and
//! filtered by `search::choose_best`.
//!
//! ## Failure Handling
//!
//! A strategy that cannot be built for a given child (wrong ordering, unsupported
//! encoding, a bad column reference) is not an error for the search. Rules log the
//! reason and leave that alternative out, so the remaining strategies still compete.
//!
//! ## Rule Registry
//!
//! The `RuleRegistry` collects the rules to try. `implement` runs every registered
//! rule against one logical aggregate and gathers the alternatives.

use crate::error::InvalidStrategyError;
use crate::expr::{AggregateCall, GroupSet, Schema};
use crate::plan::PlanRef;
use crate::stats::RowCountEstimator;
use crate::stream_agg::validate_grouping_sets;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tracing::trace;

/// The logical aggregation an implementation rule works from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalAggregate {
    pub group_set: GroupSet,
    /// `None` means a single grouping set equal to `group_set`.
    #[serde(default)]
    pub grouping_sets: Option<Vec<GroupSet>>,
    #[serde(default)]
    pub aggregate_calls: Vec<AggregateCall>,
}

impl LogicalAggregate {
    pub fn new(group_set: GroupSet, aggregate_calls: Vec<AggregateCall>) -> Self {
        Self {
            group_set,
            grouping_sets: None,
            aggregate_calls,
        }
    }

    pub fn with_grouping_sets(mut self, sets: Vec<GroupSet>) -> Self {
        self.grouping_sets = Some(sets);
        self
    }

    /// Check the shape against the input schema, independent of any strategy.
    pub fn validate(&self, input: &Schema) -> Result<(), InvalidStrategyError> {
        for col in self.group_set.iter() {
            input.check_index("grouping column", col)?;
        }
        if let Some(sets) = &self.grouping_sets {
            validate_grouping_sets(&self.group_set, sets)?;
        }
        for call in &self.aggregate_calls {
            call.validate(input)?;
        }
        Ok(())
    }
}

/// Context passed to rules during application.
pub struct OptContext<'a> {
    pub estimator: &'a dyn RowCountEstimator,
}

/// An implementation rule for logical aggregates.
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    /// Whether the rule can say anything about `logical` at all.
    fn matches(&self, _logical: &LogicalAggregate) -> bool {
        true
    }

    /// Produce physical alternatives for `logical` over `child`.
    fn apply(&self, logical: &LogicalAggregate, child: &PlanRef, ctx: &OptContext) -> Vec<PlanRef>;

    /// Hash for fingerprinting (to avoid re-applying rules).
    fn rule_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.name().hash(&mut hasher);
        hasher.finish()
    }
}

/// Registry of implementation rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every matching rule and collect the alternatives, in registration order.
    pub fn implement(
        &self,
        logical: &LogicalAggregate,
        child: &PlanRef,
        ctx: &OptContext,
    ) -> Vec<PlanRef> {
        let mut alternatives = Vec::new();
        for rule in self.rules() {
            if !rule.matches(logical) {
                continue;
            }
            trace!("Applying implementation rule '{}' to child {}", rule.name(), child.id());
            let produced = rule.apply(logical, child, ctx);
            trace!("  Rule '{}' produced {} alternatives", rule.name(), produced.len());
            alternatives.extend(produced);
        }
        alternatives
    }
}
