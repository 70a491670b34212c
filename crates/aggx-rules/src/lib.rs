//! # Built-in Aggregation Rules
//!
//! This crate provides the implementation rules that turn a logical aggregation into
//! physical alternatives for the Cascades search engine, along with the enforcer those
//! rules rely on.
//!
//! ## Implementation Rules (Logical -> Physical)
//!
//! - **`ImplStreamAggregateRule`**: Implements aggregation using sorted-stream
//!   processing, directly over an ordered child or over a sort enforcer.
//!
//! ## Enforcers
//!
//! - **`enforce_collation`**: Places a sort under an operator whose input lacks the
//!   ordering (or dense encoding) it needs.

pub mod enforcer;
pub mod impl_agg;

use aggx_core::rule::RuleRegistry;

/// Create a default rule registry with all built-in rules.
///
/// This is the standard configuration for the planner. Further strategies can be
/// registered on the returned registry with `add_rule()`.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.add_rule(Box::new(impl_agg::ImplStreamAggregateRule));
    registry
}
