//! # Sort Enforcer
//!
//! An "enforcer" is a physical operator whose sole purpose is to satisfy a required
//! physical property that the child plan doesn't natively provide. Sort is the
//! canonical one: when the streaming aggregate needs its input ordered on the grouping
//! columns and the child is not, a `SortPrel` is placed between them.
//!
//! The sort also compacts its output, so it doubles as the way to feed a
//! selection-vector child into an operator that only reads dense batches.
//!
//! ## Cost Considerations
//!
//! The sort cost is O(n log n) comparisons per key for n input rows. It is part of the
//! enforced candidate's cumulative cost, so the search compares it directly against
//! candidates whose child is already ordered.

use aggx_core::error::InvalidStrategyError;
use aggx_core::plan::{PlanRef, SortPrel};
use aggx_core::properties::Collation;
use std::sync::Arc;
use tracing::trace;

/// Return `child` unchanged when it already provides `required` as dense rows,
/// otherwise `child` under a sort on `required`.
pub fn enforce_collation(
    child: &PlanRef,
    required: &Collation,
) -> Result<PlanRef, InvalidStrategyError> {
    let provided = child.properties();
    let dense = provided.encoding.unwrap_or_default() == SortPrel::ENCODING.output;
    if dense && provided.collation.satisfies(required) {
        return Ok(Arc::clone(child));
    }
    let sort = SortPrel::new(Arc::clone(child), required.clone())?;
    trace!(
        "Added sort enforcer {} on {} over {} {}",
        sort.id(),
        required,
        child.name(),
        child.id()
    );
    Ok(Arc::new(sort.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggx_core::expr::{DataType, Field, Schema};
    use aggx_core::plan::{PhysicalPlan, ScanPrel};
    use aggx_core::properties::RowEncoding;
    use aggx_core::stats::Statistics;

    fn scan(collation: Collation, encoding: RowEncoding) -> PlanRef {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64),
            Field::new("b", DataType::Int64),
        ]);
        Arc::new(
            ScanPrel::new("t", schema, Statistics::new(100.0, 1600.0))
                .sorted_by(collation)
                .with_encoding(encoding)
                .into(),
        )
    }

    #[test]
    fn test_sorted_child_is_returned_as_is() {
        let child = scan(Collation::ascending([1, 0]), RowEncoding::Dense);
        let out = enforce_collation(&child, &Collation::ascending([1])).unwrap();
        assert!(Arc::ptr_eq(&out, &child));
    }

    #[test]
    fn test_unsorted_child_gets_sort() {
        let child = scan(Collation::empty(), RowEncoding::Dense);
        let out = enforce_collation(&child, &Collation::ascending([1, 0])).unwrap();
        match out.as_ref() {
            PhysicalPlan::Sort(sort) => {
                assert_eq!(sort.collation, Collation::ascending([1, 0]));
                assert_eq!(sort.child.id(), child.id());
            }
            other => panic!("expected a sort, got {}", other.name()),
        }
    }

    #[test]
    fn test_selection_vector_child_gets_sort() {
        let child = scan(Collation::ascending([0]), RowEncoding::FourByteSelection);
        let out = enforce_collation(&child, &Collation::ascending([0])).unwrap();
        assert_eq!(out.name(), "Sort");
        assert_eq!(out.properties().encoding, Some(RowEncoding::Dense));
    }

    #[test]
    fn test_bad_sort_key() {
        let child = scan(Collation::empty(), RowEncoding::Dense);
        let err = enforce_collation(&child, &Collation::ascending([7])).unwrap_err();
        assert!(matches!(err, InvalidStrategyError::ColumnOutOfRange { index: 7, .. }));
    }
}
