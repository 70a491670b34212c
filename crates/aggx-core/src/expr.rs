//! # Schema and Aggregate Descriptors
//!
//! This module defines the small value types that physical aggregation nodes are built
//! from:
//!
//! - **`Schema` / `Field`**: the output row type of a plan node. Columns are addressed
//!   positionally by `ColumnIndex`.
//! - **`GroupSet`**: the ordered, duplicate-free list of grouping columns. Its order
//!   fixes both the output column order and the sort prefix a streaming aggregate
//!   needs from its input.
//! - **`AggregateCall`**: one aggregate function invocation (`SUM(col 3)`), with its
//!   argument columns and result type.
//! - **`OperatorPhase`**: whether an aggregation is partial (merged later) or final.

use crate::error::InvalidStrategyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based position of a column in a node's output schema.
pub type ColumnIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int64,
    Float64,
    Decimal,
    Utf8,
    Date,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "BOOLEAN",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Decimal => "DECIMAL",
            DataType::Utf8 => "VARCHAR",
            DataType::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// A named, typed output column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Output row type of a plan node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: ColumnIndex) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Fail with `ColumnOutOfRange` unless `index` addresses a column of this schema.
    pub fn check_index(
        &self,
        context: &'static str,
        index: ColumnIndex,
    ) -> Result<(), InvalidStrategyError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(InvalidStrategyError::ColumnOutOfRange {
                context,
                index,
                width: self.len(),
            })
        }
    }
}

/// Ordered, duplicate-free set of grouping column indices.
///
/// Unlike a bitset, the order is kept: grouping columns are projected first in this
/// order, and a streaming aggregate needs its input sorted by them in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct GroupSet(Vec<ColumnIndex>);

impl GroupSet {
    pub fn new(columns: Vec<ColumnIndex>) -> Result<Self, InvalidStrategyError> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].contains(col) {
                return Err(InvalidStrategyError::DuplicateGroupingColumn(*col));
            }
        }
        Ok(Self(columns))
    }

    /// The empty group set of a global aggregate.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn columns(&self) -> &[ColumnIndex] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, col: ColumnIndex) -> bool {
        self.0.contains(&col)
    }

    /// Output position of an input column, if it is a grouping column.
    pub fn position(&self, col: ColumnIndex) -> Option<usize> {
        self.0.iter().position(|c| *c == col)
    }

    pub fn is_subset_of(&self, other: &GroupSet) -> bool {
        self.0.iter().all(|c| other.contains(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnIndex> + '_ {
        self.0.iter().copied()
    }
}

impl<'de> Deserialize<'de> for GroupSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let columns = Vec::<ColumnIndex>::deserialize(deserializer)?;
        GroupSet::new(columns).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, col) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${col}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

/// One aggregate function invocation over input columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateCall {
    pub func: AggFunc,
    /// Argument columns in the input schema. Empty only for `COUNT(*)`.
    #[serde(default)]
    pub args: Vec<ColumnIndex>,
    #[serde(default)]
    pub distinct: bool,
    pub result_type: DataType,
    /// Output column name; `EXPR$<n>` is used when absent.
    #[serde(default)]
    pub name: Option<String>,
}

impl AggregateCall {
    pub fn new(func: AggFunc, args: Vec<ColumnIndex>, result_type: DataType) -> Self {
        Self {
            func,
            args,
            distinct: false,
            result_type,
            name: None,
        }
    }

    pub fn count_star() -> Self {
        Self::new(AggFunc::Count, Vec::new(), DataType::Int64)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check the argument count and that every argument exists in `input`.
    pub fn validate(&self, input: &Schema) -> Result<(), InvalidStrategyError> {
        let arity_ok = match self.func {
            AggFunc::Count => self.args.len() <= 1,
            _ => self.args.len() == 1,
        };
        if !arity_ok {
            return Err(InvalidStrategyError::ArgumentCount {
                function: self.func.name(),
                expected: if self.func == AggFunc::Count { "0 or 1" } else { "1" },
                actual: self.args.len(),
            });
        }
        for arg in &self.args {
            input.check_index("aggregate call", *arg)?;
        }
        Ok(())
    }

    /// Output field for the `ordinal`-th call of an aggregate.
    pub fn output_field(&self, ordinal: usize) -> Field {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("EXPR${ordinal}"));
        let field = Field::new(name, self.result_type);
        // COUNT never yields NULL.
        if self.func == AggFunc::Count {
            field.not_null()
        } else {
            field
        }
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func.name())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.args.is_empty() {
            write!(f, "*")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${arg}")?;
        }
        write!(f, ")")
    }
}

/// Whether an aggregation computes a partial result (merged later) or the final one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorPhase {
    /// First phase of a two-phase aggregation.
    Partial,
    /// Second phase: merges partial results.
    Final,
    /// Complete aggregation in one phase.
    Single,
}

impl fmt::Display for OperatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorPhase::Partial => "Phase1of2",
            OperatorPhase::Final => "Phase2of2",
            OperatorPhase::Single => "OnePhase",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_set_rejects_duplicates() {
        let err = GroupSet::new(vec![2, 0, 2]).unwrap_err();
        assert_eq!(err, InvalidStrategyError::DuplicateGroupingColumn(2));
    }

    #[test]
    fn test_group_set_keeps_order() {
        let g = GroupSet::new(vec![3, 1]).unwrap();
        assert_eq!(g.columns(), &[3, 1]);
        assert_eq!(g.position(1), Some(1));
        assert_eq!(g.position(0), None);
        assert_eq!(g.to_string(), "{$3, $1}");
    }

    #[test]
    fn test_group_set_deserialize_validates() {
        let ok: GroupSet = serde_json::from_str("[1, 0]").unwrap();
        assert_eq!(ok.columns(), &[1, 0]);
        assert!(serde_json::from_str::<GroupSet>("[1, 1]").is_err());
    }

    #[test]
    fn test_aggregate_call_arity() {
        let input = Schema::new(vec![Field::new("a", DataType::Int64)]);
        assert!(AggregateCall::count_star().validate(&input).is_ok());
        let bad = AggregateCall::new(AggFunc::Sum, vec![], DataType::Int64);
        assert!(matches!(
            bad.validate(&input),
            Err(InvalidStrategyError::ArgumentCount { actual: 0, .. })
        ));
        let out_of_range = AggregateCall::new(AggFunc::Max, vec![4], DataType::Int64);
        assert!(matches!(
            out_of_range.validate(&input),
            Err(InvalidStrategyError::ColumnOutOfRange { index: 4, width: 1, .. })
        ));
    }

    #[test]
    fn test_output_field_naming() {
        let call = AggregateCall::new(AggFunc::Sum, vec![0], DataType::Decimal);
        assert_eq!(call.output_field(2).name, "EXPR$2");
        let named = call.named("total");
        assert_eq!(named.output_field(2).name, "total");
        assert!(!AggregateCall::count_star().output_field(0).nullable);
        assert_eq!(named.to_string(), "SUM($0)");
    }

    #[test]
    fn test_distinct_call_display() {
        let call = AggregateCall::new(AggFunc::Count, vec![1], DataType::Int64).distinct();
        assert!(call.distinct);
        assert_eq!(call.to_string(), "COUNT(DISTINCT $1)");
        assert_ne!(call, AggregateCall::new(AggFunc::Count, vec![1], DataType::Int64));
    }
}
