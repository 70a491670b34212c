//! # Physical Properties
//!
//! Every physical plan node publishes a `PhysicalPropertySet` describing how its
//! output is organized. The search engine compares these against the requirements of
//! a parent to decide whether an enforcer (e.g., a Sort) is needed.
//!
//! - **Collation**: the sort-key sequence the rows satisfy. Required by streaming
//!   aggregation and merge joins.
//! - **Distribution**: how rows are partitioned across workers. Carried through so a
//!   parent can reason about it; distribution planning itself happens elsewhere.
//! - **Row encoding**: whether batches are dense or carry a selection vector that
//!   filters them lazily.
//!
//! ## The "Any" Property Set
//!
//! `PhysicalPropertySet::any()` represents "no requirements". A requirement field left
//! empty/`Any` is satisfied by whatever the child provides.

use crate::expr::ColumnIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullDirection {
    First,
    Last,
    #[default]
    Unspecified,
}

/// One sort key: a column plus its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldCollation {
    pub field: ColumnIndex,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nulls: NullDirection,
}

impl FieldCollation {
    /// Ascending key with unspecified null placement.
    pub fn asc(field: ColumnIndex) -> Self {
        Self {
            field,
            direction: Direction::Ascending,
            nulls: NullDirection::Unspecified,
        }
    }

    pub fn desc(field: ColumnIndex) -> Self {
        Self {
            field,
            direction: Direction::Descending,
            nulls: NullDirection::Unspecified,
        }
    }
}

impl fmt::Display for FieldCollation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        write!(f, "${} {}", self.field, dir)?;
        match self.nulls {
            NullDirection::First => write!(f, "-nulls-first"),
            NullDirection::Last => write!(f, "-nulls-last"),
            NullDirection::Unspecified => Ok(()),
        }
    }
}

/// Ordered sort-key sequence. Empty means "no ordering".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collation(Vec<FieldCollation>);

impl Collation {
    pub fn new(fields: Vec<FieldCollation>) -> Self {
        Self(fields)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Ascending collation on `fields`, in the given order.
    pub fn ascending(fields: impl IntoIterator<Item = ColumnIndex>) -> Self {
        Self(fields.into_iter().map(FieldCollation::asc).collect())
    }

    pub fn fields(&self) -> &[FieldCollation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the leading keys are exactly `columns`, in order. Directions are
    /// ignored: a descending input still keeps equal keys adjacent.
    pub fn has_prefix_columns(&self, columns: &[ColumnIndex]) -> bool {
        columns.len() <= self.0.len()
            && columns
                .iter()
                .zip(self.0.iter())
                .all(|(col, key)| *col == key.field)
    }

    /// True when `required` is a positional prefix of this collation, directions
    /// included.
    pub fn satisfies(&self, required: &Collation) -> bool {
        required.0.len() <= self.0.len()
            && required.0.iter().zip(self.0.iter()).all(|(r, p)| {
                r.field == p.field
                    && r.direction == p.direction
                    && (r.nulls == NullDirection::Unspecified || r.nulls == p.nulls)
            })
    }

    /// Map each key through `mapping`. The collation is cut at the first key whose
    /// column has no image, since later keys only order within that column's ties.
    pub fn remap(&self, mapping: impl Fn(ColumnIndex) -> Option<ColumnIndex>) -> Collation {
        let mut out = Vec::with_capacity(self.0.len());
        for key in &self.0 {
            match mapping(key.field) {
                Some(field) => out.push(FieldCollation { field, ..*key }),
                None => break,
            }
        }
        Collation(out)
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]")
    }
}

/// How rows are partitioned across workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    /// No guarantee.
    #[default]
    Any,
    /// All rows on a single worker.
    Singleton,
    /// Every row replicated to all workers.
    Broadcast,
    /// Hash-partitioned on the given columns.
    Hash(Vec<ColumnIndex>),
    RoundRobin,
}

/// Layout of the row batches an operator consumes or produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowEncoding {
    /// Compacted batches: every row in the batch is live.
    #[default]
    Dense,
    /// Batch plus a 2-byte selection vector naming the live rows.
    TwoByteSelection,
    /// Batch list plus a 4-byte selection vector spanning batches.
    FourByteSelection,
}

impl RowEncoding {
    /// Encodings accepted by operators that need compacted input.
    pub const DEFAULT: &'static [RowEncoding] = &[RowEncoding::Dense];
    pub const ALL: &'static [RowEncoding] = &[
        RowEncoding::Dense,
        RowEncoding::TwoByteSelection,
        RowEncoding::FourByteSelection,
    ];
}

/// Input encodings an operator accepts and the encoding it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingContract {
    pub supported_inputs: &'static [RowEncoding],
    pub output: RowEncoding,
}

impl EncodingContract {
    pub fn accepts(&self, encoding: RowEncoding) -> bool {
        self.supported_inputs.contains(&encoding)
    }
}

/// Physical properties a node provides, or a parent requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalPropertySet {
    #[serde(default)]
    pub collation: Collation,
    #[serde(default)]
    pub distribution: Distribution,
    /// `None` in a requirement means any encoding is acceptable.
    #[serde(default)]
    pub encoding: Option<RowEncoding>,
}

impl PhysicalPropertySet {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_collation(collation: Collation) -> Self {
        Self {
            collation,
            ..Self::default()
        }
    }

    pub fn with_distribution(distribution: Distribution) -> Self {
        Self {
            distribution,
            ..Self::default()
        }
    }

    /// Check if this requirement is satisfied by `provided`.
    ///
    /// - **Collation**: the required keys must be a prefix of the provided keys.
    /// - **Distribution**: `Any` accepts everything, otherwise an exact match.
    /// - **Encoding**: `None` accepts everything, otherwise an exact match.
    pub fn satisfied_by(&self, provided: &PhysicalPropertySet) -> bool {
        let collation_ok = provided.collation.satisfies(&self.collation);
        let dist_ok = match &self.distribution {
            Distribution::Any => true,
            required => *required == provided.distribution,
        };
        let encoding_ok = match self.encoding {
            None => true,
            Some(required) => provided.encoding.unwrap_or_default() == required,
        };
        collation_ok && dist_ok && encoding_ok
    }
}
