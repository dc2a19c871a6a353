//! Registry of cacheable operations and their key shapes.
//!
//! Every memoized facade method is one of these variants, and its cache key
//! is built here and nowhere else.

use dbframe_cache::{CacheKey, KeyArg};
use dbframe_core::schema::ColumnRef;

/// Whether a cached result belongs to a table or to one of its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyShape {
    Table,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheableOp {
    TableLen,
    TableShape,
    /// Predicate SQL and its parameters.
    CountWhere,
    Count,
    NaCount,
    Min,
    Max,
    Sum,
    Avg,
    Median,
    Mode,
    Unique,
    ValueCounts,
    DistinctCount,
    HasDuplicates,
    Describe,
    /// One canonical set.
    CountIn,
}

impl CacheableOp {
    pub const ALL: [CacheableOp; 17] = [
        CacheableOp::TableLen,
        CacheableOp::TableShape,
        CacheableOp::CountWhere,
        CacheableOp::Count,
        CacheableOp::NaCount,
        CacheableOp::Min,
        CacheableOp::Max,
        CacheableOp::Sum,
        CacheableOp::Avg,
        CacheableOp::Median,
        CacheableOp::Mode,
        CacheableOp::Unique,
        CacheableOp::ValueCounts,
        CacheableOp::DistinctCount,
        CacheableOp::HasDuplicates,
        CacheableOp::Describe,
        CacheableOp::CountIn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CacheableOp::TableLen => "len",
            CacheableOp::TableShape => "shape",
            CacheableOp::CountWhere => "count_where",
            CacheableOp::Count => "count",
            CacheableOp::NaCount => "na_count",
            CacheableOp::Min => "min",
            CacheableOp::Max => "max",
            CacheableOp::Sum => "sum",
            CacheableOp::Avg => "avg",
            CacheableOp::Median => "median",
            CacheableOp::Mode => "mode",
            CacheableOp::Unique => "unique",
            CacheableOp::ValueCounts => "value_counts",
            CacheableOp::DistinctCount => "distinct_count",
            CacheableOp::HasDuplicates => "has_duplicates",
            CacheableOp::Describe => "describe",
            CacheableOp::CountIn => "count_in",
        }
    }

    pub fn shape(self) -> KeyShape {
        match self {
            CacheableOp::TableLen | CacheableOp::TableShape | CacheableOp::CountWhere => {
                KeyShape::Table
            }
            _ => KeyShape::Column,
        }
    }

    /// Number of key arguments the operation takes.
    pub fn arity(self) -> usize {
        match self {
            CacheableOp::CountWhere => 2,
            CacheableOp::CountIn => 1,
            _ => 0,
        }
    }

    /// Only defined on numeric columns.
    pub fn needs_numeric(self) -> bool {
        matches!(
            self,
            CacheableOp::Sum | CacheableOp::Avg | CacheableOp::Median
        )
    }

    pub fn table_key(self, table: &str) -> CacheKey {
        debug_assert_eq!(self.shape(), KeyShape::Table);
        CacheKey::table(table, self.name())
    }

    pub fn column_key(self, column: &ColumnRef) -> CacheKey {
        debug_assert_eq!(self.shape(), KeyShape::Column);
        CacheKey::column(column.table(), column.name(), self.name())
    }

    pub fn table_key_with(self, table: &str, args: Vec<KeyArg>) -> CacheKey {
        debug_assert_eq!(args.len(), self.arity());
        args.into_iter()
            .fold(self.table_key(table), CacheKey::with_arg)
    }

    pub fn column_key_with(self, column: &ColumnRef, args: Vec<KeyArg>) -> CacheKey {
        debug_assert_eq!(args.len(), self.arity());
        args.into_iter()
            .fold(self.column_key(column), CacheKey::with_arg)
    }
}
