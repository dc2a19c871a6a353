//! SQL for the column and table summaries the facade exposes.

use dbframe_core::schema::{ColumnRef, TableSchema};
use dbframe_core::types::Value;
use dbframe_core::{Error, Result};

use crate::predicate::Predicate;
use crate::select::CompiledQuery;
use crate::sql::quote_ident;

/// Single-value aggregates over one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Non-null values.
    Count,
    NullCount,
    Min,
    Max,
    Sum,
    Avg,
    DistinctCount,
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::NullCount => "na_count",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::DistinctCount => "distinct_count",
        }
    }

    pub fn needs_numeric(self) -> bool {
        matches!(self, Aggregate::Sum | Aggregate::Avg)
    }
}

fn names(column: &ColumnRef) -> (String, String) {
    (quote_ident(column.name()), quote_ident(column.table()))
}

/// Sum, average and median are only defined for numeric columns.
pub fn require_numeric(column: &ColumnRef, what: &str) -> Result<()> {
    if column.kind().is_numeric() {
        Ok(())
    } else {
        Err(Error::TypeMismatch(format!(
            "cannot take {what} of {} column {}",
            column.kind(),
            column.qualified_name()
        )))
    }
}

pub fn row_count(table: &TableSchema) -> CompiledQuery {
    CompiledQuery::new(
        format!("SELECT COUNT(*) FROM {}", quote_ident(table.name())),
        Vec::new(),
    )
}

pub fn column_aggregate(column: &ColumnRef, agg: Aggregate) -> Result<CompiledQuery> {
    if agg.needs_numeric() {
        require_numeric(column, agg.name())?;
    }
    let (c, t) = names(column);
    let sql = match agg {
        Aggregate::Count => format!("SELECT COUNT({c}) FROM {t}"),
        Aggregate::NullCount => format!("SELECT COUNT(*) FROM {t} WHERE {c} IS NULL"),
        Aggregate::Min => format!("SELECT MIN({c}) FROM {t}"),
        Aggregate::Max => format!("SELECT MAX({c}) FROM {t}"),
        Aggregate::Sum => format!("SELECT SUM({c}) FROM {t}"),
        Aggregate::Avg => format!("SELECT AVG({c}) FROM {t}"),
        Aggregate::DistinctCount => format!("SELECT COUNT(DISTINCT {c}) FROM {t}"),
    };
    Ok(CompiledQuery::new(sql, Vec::new()))
}

/// The middle one (odd count) or two (even count) non-null values in
/// ascending order. `None` when there are no non-null values.
pub fn median_window(column: &ColumnRef, non_null: i64) -> Result<Option<CompiledQuery>> {
    require_numeric(column, "median")?;
    if non_null <= 0 {
        return Ok(None);
    }
    let (c, t) = names(column);
    let take = 2 - non_null % 2;
    let skip = (non_null - 1) / 2;
    Ok(Some(CompiledQuery::new(
        format!("SELECT {c} FROM {t} WHERE {c} IS NOT NULL ORDER BY {c} ASC LIMIT ? OFFSET ?"),
        vec![Value::Int(take), Value::Int(skip)],
    )))
}

/// Every non-null value tied for the highest frequency, with that frequency.
pub fn mode(column: &ColumnRef) -> CompiledQuery {
    let (c, t) = names(column);
    CompiledQuery::new(
        format!(
            "SELECT {c}, COUNT(*) FROM {t} WHERE {c} IS NOT NULL GROUP BY {c} \
             HAVING COUNT(*) >= (SELECT COUNT(*) FROM {t} WHERE {c} IS NOT NULL \
             GROUP BY {c} ORDER BY 1 DESC LIMIT 1) ORDER BY {c} ASC"
        ),
        Vec::new(),
    )
}

/// Distinct values, NULL included, in order of first appearance when a
/// row-id alias is available.
pub fn distinct_values(column: &ColumnRef, rowid: Option<&str>) -> CompiledQuery {
    let (c, t) = names(column);
    let sql = match rowid {
        Some(rowid) => format!(
            "SELECT {c} FROM {t} GROUP BY {c} ORDER BY MIN({}) ASC",
            quote_ident(rowid)
        ),
        None => format!("SELECT DISTINCT {c} FROM {t}"),
    };
    CompiledQuery::new(sql, Vec::new())
}

/// Non-null value counts, most frequent first, ties by value.
pub fn value_counts(column: &ColumnRef) -> CompiledQuery {
    let (c, t) = names(column);
    CompiledQuery::new(
        format!(
            "SELECT {c}, COUNT(*) FROM {t} WHERE {c} IS NOT NULL GROUP BY {c} \
             ORDER BY 2 DESC, 1 ASC"
        ),
        Vec::new(),
    )
}

pub fn count_where(table: &TableSchema, predicate: &Predicate) -> Result<CompiledQuery> {
    let frag = predicate.compile(table)?;
    Ok(CompiledQuery::new(
        format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(table.name()),
            frag.sql
        ),
        frag.params,
    ))
}

pub fn count_in(table: &TableSchema, column: &ColumnRef, set: &[Value]) -> Result<CompiledQuery> {
    let pred = Predicate::is_in(column, set.iter().cloned())?;
    count_where(table, &pred)
}
