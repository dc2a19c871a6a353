//! Column handle: predicate builders and memoized summaries.
//!
//! Every summary goes through one `CacheableOp`, so its cache key is fixed by
//! the registry. Results are coerced to the column's declared kind before
//! they are cached.

use std::sync::Arc;

use dbframe_cache::KeyArg;
use dbframe_core::schema::{ColumnRef, TableSchema, ValueKind};
use dbframe_core::types::{CachedValue, Row, Value};
use dbframe_core::Result;
use dbframe_planner::aggregate::{self, Aggregate};
use dbframe_planner::{Predicate, SelectQuery};

use crate::database::Database;
use crate::ops::CacheableOp;
use crate::table::{as_count, unexpected, Table};
use crate::view::LazyView;

#[derive(Clone)]
pub struct Column<'db> {
    db: &'db Database,
    table: Arc<TableSchema>,
    column: ColumnRef,
}

impl<'db> Column<'db> {
    pub(crate) fn new(db: &'db Database, table: Arc<TableSchema>, column: ColumnRef) -> Self {
        Self { db, table, column }
    }

    pub fn name(&self) -> &str {
        self.column.name()
    }

    pub fn sql_type(&self) -> &str {
        self.column.sql_type()
    }

    pub fn kind(&self) -> ValueKind {
        self.column.kind()
    }

    /// The schema handle predicates are built from.
    pub fn handle(&self) -> &ColumnRef {
        &self.column
    }

    pub fn table(&self) -> Table<'db> {
        Table::new(self.db, Arc::clone(&self.table))
    }

    // Predicate builders.

    pub fn eq(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::eq(&self.column, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::ne(&self.column, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::lt(&self.column, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::le(&self.column, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::gt(&self.column, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Result<Predicate> {
        Predicate::ge(&self.column, value)
    }

    /// Inclusive on both ends.
    pub fn between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Result<Predicate> {
        Predicate::between(&self.column, low, high)
    }

    pub fn is_in<I, V>(&self, values: I) -> Result<Predicate>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::is_in(&self.column, values)
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::is_null(&self.column)
    }

    pub fn not_null(&self) -> Predicate {
        Predicate::not_null(&self.column)
    }

    pub fn like(&self, pattern: impl Into<String>) -> Result<Predicate> {
        Predicate::like(&self.column, pattern)
    }

    // Summaries.

    /// Rows in the owning table.
    pub fn len(&self) -> Result<i64> {
        self.table().len()
    }

    /// Non-null values.
    pub fn count(&self) -> Result<i64> {
        let v = self.scalar(CacheableOp::Count, |c| {
            c.aggregate(Aggregate::Count)
        })?;
        Ok(v.as_i64().unwrap_or(0))
    }

    pub fn na_count(&self) -> Result<i64> {
        let v = self.scalar(CacheableOp::NaCount, |c| {
            c.aggregate(Aggregate::NullCount)
        })?;
        Ok(v.as_i64().unwrap_or(0))
    }

    pub fn min(&self) -> Result<Value> {
        self.scalar(CacheableOp::Min, |c| {
            Ok(c.kind().coerce(c.aggregate(Aggregate::Min)?))
        })
    }

    pub fn max(&self) -> Result<Value> {
        self.scalar(CacheableOp::Max, |c| {
            Ok(c.kind().coerce(c.aggregate(Aggregate::Max)?))
        })
    }

    /// NULL when the column has no non-null values.
    pub fn sum(&self) -> Result<Value> {
        aggregate::require_numeric(&self.column, "sum")?;
        self.scalar(CacheableOp::Sum, |c| c.aggregate(Aggregate::Sum))
    }

    pub fn avg(&self) -> Result<Value> {
        aggregate::require_numeric(&self.column, "avg")?;
        self.scalar(CacheableOp::Avg, |c| c.aggregate(Aggregate::Avg))
    }

    /// Middle non-null value, or the mean of the middle two as a real.
    pub fn median(&self) -> Result<Value> {
        aggregate::require_numeric(&self.column, "median")?;
        self.scalar(CacheableOp::Median, |c| {
            let Some(q) = aggregate::median_window(&c.column, c.count()?)? else {
                return Ok(Value::Null);
            };
            let rows = c.db.fetch(&q, &c.context("median"))?;
            let middle: Vec<Value> = rows
                .into_iter()
                .filter_map(|r| r.into_values().into_iter().next())
                .collect();
            Ok(match middle.as_slice() {
                [one] => c.kind().coerce(one.clone()),
                [a, b] => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => Value::Float((x + y) / 2.0),
                    _ => Value::Null,
                },
                _ => Value::Null,
            })
        })
    }

    /// Every non-null value tied for the highest frequency, ascending, with
    /// that frequency.
    pub fn mode(&self) -> Result<Vec<(Value, i64)>> {
        let v = self.db.cached(CacheableOp::Mode.column_key(&self.column), || {
            let rows = self.db.fetch(&aggregate::mode(&self.column), &self.context("mode"))?;
            Ok(CachedValue::Counts(self.counts(rows)))
        })?;
        v.clone().into_counts().ok_or_else(|| unexpected("mode", &v))
    }

    /// Distinct values, NULL included, in order of first appearance.
    pub fn unique(&self) -> Result<Vec<Value>> {
        let v = self.db.cached(CacheableOp::Unique.column_key(&self.column), || {
            let q = aggregate::distinct_values(&self.column, self.table.rowid_column());
            let rows = self.db.fetch(&q, &self.context("unique"))?;
            let kind = self.kind();
            Ok(CachedValue::Sequence(
                rows.into_iter()
                    .filter_map(|r| r.into_values().into_iter().next())
                    .map(|v| kind.coerce(v))
                    .collect(),
            ))
        })?;
        v.clone().into_sequence().ok_or_else(|| unexpected("unique", &v))
    }

    /// Non-null value frequencies, most frequent first, ties by value.
    pub fn value_counts(&self) -> Result<Vec<(Value, i64)>> {
        let v = self
            .db
            .cached(CacheableOp::ValueCounts.column_key(&self.column), || {
                let rows = self
                    .db
                    .fetch(&aggregate::value_counts(&self.column), &self.context("value_counts"))?;
                Ok(CachedValue::Counts(self.counts(rows)))
            })?;
        v.clone()
            .into_counts()
            .ok_or_else(|| unexpected("value_counts", &v))
    }

    /// Distinct non-null values.
    pub fn distinct_count(&self) -> Result<i64> {
        let v = self.scalar(CacheableOp::DistinctCount, |c| {
            c.aggregate(Aggregate::DistinctCount)
        })?;
        Ok(v.as_i64().unwrap_or(0))
    }

    /// True when some value (NULL counts as a value) occurs more than once.
    pub fn has_duplicates(&self) -> Result<bool> {
        let v = self.scalar(CacheableOp::HasDuplicates, |c| {
            let unique = c.unique()?.len() as i64;
            Ok(Value::Bool(c.len()? != unique))
        })?;
        Ok(matches!(v, Value::Bool(true)))
    }

    /// Summary record. Numeric columns report
    /// `len, count, min, max, sum, avg, median`; others
    /// `len, count, min, max, unique`.
    pub fn describe(&self) -> Result<Vec<(String, Value)>> {
        let v = self.db.cached(CacheableOp::Describe.column_key(&self.column), || {
            let mut fields = vec![
                ("len".to_string(), Value::Int(self.len()?)),
                ("count".to_string(), Value::Int(self.count()?)),
                ("min".to_string(), self.min()?),
                ("max".to_string(), self.max()?),
            ];
            if self.kind().is_numeric() {
                fields.push(("sum".to_string(), self.sum()?));
                fields.push(("avg".to_string(), self.avg()?));
                fields.push(("median".to_string(), self.median()?));
            } else {
                fields.push(("unique".to_string(), Value::Int(self.unique()?.len() as i64)));
            }
            Ok(CachedValue::Record(fields))
        })?;
        v.clone().into_record().ok_or_else(|| unexpected("describe", &v))
    }

    /// Rows whose value is in `values`. Order and repeats in `values` do not
    /// change the cache key.
    pub fn count_in<I, V>(&self, values: I) -> Result<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set: Vec<Value> = values.into_iter().map(Into::into).collect();
        let q = aggregate::count_in(&self.table, &self.column, &set)?;
        let key = CacheableOp::CountIn.column_key_with(&self.column, vec![KeyArg::set(set)]);
        let v = self.db.cached(key, || {
            Ok(CachedValue::Scalar(
                self.db.fetch_scalar(&q, &self.context("count_in"))?,
            ))
        })?;
        Ok(as_count(&v))
    }

    /// Lazy single-column view over every row.
    pub fn values(&self) -> Result<LazyView<'db>> {
        LazyView::new(self.db, SelectQuery::new(Arc::clone(&self.table))).select([self.name()])
    }

    /// `f` over every value in table order; NULL cells stay `None`.
    pub fn apply<T, F>(&self, f: F) -> Result<Vec<Option<T>>>
    where
        F: FnMut(Value) -> T,
    {
        Ok(self
            .values()?
            .map_cells(f)?
            .into_iter()
            .filter_map(|mut cells| cells.pop())
            .collect())
    }

    fn context(&self, op: &str) -> String {
        format!("{}: {op}", self.column.qualified_name())
    }

    fn aggregate(&self, agg: Aggregate) -> Result<Value> {
        let q = aggregate::column_aggregate(&self.column, agg)?;
        self.db.fetch_scalar(&q, &self.context(agg.name()))
    }

    fn counts(&self, rows: Vec<Row>) -> Vec<(Value, i64)> {
        let kind = self.kind();
        rows.into_iter()
            .filter_map(|r| {
                let mut it = r.into_values().into_iter();
                let value = it.next()?;
                let n = it.next().and_then(|n| n.as_i64())?;
                Some((kind.coerce(value), n))
            })
            .collect()
    }

    fn scalar<F>(&self, op: CacheableOp, compute: F) -> Result<Value>
    where
        F: FnOnce(&Self) -> Result<Value>,
    {
        let v = self
            .db
            .cached(op.column_key(&self.column), || Ok(CachedValue::Scalar(compute(self)?)))?;
        match v {
            CachedValue::Scalar(s) => Ok(s),
            other => Err(unexpected(op.name(), &other)),
        }
    }
}

impl std::fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.column.qualified_name())
            .field("type", &self.column.sql_type())
            .finish()
    }
}
