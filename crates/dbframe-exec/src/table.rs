//! Table handle.

use std::ops::RangeBounds;
use std::sync::Arc;

use dbframe_cache::KeyArg;
use dbframe_core::schema::{ObjectKind, TableSchema};
use dbframe_core::types::{CachedValue, Row, Value};
use dbframe_core::{Error, Result};
use dbframe_planner::{aggregate, Predicate, RowRange, SelectQuery};

use crate::column::Column;
use crate::database::Database;
use crate::ops::CacheableOp;
use crate::view::LazyView;

#[derive(Clone)]
pub struct Table<'db> {
    db: &'db Database,
    schema: Arc<TableSchema>,
}

impl<'db> Table<'db> {
    pub(crate) fn new(db: &'db Database, schema: Arc<TableSchema>) -> Self {
        Self { db, schema }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Base table, view, or one of their temporary variants.
    pub fn kind(&self) -> ObjectKind {
        self.schema.kind()
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.column_names()
    }

    /// Every column in declared order.
    pub fn columns(&self) -> Vec<Column<'db>> {
        self.schema
            .columns()
            .iter()
            .map(|c| Column::new(self.db, Arc::clone(&self.schema), c.clone()))
            .collect()
    }

    pub fn column(&self, name: &str) -> Result<Column<'db>> {
        let col = self.schema.column(name)?;
        Ok(Column::new(self.db, Arc::clone(&self.schema), col.clone()))
    }

    /// Row count.
    pub fn len(&self) -> Result<i64> {
        let v = self.db.cached(CacheableOp::TableLen.table_key(self.name()), || {
            let q = aggregate::row_count(&self.schema);
            let n = self.db.fetch_scalar(&q, &format!("{}: len", self.name()))?;
            Ok(CachedValue::Scalar(n))
        })?;
        Ok(as_count(&v))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> Result<(i64, usize)> {
        let width = self.schema.width();
        let v = self.db.cached(CacheableOp::TableShape.table_key(self.name()), || {
            let len = self.len()?;
            Ok(CachedValue::Sequence(vec![
                Value::Int(len),
                Value::Int(width as i64),
            ]))
        })?;
        match v {
            CachedValue::Sequence(s) if s.len() == 2 => Ok((
                s[0].as_i64().unwrap_or(0),
                s[1].as_i64().map_or(width, |w| w as usize),
            )),
            other => Err(unexpected("shape", &other)),
        }
    }

    /// `describe()` of every column, in declared order.
    pub fn describe(&self) -> Result<Vec<(String, Vec<(String, Value)>)>> {
        self.columns()
            .into_iter()
            .map(|c| Ok((c.name().to_string(), c.describe()?)))
            .collect()
    }

    /// Lazy view over every row.
    pub fn view(&self) -> LazyView<'db> {
        LazyView::new(self.db, SelectQuery::new(Arc::clone(&self.schema)))
    }

    /// `f` over every non-null cell, row by row in table order.
    pub fn map_cells<T, F>(&self, f: F) -> Result<Vec<Vec<Option<T>>>>
    where
        F: FnMut(Value) -> T,
    {
        self.view().map_cells(f)
    }

    pub fn filter(&self, predicate: Predicate) -> Result<LazyView<'db>> {
        self.view().filter(predicate)
    }

    /// Ascending on each named column.
    pub fn sort_by<I, S>(&self, columns: I) -> Result<LazyView<'db>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.view().sort_by(columns)
    }

    pub fn sort_by_directions<I, S, D>(&self, pairs: I) -> Result<LazyView<'db>>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<str>,
    {
        self.view().sort_by_directions(pairs)
    }

    pub fn slice<R: RangeBounds<i64>>(&self, bounds: R) -> Result<LazyView<'db>> {
        self.view().slice(bounds)
    }

    pub fn head(&self, n: i64) -> Result<LazyView<'db>> {
        self.view().head(n)
    }

    /// Row at `index` in table order, if there is one.
    pub fn get(&self, index: i64) -> Result<Option<Row>> {
        let rows = self.view().with_range(RowRange::single(index)?).collect_rows()?;
        Ok(rows.into_iter().next())
    }

    /// Up to `n` rows in random order.
    pub fn sample(&self, n: i64) -> Result<LazyView<'db>> {
        Ok(self
            .view()
            .random_order()
            .with_range(RowRange::new(0, Some(n))?))
    }

    /// Rows matching `predicate`, memoized per compiled predicate.
    pub fn count_where(&self, predicate: &Predicate) -> Result<i64> {
        let q = aggregate::count_where(&self.schema, predicate)?;
        let key = CacheableOp::CountWhere.table_key_with(
            self.name(),
            vec![KeyArg::Text(q.sql.clone()), KeyArg::List(q.params.clone())],
        );
        let v = self.db.cached(key, || {
            let n = self
                .db
                .fetch_scalar(&q, &format!("{}: count_where", self.name()))?;
            Ok(CachedValue::Scalar(n))
        })?;
        Ok(as_count(&v))
    }
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("columns", &self.column_names())
            .finish()
    }
}

pub(crate) fn as_count(v: &CachedValue) -> i64 {
    v.as_scalar().and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn unexpected(op: &str, v: &CachedValue) -> Error {
    Error::InvalidArgument(format!(
        "cached {op} holds a {} value",
        v.category()
    ))
}
