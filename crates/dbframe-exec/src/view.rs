//! Lazy views: a base table plus filter, order, range and projection.
//!
//! Nothing touches the engine until `rows()`, `collect_rows()` or `count()`.
//! A `QueryRows` keeps its prepared statement and re-executes it on every
//! `iter()`, so each traversal sees the store as it is at that moment.

use std::ops::RangeBounds;

use dbframe_core::schema::ValueKind;
use dbframe_core::types::{Row, Value};
use dbframe_core::Result;
use dbframe_io::{Cursor, PreparedStatement};
use dbframe_planner::{CompiledQuery, Predicate, RowRange, SelectQuery, SortSpec};

use crate::database::Database;

#[derive(Clone)]
pub struct LazyView<'db> {
    db: &'db Database,
    query: SelectQuery,
}

impl<'db> LazyView<'db> {
    pub(crate) fn new(db: &'db Database, query: SelectQuery) -> Self {
        Self { db, query }
    }

    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// AND `predicate` onto the current filter. Every leaf must belong to
    /// this view's table.
    pub fn filter(self, predicate: Predicate) -> Result<Self> {
        predicate.validate(self.query.table())?;
        Ok(Self {
            db: self.db,
            query: self.query.filter(predicate),
        })
    }

    pub fn sort(self, spec: SortSpec) -> Result<Self> {
        spec.validate(self.query.table())?;
        Ok(Self {
            db: self.db,
            query: self.query.sort(spec),
        })
    }

    /// Ascending on each named column.
    pub fn sort_by<I, S>(self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let spec = SortSpec::ascending(self.query.table(), columns)?;
        self.sort(spec)
    }

    /// `(column, "asc" | "desc")` pairs in priority order.
    pub fn sort_by_directions<I, S, D>(self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<str>,
    {
        let spec = SortSpec::with_directions(self.query.table(), pairs)?;
        self.sort(spec)
    }

    pub fn random_order(self) -> Self {
        Self {
            db: self.db,
            query: self.query.random_order(),
        }
    }

    /// Rows `[start, end)` of what this view currently yields.
    pub fn slice<R: RangeBounds<i64>>(self, bounds: R) -> Result<Self> {
        Ok(self.with_range(RowRange::from_bounds(bounds)?))
    }

    pub fn with_range(self, range: RowRange) -> Self {
        Self {
            db: self.db,
            query: self.query.slice(range),
        }
    }

    pub fn head(self, n: i64) -> Result<Self> {
        Ok(self.with_range(RowRange::new(0, Some(n))?))
    }

    /// Project onto the named columns, in the given order.
    pub fn select<I, S>(self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for c in &columns {
            self.query.table().column(c)?;
        }
        Ok(Self {
            db: self.db,
            query: self.query.select(columns),
        })
    }

    pub fn columns(&self) -> Vec<String> {
        self.query.output_columns()
    }

    pub fn compile(&self) -> Result<CompiledQuery> {
        self.query.compile()
    }

    /// Number of rows the view yields, without fetching them.
    pub fn count(&self) -> Result<i64> {
        let q = self.query.compile_count()?;
        let v = self.db.fetch_scalar(&q, self.query.table().name())?;
        Ok(v.as_i64().unwrap_or(0))
    }

    /// Prepare the statement once; iterate as often as needed.
    pub fn rows(&self) -> Result<QueryRows<'db>> {
        let compiled = self.query.compile()?;
        self.db.ensure_open()?;
        let table = self.query.table();
        let columns = self.query.output_columns();
        let kinds = columns
            .iter()
            .map(|c| table.column(c).map(|col| col.kind()).unwrap_or(ValueKind::Any))
            .collect();
        let statement = self
            .db
            .executor()
            .prepare(&compiled.sql)
            .map_err(|e| e.with_context(table.name()))?;
        Ok(QueryRows {
            statement,
            params: compiled.params,
            columns,
            kinds,
            context: table.name().to_string(),
        })
    }

    pub fn collect_rows(&self) -> Result<Vec<Row>> {
        let mut rows = self.rows()?;
        let out: Result<Vec<Row>> = rows.iter()?.collect();
        out
    }

    /// Apply `f` to every non-null cell in one traversal. NULL cells are
    /// passed over and come back as `None`.
    pub fn map_cells<T, F>(&self, mut f: F) -> Result<Vec<Vec<Option<T>>>>
    where
        F: FnMut(Value) -> T,
    {
        let mut rows = self.rows()?;
        let mut out = Vec::new();
        for row in rows.iter()? {
            let cells = row?
                .into_values()
                .into_iter()
                .map(|v| if v.is_null() { None } else { Some(f(v)) })
                .collect();
            out.push(cells);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for LazyView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyView").field("query", &self.query).finish()
    }
}

/// A prepared view statement.
pub struct QueryRows<'db> {
    statement: Box<dyn PreparedStatement + 'db>,
    params: Vec<Value>,
    columns: Vec<String>,
    kinds: Vec<ValueKind>,
    context: String,
}

impl<'db> QueryRows<'db> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        self.statement.sql()
    }

    /// Execute the statement afresh and stream its rows.
    pub fn iter(&mut self) -> Result<RowIter<'_>> {
        let cursor = self
            .statement
            .execute(&self.params)
            .map_err(|e| e.with_context(self.context.as_str()))?;
        Ok(RowIter {
            cursor,
            kinds: &self.kinds,
            context: &self.context,
            done: false,
        })
    }
}

/// Rows of one execution, coerced to the declared column kinds.
pub struct RowIter<'s> {
    cursor: Box<dyn Cursor + 's>,
    kinds: &'s [ValueKind],
    context: &'s str,
    done: bool,
}

impl Iterator for RowIter<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next_row() {
            Ok(Some(row)) => {
                let values = row
                    .into_values()
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| match self.kinds.get(i) {
                        Some(kind) => kind.coerce(v),
                        None => v,
                    })
                    .collect();
                Some(Ok(Row::new(values)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.with_context(self.context)))
            }
        }
    }
}
