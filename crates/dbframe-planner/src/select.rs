//! SELECT compilation for lazy views.
//!
//! Builder calls may come in any order; the statement is always
//! `SELECT <cols> FROM t [WHERE ..] [ORDER BY ..] [LIMIT ? OFFSET ?]`.

use std::fmt;
use std::sync::Arc;

use dbframe_core::schema::TableSchema;
use dbframe_core::types::Value;
use dbframe_core::Result;

use crate::predicate::Predicate;
use crate::range::RowRange;
use crate::sort::SortSpec;
use crate::sql::quote_ident;

/// Complete statement text and its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "\n  params: [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOrder {
    Keys(SortSpec),
    /// `ORDER BY RANDOM()`, for sampling.
    Random,
}

#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: Arc<TableSchema>,
    projection: Option<Vec<String>>,
    predicate: Option<Predicate>,
    order: Option<RowOrder>,
    range: Option<RowRange>,
}

impl SelectQuery {
    pub fn new(table: Arc<TableSchema>) -> Self {
        Self {
            table,
            projection: None,
            predicate: None,
            order: None,
            range: None,
        }
    }

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    pub fn shared_table(&self) -> &Arc<TableSchema> {
        &self.table
    }

    /// AND `predicate` onto any existing filter.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing & predicate,
            None => predicate,
        });
        self
    }

    /// Replace the ordering.
    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.order = Some(RowOrder::Keys(spec));
        self
    }

    pub fn random_order(mut self) -> Self {
        self.order = Some(RowOrder::Random);
        self
    }

    /// Narrow to `range`, relative to any range already applied.
    pub fn slice(mut self, range: RowRange) -> Self {
        self.range = Some(match self.range {
            Some(outer) => outer.compose(range),
            None => range,
        });
        self
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn order(&self) -> Option<&RowOrder> {
        self.order.as_ref()
    }

    pub fn range(&self) -> Option<RowRange> {
        self.range
    }

    /// Names of the columns each row will carry.
    pub fn output_columns(&self) -> Vec<String> {
        match &self.projection {
            Some(cols) => cols.clone(),
            None => self.table.column_names(),
        }
    }

    /// Validate every part against the base table and build the statement.
    pub fn compile(&self) -> Result<CompiledQuery> {
        let table = self.table.as_ref();
        let mut params = Vec::new();

        let cols = match &self.projection {
            Some(cols) => {
                let quoted = cols
                    .iter()
                    .map(|c| table.column(c).map(|_| quote_ident(c)))
                    .collect::<Result<Vec<_>>>()?;
                quoted.join(", ")
            }
            None => "*".to_string(),
        };
        let mut sql = format!("SELECT {cols} FROM {}", quote_ident(table.name()));

        if let Some(pred) = &self.predicate {
            let frag = pred.compile(table)?;
            sql.push_str(" WHERE ");
            sql.push_str(&frag.sql);
            params.extend(frag.params);
        }

        match &self.order {
            Some(RowOrder::Keys(spec)) => {
                spec.validate(table)?;
                if let Some(order_by) = spec.to_sql(table.rowid_column()) {
                    sql.push(' ');
                    sql.push_str(&order_by);
                }
            }
            Some(RowOrder::Random) => sql.push_str(" ORDER BY RANDOM()"),
            None => {}
        }

        if let Some(range) = &self.range {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.extend(range.limit_offset());
        }

        Ok(CompiledQuery { sql, params })
    }

    /// `COUNT(*)` of the rows this query would yield.
    pub fn compile_count(&self) -> Result<CompiledQuery> {
        if self.range.is_none() {
            let table = self.table.as_ref();
            let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table.name()));
            let mut params = Vec::new();
            if let Some(pred) = &self.predicate {
                let frag = pred.compile(table)?;
                sql.push_str(" WHERE ");
                sql.push_str(&frag.sql);
                params = frag.params;
            }
            return Ok(CompiledQuery { sql, params });
        }
        let inner = self.compile()?;
        Ok(CompiledQuery {
            sql: format!("SELECT COUNT(*) FROM ({})", inner.sql),
            params: inner.params,
        })
    }
}
