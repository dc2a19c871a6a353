//! Schema handles built once at discovery time and never mutated.
//!
//! A [`Catalog`] is the explicit name → handle registry for tables; each
//! [`TableSchema`] is the registry for its columns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Value;

/// Value type inferred from a declared SQL type using SQLite affinity rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Real,
    Numeric,
    Boolean,
    Text,
    Blob,
    /// No declared type; anything goes.
    Any,
}

impl ValueKind {
    pub fn from_declared(sql_type: &str) -> Self {
        let t = sql_type.trim().to_ascii_uppercase();
        if t.is_empty() {
            ValueKind::Any
        } else if t.contains("BOOL") {
            ValueKind::Boolean
        } else if t.contains("INT") {
            ValueKind::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            ValueKind::Text
        } else if t.contains("BLOB") {
            ValueKind::Blob
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            ValueKind::Real
        } else {
            ValueKind::Numeric
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Integer | ValueKind::Real | ValueKind::Numeric | ValueKind::Boolean
        )
    }

    /// Whether a literal of this value's storage class may be compared with
    /// a column of this kind. NULL is handled by the callers.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ValueKind::Any, _) => true,
            (k, v) if k.is_numeric() => v.is_numeric(),
            (ValueKind::Text, Value::Text(_)) => true,
            (ValueKind::Blob, Value::Blob(_)) => true,
            _ => false,
        }
    }

    /// Coerce a raw engine value to the declared kind.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (ValueKind::Boolean, Value::Int(i)) if i == 0 || i == 1 => Value::Bool(i == 1),
            (ValueKind::Real, Value::Int(i)) => Value::Float(i as f64),
            (_, v) => v,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Numeric => "numeric",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
            ValueKind::Blob => "blob",
            ValueKind::Any => "any",
        };
        f.write_str(s)
    }
}

/// Handle to one column of one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    table: Arc<str>,
    name: String,
    sql_type: String,
    kind: ValueKind,
    position: usize,
}

impl ColumnRef {
    pub fn new(
        table: Arc<str>,
        name: impl Into<String>,
        sql_type: impl Into<String>,
        position: usize,
    ) -> Self {
        let sql_type = sql_type.into();
        Self {
            kind: ValueKind::from_declared(&sql_type),
            table,
            name: name.into(),
            sql_type,
            position,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Zero-based position in the table's declared column order.
    pub fn position(&self) -> usize {
        self.position
    }

    /// `table.column`, used as cache owner identity and in diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// Names under which SQLite exposes the implicit row id, in lookup order.
pub const ROWID_ALIASES: [&str; 3] = ["_rowid_", "rowid", "oid"];

/// What kind of schema object a [`TableSchema`] describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Table,
    View,
    TempTable,
    TempView,
}

impl ObjectKind {
    /// From a `sqlite_master` / `sqlite_temp_master` `type` column.
    pub fn from_master(object_type: &str, temp: bool) -> Option<Self> {
        match (object_type, temp) {
            ("table", false) => Some(ObjectKind::Table),
            ("view", false) => Some(ObjectKind::View),
            ("table", true) => Some(ObjectKind::TempTable),
            ("view", true) => Some(ObjectKind::TempView),
            _ => None,
        }
    }

    pub fn is_view(self) -> bool {
        matches!(self, ObjectKind::View | ObjectKind::TempView)
    }

    pub fn is_temp(self) -> bool {
        matches!(self, ObjectKind::TempTable | ObjectKind::TempView)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::TempTable => "temp table",
            ObjectKind::TempView => "temp view",
        };
        f.write_str(s)
    }
}

/// A table or view: its columns in declared order plus the row-id alias
/// usable for stable ordering, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: Arc<str>,
    columns: Vec<ColumnRef>,
    kind: ObjectKind,
    rowid: Option<&'static str>,
}

impl TableSchema {
    /// Build a table from `(column_name, declared_sql_type)` pairs in declared order.
    pub fn new<I, N, T>(name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let name: Arc<str> = Arc::from(name);
        let columns: Vec<ColumnRef> = columns
            .into_iter()
            .enumerate()
            .map(|(pos, (col, ty))| ColumnRef::new(Arc::clone(&name), col, ty, pos))
            .collect();
        let rowid = unshadowed_rowid(&columns);
        Self {
            name,
            columns,
            kind: ObjectKind::Table,
            rowid,
        }
    }

    /// `false` for `WITHOUT ROWID` tables. Turning it back on still skips
    /// aliases shadowed by a declared column.
    pub fn with_rowid(mut self, has_rowid: bool) -> Self {
        self.rowid = if has_rowid && !self.kind.is_view() {
            unshadowed_rowid(&self.columns)
        } else {
            None
        };
        self
    }

    /// Views never expose a row id.
    pub fn with_kind(mut self, kind: ObjectKind) -> Self {
        self.kind = kind;
        if kind.is_view() {
            self.rowid = None;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn has_rowid(&self) -> bool {
        self.rowid.is_some()
    }

    /// The first of `_rowid_`, `rowid`, `oid` that no column shadows.
    pub fn rowid_column(&self) -> Option<&'static str> {
        self.rowid
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn column(&self, name: &str) -> Result<&ColumnRef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::unknown_column(self.name(), name, self.column_names()))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Column names match SQL identifiers case-insensitively, so `ROWID` shadows `rowid`.
fn unshadowed_rowid(columns: &[ColumnRef]) -> Option<&'static str> {
    ROWID_ALIASES
        .into_iter()
        .find(|alias| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(alias)))
}

/// Table and view registry produced by one schema introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<TableSchema>>,
}

impl Catalog {
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name().to_string(), Arc::new(t)))
                .collect(),
        }
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema> {
        self.shared(name).map(|t| &**t)
    }

    /// Shared handle, for views and facades that outlive the borrow.
    pub fn shared(&self, name: &str) -> Result<&Arc<TableSchema>> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::unknown_table(name, self.table_names()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Tables and views in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableSchema>> {
        self.tables.values()
    }

    /// Names of the objects of one kind, in name order.
    pub fn names_of(&self, kind: ObjectKind) -> Vec<String> {
        self.tables
            .values()
            .filter(|t| t.kind() == kind)
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
