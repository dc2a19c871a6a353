//! YAML query documents → [`SelectQuery`].
//!
//! Example:
//! ```yaml
//! table: trees
//! columns: [id, species, height]
//! filter:
//!   and:
//!     - { column: height, op: ">", value: 10 }
//!     - or:
//!         - { column: species, op: "==", value: oak }
//!         - { column: species, op: in, values: [ash, elm] }
//!     - not: { column: girth, op: is_null }
//! sort:
//!   - { column: height, direction: desc }
//!   - species
//! range: { start: 0, end: 20 }
//! ```

use serde::{Deserialize, Serialize};

use dbframe_core::schema::{Catalog, TableSchema};
use dbframe_core::types::Value;
use dbframe_core::{Error, Result};

use crate::predicate::{CompareOp, Predicate};
use crate::range::RowRange;
use crate::select::SelectQuery;
use crate::sort::{Direction, SortKey, SortSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDoc {
    pub table: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub filter: Option<FilterDoc>,
    #[serde(default)]
    pub sort: Vec<SortDoc>,
    #[serde(default)]
    pub range: Option<RangeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterDoc {
    And { and: Vec<FilterDoc> },
    Or { or: Vec<FilterDoc> },
    Not { not: Box<FilterDoc> },
    Leaf(LeafDoc),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafDoc {
    pub column: String,
    pub op: String,
    /// Missing or `null` compares against NULL.
    #[serde(default)]
    pub value: Option<Value>,
    /// Members for `in`, bounds for `between`.
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortDoc {
    Column(String),
    Keyed {
        column: String,
        #[serde(default)]
        direction: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeDoc {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub step: Option<i64>,
}

/// Parse a query document without binding it.
pub fn parse_query_doc(yaml_src: &str) -> Result<QueryDoc> {
    Ok(serde_yaml::from_str(yaml_src)?)
}

/// Parse and bind against `catalog` in one step.
pub fn parse_query(yaml_src: &str, catalog: &Catalog) -> Result<SelectQuery> {
    parse_query_doc(yaml_src)?.bind(catalog)
}

impl QueryDoc {
    /// Resolve names against the catalog and build the query. All schema,
    /// type and range errors surface here.
    pub fn bind(&self, catalog: &Catalog) -> Result<SelectQuery> {
        let table = catalog.shared(&self.table)?;
        let mut query = SelectQuery::new(std::sync::Arc::clone(table));

        if let Some(cols) = &self.columns {
            for c in cols {
                table.column(c)?;
            }
            query = query.select(cols.iter().cloned());
        }
        if let Some(filter) = &self.filter {
            query = query.filter(filter.build(table)?);
        }
        if !self.sort.is_empty() {
            let keys = self
                .sort
                .iter()
                .map(SortDoc::key)
                .collect::<Result<Vec<_>>>()?;
            query = query.sort(SortSpec::from_keys(table, keys)?);
        }
        if let Some(r) = &self.range {
            query = query.slice(RowRange::with_step(r.start, r.end, r.step.unwrap_or(1))?);
        }
        Ok(query)
    }
}

impl SortDoc {
    fn key(&self) -> Result<SortKey> {
        Ok(match self {
            SortDoc::Column(c) => SortKey::new(c.as_str(), Direction::Asc),
            SortDoc::Keyed { column, direction } => SortKey::new(
                column.as_str(),
                match direction {
                    Some(d) => Direction::parse(d)?,
                    None => Direction::Asc,
                },
            ),
        })
    }
}

impl FilterDoc {
    pub fn build(&self, table: &TableSchema) -> Result<Predicate> {
        match self {
            FilterDoc::And { and } => fold(and, table, "and", Predicate::and),
            FilterDoc::Or { or } => fold(or, table, "or", Predicate::or),
            FilterDoc::Not { not } => Ok(not.build(table)?.negate()),
            FilterDoc::Leaf(leaf) => leaf.build(table),
        }
    }
}

fn fold(
    items: &[FilterDoc],
    table: &TableSchema,
    name: &str,
    join: fn(Predicate, Predicate) -> Result<Predicate>,
) -> Result<Predicate> {
    let mut iter = items.iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidArgument(format!("'{name}' needs at least one operand")))?;
    iter.try_fold(first.build(table)?, |acc, item| join(acc, item.build(table)?))
}

impl LeafDoc {
    fn build(&self, table: &TableSchema) -> Result<Predicate> {
        let column = table.column(&self.column)?;
        let value = || self.value.clone().unwrap_or(Value::Null);
        let op = self.op.trim().to_ascii_lowercase();
        match op.as_str() {
            "in" => Predicate::is_in(column, self.values.iter().cloned()),
            "between" => match self.values.as_slice() {
                [lo, hi] => Predicate::between(column, lo.clone(), hi.clone()),
                other => Err(Error::InvalidArgument(format!(
                    "between on '{}' needs two values, got {}",
                    self.column,
                    other.len()
                ))),
            },
            "is_null" => Ok(Predicate::is_null(column)),
            "not_null" | "is_not_null" => Ok(Predicate::not_null(column)),
            "like" => match value() {
                Value::Text(p) => Predicate::like(column, p),
                other => Err(Error::InvalidArgument(format!(
                    "like on '{}' needs a text pattern, got {}",
                    self.column,
                    other.type_name()
                ))),
            },
            token => match CompareOp::parse(token) {
                Some(cmp) => Predicate::compare(column, cmp, value()),
                None => Err(Error::InvalidArgument(format!(
                    "unknown filter operator '{}'",
                    self.op
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new([TableSchema::new(
            "trees",
            [
                ("id", "INTEGER"),
                ("species", "TEXT"),
                ("height", "REAL"),
                ("girth", "REAL"),
            ],
        )])
    }

    #[test]
    fn full_document() {
        let src = r#"
table: trees
columns: [id, species]
filter:
  and:
    - { column: height, op: ">", value: 10 }
    - or:
        - { column: species, op: "==", value: oak }
        - { column: species, op: in, values: [elm, ash] }
    - not: { column: girth, op: is_null }
sort:
  - { column: height, direction: DESC }
  - species
range: { start: 0, end: 20 }
"#;
        let q = parse_query(src, &catalog()).unwrap().compile().unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"species\" FROM \"trees\" WHERE (\"height\" > ? AND \
             (\"species\" = ? OR \"species\" IN (?, ?)) AND (NOT \"girth\" IS NULL)) \
             ORDER BY \"height\" DESC, \"species\" ASC, \"_rowid_\" ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            q.params,
            vec![
                Value::Int(10),
                Value::from("oak"),
                Value::from("ash"),
                Value::from("elm"),
                Value::Int(20),
                Value::Int(0),
            ]
        );
    }

    #[test]
    fn null_value_means_is_null() {
        let src = "table: trees\nfilter: { column: girth, op: '==', value: null }\n";
        let q = parse_query(src, &catalog()).unwrap().compile().unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"trees\" WHERE \"girth\" IS NULL");
    }

    #[test]
    fn bad_documents_fail_before_compilation() {
        let cat = catalog();
        let unknown_table = parse_query("table: shrubs\n", &cat);
        assert!(matches!(unknown_table, Err(Error::Schema { .. })));

        let bad_op = parse_query(
            "table: trees\nfilter: { column: id, op: approx, value: 1 }\n",
            &cat,
        );
        assert!(matches!(bad_op, Err(Error::InvalidArgument(_))));

        let strided = parse_query("table: trees\nrange: { start: 0, end: 9, step: 2 }\n", &cat);
        assert!(matches!(strided, Err(Error::Range(_))));

        let bad_type = parse_query(
            "table: trees\nfilter: { column: height, op: '<', value: tall }\n",
            &cat,
        );
        assert!(matches!(bad_type, Err(Error::TypeMismatch(_))));

        let empty_and = parse_query("table: trees\nfilter: { and: [] }\n", &cat);
        assert!(matches!(empty_and, Err(Error::InvalidArgument(_))));

        let not_yaml = parse_query_doc("table: [");
        assert!(matches!(not_yaml, Err(Error::InvalidArgument(_))));
    }
}
