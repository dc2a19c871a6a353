//! Multi-key sort specifications.

use std::fmt;
use std::str::FromStr;

use dbframe_core::schema::TableSchema;
use dbframe_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::sql::quote_ident;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// `"asc"` or `"desc"`, any case.
    pub fn parse(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidArgument(format!(
                "sort direction must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Direction::parse(s)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Ordered sort keys with unique columns, validated against one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Validate `keys` against `table`. A repeated column keeps only its last
    /// occurrence, position and direction both.
    pub fn from_keys(table: &TableSchema, keys: impl IntoIterator<Item = SortKey>) -> Result<Self> {
        let mut out: Vec<SortKey> = Vec::new();
        for key in keys {
            table.column(&key.column)?;
            out.retain(|k| k.column != key.column);
            out.push(key);
        }
        Ok(Self { keys: out })
    }

    /// Ascending on each named column.
    pub fn ascending<I, S>(table: &TableSchema, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_keys(
            table,
            columns
                .into_iter()
                .map(|c| SortKey::new(c.as_ref(), Direction::Asc)),
        )
    }

    /// `(column, "asc" | "desc")` pairs in priority order.
    pub fn with_directions<I, S, D>(table: &TableSchema, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<str>,
    {
        let keys = pairs
            .into_iter()
            .map(|(c, d)| Ok(SortKey::new(c.as_ref(), Direction::parse(d.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_keys(table, keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn validate(&self, table: &TableSchema) -> Result<()> {
        self.keys
            .iter()
            .try_for_each(|k| table.column(&k.column).map(|_| ()))
    }

    /// `ORDER BY ...` in key order. `tiebreak` names the row-id alias to sort
    /// by last, so rows with equal keys keep table order. `None` for an empty
    /// spec.
    pub fn to_sql(&self, tiebreak: Option<&str>) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let mut terms: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{} {}", quote_ident(&k.column), k.direction.sql()))
            .collect();
        if let Some(rowid) = tiebreak {
            terms.push(format!("{} ASC", quote_ident(rowid)));
        }
        Some(format!("ORDER BY {}", terms.join(", ")))
    }
}
