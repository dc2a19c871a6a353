//! Cache keys: owner identity, operation name, canonicalized arguments.

use std::fmt;

use dbframe_core::types::Value;
use serde::{Deserialize, Serialize};

/// The table or column a cached result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Owner {
    Table(String),
    Column { table: String, column: String },
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Table(t) => write!(f, "{t}"),
            Owner::Column { table, column } => write!(f, "{table}.{column}"),
        }
    }
}

/// One argument of a cached operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyArg {
    Value(Value),
    /// Order-significant list.
    List(Vec<Value>),
    /// Order-insensitive set; always stored sorted and deduplicated.
    Set(Vec<Value>),
    /// Pre-rendered argument such as compiled predicate SQL.
    Text(String),
}

impl KeyArg {
    /// Canonical set argument: `{b, a, a}` and `{a, b}` produce the same key.
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        let mut v: Vec<Value> = values.into_iter().collect();
        v.sort();
        v.dedup();
        KeyArg::Set(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub owner: Owner,
    pub op: String,
    pub args: Vec<KeyArg>,
}

impl CacheKey {
    pub fn table(table: impl Into<String>, op: &str) -> Self {
        Self {
            owner: Owner::Table(table.into()),
            op: op.to_string(),
            args: Vec::new(),
        }
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>, op: &str) -> Self {
        Self {
            owner: Owner::Column {
                table: table.into(),
                column: column.into(),
            },
            op: op.to_string(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: KeyArg) -> Self {
        self.args.push(arg);
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.op)?;
        if !self.args.is_empty() {
            write!(f, "({} args)", self.args.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_args_are_canonical() {
        let a = CacheKey::column("trees", "species", "count_in")
            .with_arg(KeyArg::set(vec!["oak".into(), "ash".into(), "oak".into()]));
        let b = CacheKey::column("trees", "species", "count_in")
            .with_arg(KeyArg::set(vec!["ash".into(), "oak".into()]));
        assert_eq!(a, b);
    }

    #[test]
    fn owner_and_op_distinguish_keys() {
        let t = CacheKey::table("trees", "len");
        let c = CacheKey::column("trees", "len", "len");
        assert_ne!(t, c);
        assert_eq!(t.to_string(), "trees:len");
        assert_eq!(c.to_string(), "trees.len:len");
        assert_ne!(
            CacheKey::column("trees", "h", "min"),
            CacheKey::column("trees", "h", "max")
        );
    }
}
