use std::fmt;

use thiserror::Error;

/// Canonical result for dbframe.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed engine error carried by [`Error::QueryExecution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a [`Error::Schema`] failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaTarget {
    Table,
    Column { table: String },
}

impl fmt::Display for SchemaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaTarget::Table => write!(f, "table"),
            SchemaTarget::Column { table } => write!(f, "column of table '{table}'"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: no such {target} '{name}' (expected one of: {})", .valid.join(", "))]
    Schema {
        target: SchemaTarget,
        name: String,
        valid: Vec<String>,
    },

    #[error("predicate mixes tables: query is over '{expected}' but references '{found}'")]
    CrossTablePredicate { expected: String, found: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("range error: {0}")]
    Range(String),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("query failed ({context}): {source}\n  sql: {sql}")]
    QueryExecution {
        context: String,
        sql: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn unknown_table(name: impl Into<String>, valid: Vec<String>) -> Self {
        Error::Schema {
            target: SchemaTarget::Table,
            name: name.into(),
            valid,
        }
    }

    pub fn unknown_column(
        table: impl Into<String>,
        name: impl Into<String>,
        valid: Vec<String>,
    ) -> Self {
        Error::Schema {
            target: SchemaTarget::Column {
                table: table.into(),
            },
            name: name.into(),
            valid,
        }
    }

    /// Wrap an engine failure with the statement and the table/column it ran for.
    pub fn query(
        context: impl Into<String>,
        sql: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::QueryExecution {
            context: context.into(),
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// Re-annotate a query failure with a more specific context. Other errors pass through.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Error::QueryExecution { sql, source, .. } => Error::QueryExecution {
                context: context.into(),
                sql,
                source,
            },
            other => other,
        }
    }

    /// True for errors raised while building a request, before any I/O.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::Schema { .. }
                | Error::CrossTablePredicate { .. }
                | Error::TypeMismatch(_)
                | Error::Range(_)
                | Error::InvalidArgument(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_valid_names() {
        let err = Error::unknown_column("trees", "hieght", vec!["height".into(), "species".into()]);
        let msg = err.to_string();
        assert!(msg.contains("column of table 'trees'"));
        assert!(msg.contains("hieght"));
        assert!(msg.contains("height, species"));
        assert!(err.is_build_error());
    }

    #[test]
    fn with_context_only_touches_query_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::query("trees", "SELECT 1", io).with_context("trees.height: min");
        match &err {
            Error::QueryExecution { context, sql, .. } => {
                assert_eq!(context, "trees.height: min");
                assert_eq!(sql, "SELECT 1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_build_error());

        let range = Error::Range("negative".into()).with_context("ignored");
        assert!(matches!(range, Error::Range(_)));
    }
}
