//! SQLite executor over `rusqlite`.
//!
//! Files are opened read-only. Scripts are loaded into a private in-memory
//! database which is then switched to `query_only`, so every executor is
//! read-only once constructed.

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, Rows, Statement};

use dbframe_core::schema::{Catalog, ObjectKind, TableSchema};
use dbframe_core::types::{Row, Value};
use dbframe_core::{Error, Result};

use crate::executor::{Cursor, PreparedStatement, QueryExecutor};

// Temp objects sort last so they replace same-named main objects in the
// catalog, matching SQLite's unqualified name resolution.
const LIST_TABLES: &str = "SELECT name, sql, type, 0 FROM sqlite_master \
     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
     UNION ALL \
     SELECT name, sql, type, 1 FROM sqlite_temp_master \
     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
     ORDER BY 4, 1";
const TABLE_INFO: &str = "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid";

pub struct SqliteExecutor {
    conn: Option<Connection>,
    label: String,
}

impl SqliteExecutor {
    /// Open an existing database file without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::query(format!("open {label}"), "", e))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %label, "opened sqlite database read-only");
        Ok(Self {
            conn: Some(conn),
            label,
        })
    }

    /// Load `script` into a fresh in-memory database.
    pub fn from_script(script: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::query("open in-memory database", "", e))?;
        conn.execute_batch(script)
            .map_err(|e| Error::query("load script", script, e))?;
        conn.pragma_update(None, "query_only", true)
            .map_err(|e| Error::query("set query_only", "PRAGMA query_only = 1", e))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = script.len(), "loaded sql script into memory");
        Ok(Self {
            conn: Some(conn),
            label: ":memory:".to_string(),
        })
    }

    /// Wrap a connection opened elsewhere.
    pub fn from_connection(conn: Connection, label: impl Into<String>) -> Self {
        Self {
            conn: Some(conn),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::ConnectionClosed)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn prepare<'c>(&'c self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>> {
        let conn = self.conn()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(%sql, "prepare");
        let stmt = conn
            .prepare(sql)
            .map_err(|e| Error::query("prepare", sql, e))?;
        Ok(Box::new(SqliteStatement {
            stmt,
            sql: sql.to_string(),
        }))
    }

    fn describe_schema(&self) -> Result<Catalog> {
        let conn = self.conn()?;
        let mut list = conn
            .prepare(LIST_TABLES)
            .map_err(|e| Error::query("list tables", LIST_TABLES, e))?;
        let tables = list
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| Error::query("list tables", LIST_TABLES, e))?;

        let mut info = conn
            .prepare(TABLE_INFO)
            .map_err(|e| Error::query("describe table", TABLE_INFO, e))?;
        let mut schemas = Vec::with_capacity(tables.len());
        for (name, ddl, object_type, temp) in tables {
            let Some(kind) = ObjectKind::from_master(&object_type, temp) else {
                continue;
            };
            let columns = info
                .query_map([&name], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    ))
                })
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| Error::query(format!("describe table {name}"), TABLE_INFO, e))?;
            let without_rowid = ddl
                .map(|s| s.to_ascii_uppercase().contains("WITHOUT ROWID"))
                .unwrap_or(false);
            schemas.push(
                TableSchema::new(&name, columns)
                    .with_rowid(!without_rowid)
                    .with_kind(kind),
            );
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(db = %self.label, tables = schemas.len(), "schema discovered");
        Ok(Catalog::new(schemas))
    }

    fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(Error::ConnectionClosed)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(db = %self.label, "closing connection");
        conn.close()
            .map_err(|(_, e)| Error::query(format!("close {}", self.label), "", e))
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

struct SqliteStatement<'c> {
    stmt: Statement<'c>,
    sql: String,
}

impl PreparedStatement for SqliteStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute<'s>(&'s mut self, params: &[Value]) -> Result<Box<dyn Cursor + 's>> {
        let columns: Vec<String> = self
            .stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let sql = &self.sql;
        let rows = self
            .stmt
            .query(params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| Error::query("execute", sql.as_str(), e))?;
        Ok(Box::new(SqliteCursor {
            rows,
            columns,
            sql: sql.clone(),
        }))
    }
}

struct SqliteCursor<'s> {
    rows: Rows<'s>,
    columns: Vec<String>,
    sql: String,
}

impl Cursor for SqliteCursor<'_> {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        let width = self.columns.len();
        let row = match self.rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(Error::query("fetch row", self.sql.as_str(), e)),
        };
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let v = row
                .get_ref(i)
                .map_err(|e| Error::query("read column", self.sql.as_str(), e))?;
            values.push(from_sql(v));
        }
        Ok(Some(Row::new(values)))
    }
}

fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

impl Drop for SqliteExecutor {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        if self.conn.is_some() {
            tracing::debug!(db = %self.label, "dropping open connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fetch_all;

    const SCRIPT: &str = "
        CREATE TABLE trees (id INTEGER PRIMARY KEY, species TEXT, height REAL);
        INSERT INTO trees VALUES (1, 'oak', 12.5), (2, 'ash', NULL), (3, 'oak', 7.0);
        CREATE TABLE kv (k TEXT PRIMARY KEY, v BLOB) WITHOUT ROWID;
    ";

    #[test]
    fn schema_discovery() {
        let exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        let catalog = exec.describe_schema().unwrap();
        assert_eq!(catalog.table_names(), vec!["kv", "trees"]);
        let trees = catalog.table("trees").unwrap();
        assert_eq!(trees.column_names(), vec!["id", "species", "height"]);
        assert_eq!(trees.column("height").unwrap().sql_type(), "REAL");
        assert!(trees.has_rowid());
        assert!(!catalog.table("kv").unwrap().has_rowid());
    }

    #[test]
    fn views_and_temp_objects_are_discovered() {
        let exec = SqliteExecutor::from_script(
            "CREATE TABLE trees (id INTEGER PRIMARY KEY, species TEXT, height REAL);
             CREATE VIEW tall AS SELECT id, height FROM trees WHERE height > 10;
             CREATE TEMP TABLE scratch (n INTEGER);
             CREATE TEMP VIEW oaks AS SELECT * FROM trees WHERE species = 'oak';",
        )
        .unwrap();
        let catalog = exec.describe_schema().unwrap();
        assert_eq!(catalog.table_names(), vec!["oaks", "scratch", "tall", "trees"]);
        assert_eq!(catalog.names_of(ObjectKind::View), vec!["tall"]);
        assert_eq!(catalog.names_of(ObjectKind::TempTable), vec!["scratch"]);
        assert_eq!(catalog.names_of(ObjectKind::TempView), vec!["oaks"]);

        let tall = catalog.table("tall").unwrap();
        assert_eq!(tall.column_names(), vec!["id", "height"]);
        assert_eq!(tall.kind(), ObjectKind::View);
        assert!(!tall.has_rowid());
        assert!(catalog.table("scratch").unwrap().has_rowid());
    }

    #[test]
    fn bound_parameters_round_trip() {
        let exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        let (cols, rows) = fetch_all(
            &exec,
            "SELECT id, height FROM trees WHERE species = ? ORDER BY id",
            &[Value::from("oak")],
        )
        .unwrap();
        assert_eq!(cols, vec!["id", "height"]);
        assert_eq!(
            rows,
            vec![
                Row::new(vec![Value::Int(1), Value::Float(12.5)]),
                Row::new(vec![Value::Int(3), Value::Float(7.0)]),
            ]
        );
    }

    #[test]
    fn statements_can_be_re_executed() {
        let exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        let mut stmt = exec.prepare("SELECT COUNT(*) FROM trees WHERE id > ?").unwrap();
        for (min, expected) in [(0, 3), (2, 1)] {
            let mut cur = stmt.execute(&[Value::Int(min)]).unwrap();
            assert_eq!(cur.next_row().unwrap().unwrap()[0], Value::Int(expected));
            assert!(cur.next_row().unwrap().is_none());
        }
    }

    #[test]
    fn engine_errors_carry_sql() {
        let exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        match exec.prepare("SELECT nope FROM trees") {
            Err(Error::QueryExecution { sql, .. }) => assert_eq!(sql, "SELECT nope FROM trees"),
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("expected failure"),
        };
    }

    #[test]
    fn script_databases_are_query_only() {
        let exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        let mut stmt = exec.prepare("DELETE FROM trees").unwrap();
        // The write is refused when the statement is stepped.
        let outcome = stmt.execute(&[]).and_then(|mut cur| cur.next_row());
        assert!(outcome.is_err());
    }

    #[test]
    fn closed_connection_rejects_work() {
        let mut exec = SqliteExecutor::from_script(SCRIPT).unwrap();
        exec.close().unwrap();
        assert!(exec.is_closed());
        assert!(matches!(exec.prepare("SELECT 1"), Err(Error::ConnectionClosed)));
        assert!(matches!(exec.describe_schema(), Err(Error::ConnectionClosed)));
        assert!(matches!(exec.close(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn read_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trees.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCRIPT).unwrap();
        }
        let exec = SqliteExecutor::open_read_only(&path).unwrap();
        let (_, rows) = fetch_all(&exec, "SELECT COUNT(*) FROM trees", &[]).unwrap();
        assert_eq!(rows[0][0], Value::Int(3));
        assert!(fetch_all(&exec, "INSERT INTO trees VALUES (9, 'elm', 1.0)", &[]).is_err());
    }
}
