//! Object-safe query-execution interface.
//!
//! Execution is split in two steps so a backend can hand out cursors that
//! borrow from a prepared statement, which in turn borrows the connection:
//! `prepare(sql)` → `execute(params)` → `next_row()` until `None`.

use dbframe_core::schema::Catalog;
use dbframe_core::types::{Row, Value};
use dbframe_core::Result;

/// Forward-only row source. Dropping it releases the underlying cursor.
pub trait Cursor {
    fn column_names(&self) -> &[String];

    fn next_row(&mut self) -> Result<Option<Row>>;
}

pub trait PreparedStatement {
    fn sql(&self) -> &str;

    /// Bind `params` in placeholder order and start a fresh cursor.
    fn execute<'s>(&'s mut self, params: &[Value]) -> Result<Box<dyn Cursor + 's>>;
}

pub trait QueryExecutor {
    fn prepare<'c>(&'c self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>>;

    /// Tables and their columns in declared order.
    fn describe_schema(&self) -> Result<Catalog>;

    /// Release the connection. Any later call returns `ConnectionClosed`.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Run one statement to completion; returns its column names and rows.
pub fn fetch_all(
    executor: &dyn QueryExecutor,
    sql: &str,
    params: &[Value],
) -> Result<(Vec<String>, Vec<Row>)> {
    let mut stmt = executor.prepare(sql)?;
    let mut cursor = stmt.execute(params)?;
    let columns = cursor.column_names().to_vec();
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row()? {
        rows.push(row);
    }
    Ok((columns, rows))
}
