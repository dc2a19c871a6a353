#![forbid(unsafe_code)]
//! dbframe-io: the query-execution seam and its SQLite implementation.
//!
//! - `executor`: object-safe traits the facade runs statements through.
//! - `sqlite`: `rusqlite`-backed executor (read-only files, in-memory scripts).

pub mod executor;
pub mod sqlite;

pub use executor::{fetch_all, Cursor, PreparedStatement, QueryExecutor};
pub use sqlite::SqliteExecutor;
