#![forbid(unsafe_code)]
//! dbframe-planner: predicate trees, sort specs and row ranges → one
//! parameterized SQL statement.
//!
//! Design:
//! - Expressions are explicit enum trees built from column handles
//!   (`dbframe-core::schema::ColumnRef`), never SQL strings.
//! - Every value travels as a bound parameter; only quoted identifiers are
//!   spliced into SQL text.
//! - Schema, type and range problems are reported while building or
//!   compiling, so a bad request never reaches the engine.
//! - `eval` is an in-memory interpretation of the same trees, used to check
//!   the compiled SQL.
//!
//! NOTE: No database access here; the IO crate executes what we compile.

pub mod aggregate;
pub mod dsl;
pub mod eval;
pub mod predicate;
pub mod range;
pub mod select;
pub mod sort;
pub mod sql;

pub use aggregate::Aggregate;
pub use dsl::yaml::{parse_query, parse_query_doc, QueryDoc};
pub use predicate::{BoolOp, CompareOp, Condition, Predicate, SqlFragment};
pub use range::RowRange;
pub use select::{CompiledQuery, RowOrder, SelectQuery};
pub use sort::{Direction, SortKey, SortSpec};
