#![forbid(unsafe_code)]
//! dbframe-exec: the table/column facade over a read-only SQLite store.
//!
//! - `Database` owns the executor, the schema catalog and the bounded cache.
//! - `Table` and `Column` borrow it and compile every request to one
//!   parameterized statement via `dbframe-planner`.
//! - Summaries are memoized through the `CacheableOp` registry; nothing
//!   bypasses `BoundedCache::get_or_compute`.
//! - `LazyView` defers execution until rows are requested and re-executes on
//!   every traversal.

pub mod column;
pub mod database;
pub mod metrics;
pub mod ops;
pub mod sweep;
pub mod table;
pub mod view;

pub use column::Column;
pub use database::{rename_duplicates, CacheSummary, Database};
pub use ops::{CacheableOp, KeyShape};
pub use sweep::SweepReport;
pub use table::Table;
pub use view::{LazyView, QueryRows, RowIter};
