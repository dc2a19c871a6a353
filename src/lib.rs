#![forbid(unsafe_code)]
//! dbframe: lazily compiled table/column views over a read-only SQLite
//! database, with a size-bounded result cache.
//!
//! ```no_run
//! use dbframe::{CacheConfig, Database};
//!
//! let db = Database::open("forest.db", CacheConfig::default())?;
//! let trees = db.table("trees")?;
//! let tall = trees.filter(trees.column("height")?.gt(10.0)?)?;
//! for row in tall.rows()?.iter()? {
//!     println!("{:?}", row?);
//! }
//! # Ok::<(), dbframe::Error>(())
//! ```

pub use dbframe_cache as cache;
pub use dbframe_core::{config, schema, types};
pub use dbframe_exec as exec;
pub use dbframe_io as io;
pub use dbframe_planner as planner;

pub use dbframe_core::prelude::*;
pub use dbframe_exec::{Column, Database, LazyView, SweepReport, Table};
pub use dbframe_planner::{Predicate, RowRange, SortSpec};
