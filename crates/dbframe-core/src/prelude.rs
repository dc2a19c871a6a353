//! Convenient re-exports for downstream crates.

pub use crate::config::CacheConfig;
pub use crate::error::{Error, Result, SchemaTarget};
pub use crate::schema::{Catalog, ColumnRef, ObjectKind, TableSchema, ValueKind};
pub use crate::types::{CachedValue, Row, Value};
