//! The database facade: owns the connection, the schema catalog and the cache.
//!
//! Table and column handles borrow the `Database`, so closing it (which needs
//! `&mut self`) is only possible once every handle and view is gone.

use std::path::Path;

use serde::Serialize;

use dbframe_cache::{BoundedCache, CacheKey, CacheStatsSnapshot};
use dbframe_core::config::CacheConfig;
use dbframe_core::schema::{Catalog, ObjectKind};
use dbframe_core::types::{CachedValue, Row, Value};
use dbframe_core::{Error, Result};
use dbframe_io::{fetch_all, QueryExecutor, SqliteExecutor};
use dbframe_planner::{CompiledQuery, SelectQuery};

use crate::metrics::emit_span;
use crate::sweep::{self, SweepReport};
use crate::table::Table;
use crate::view::LazyView;

/// Extensions opened directly as SQLite files.
pub const DATABASE_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];
/// Extension loaded as a SQL script into memory.
pub const SCRIPT_EXTENSION: &str = "sql";

/// Cache figures as reported by `cache_stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub entries: usize,
    pub total_bytes: usize,
    pub max_item_bytes: usize,
    pub max_dict_bytes: usize,
    pub stats: CacheStatsSnapshot,
}

pub struct Database {
    executor: Box<dyn QueryExecutor>,
    catalog: Catalog,
    cache: BoundedCache,
    config: CacheConfig,
}

impl Database {
    /// Open a `.db`/`.sqlite`/`.sqlite3` file read-only, or load a `.sql`
    /// script into memory.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let executor = if DATABASE_EXTENSIONS.contains(&ext.as_str()) {
            SqliteExecutor::open_read_only(path)?
        } else if ext == SCRIPT_EXTENSION {
            let script = std::fs::read_to_string(path)
                .map_err(|e| Error::query(format!("read {}", path.display()), "", e))?;
            SqliteExecutor::from_script(&script)?
        } else {
            return Err(Error::InvalidArgument(format!(
                "unsupported file extension for {}: expected one of .sql, .db, .sqlite, .sqlite3",
                path.display()
            )));
        };
        Self::with_executor(Box::new(executor), config)
    }

    /// Build an in-memory database from a SQL script.
    pub fn open_in_memory(script: &str, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::with_executor(Box::new(SqliteExecutor::from_script(script)?), config)
    }

    /// Discover the schema through `executor` and, if configured, prime the cache.
    pub fn with_executor(executor: Box<dyn QueryExecutor>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let catalog = executor.describe_schema()?;
        let db = Self {
            executor,
            catalog,
            cache: BoundedCache::new(&config),
            config,
        };
        emit_span(
            "open",
            &[
                ("tables", db.catalog.len().to_string()),
                ("cache", db.config.enabled.to_string()),
            ],
        );
        if db.config.enabled && db.config.populate {
            db.populate_cache()?;
        }
        Ok(db)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Every table and view `table` accepts, in name order.
    pub fn table_names(&self) -> Vec<String> {
        self.catalog.table_names()
    }

    pub fn views(&self) -> Vec<String> {
        self.catalog.names_of(ObjectKind::View)
    }

    /// Temporary tables, which live only as long as the connection.
    pub fn temp_tables(&self) -> Vec<String> {
        self.catalog.names_of(ObjectKind::TempTable)
    }

    pub fn temp_views(&self) -> Vec<String> {
        self.catalog.names_of(ObjectKind::TempView)
    }

    pub fn table(&self, name: &str) -> Result<Table<'_>> {
        self.ensure_open()?;
        let schema = self.catalog.shared(name)?;
        Ok(Table::new(self, std::sync::Arc::clone(schema)))
    }

    /// Every table and view, in name order.
    pub fn tables(&self) -> Result<Vec<Table<'_>>> {
        self.ensure_open()?;
        Ok(self
            .catalog
            .tables()
            .map(|schema| Table::new(self, std::sync::Arc::clone(schema)))
            .collect())
    }

    /// Wrap an already-built query, e.g. one bound from a YAML document.
    pub fn view(&self, query: SelectQuery) -> Result<LazyView<'_>> {
        self.ensure_open()?;
        self.catalog.table(query.table().name())?;
        Ok(LazyView::new(self, query))
    }

    /// Run raw SQL. Repeated output column names get `_2`, `_3`, ... suffixes.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<(Vec<String>, Vec<Row>)> {
        self.ensure_open()?;
        let (columns, rows) = fetch_all(self.executor.as_ref(), sql, params)?;
        Ok((rename_duplicates(&columns), rows))
    }

    /// Run every registered cacheable operation once.
    pub fn populate_cache(&self) -> Result<SweepReport> {
        sweep::populate(self)
    }

    pub fn cache(&self) -> &BoundedCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheSummary {
        CacheSummary {
            enabled: self.cache.is_enabled(),
            entries: self.cache.len(),
            total_bytes: self.cache.total_bytes(),
            max_item_bytes: self.cache.max_item_bytes(),
            max_dict_bytes: self.cache.max_dict_bytes(),
            stats: self.cache.stats(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    /// Release the connection. A second call reports `ConnectionClosed`.
    pub fn close(&mut self) -> Result<()> {
        let out = self.executor.close();
        if out.is_ok() {
            emit_span("close", &[("entries", self.cache.len().to_string())]);
        }
        out
    }

    pub(crate) fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.executor.is_closed() {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Run a compiled statement to completion, tagging failures with `context`.
    pub(crate) fn fetch(&self, query: &CompiledQuery, context: &str) -> Result<Vec<Row>> {
        self.ensure_open()?;
        fetch_all(self.executor(), &query.sql, &query.params)
            .map(|(_, rows)| rows)
            .map_err(|e| e.with_context(context))
    }

    /// First column of the first row, or NULL for an empty result.
    pub(crate) fn fetch_scalar(&self, query: &CompiledQuery, context: &str) -> Result<Value> {
        let rows = self.fetch(query, context)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_values().into_iter().next())
            .unwrap_or(Value::Null))
    }

    /// Memoized call through the bounded cache.
    pub(crate) fn cached<F>(&self, key: CacheKey, compute: F) -> Result<CachedValue>
    where
        F: FnOnce() -> Result<CachedValue>,
    {
        self.ensure_open()?;
        self.cache.get_or_compute(key, compute)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.executor.is_closed() {
            if let Err(_e) = self.executor.close() {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "failed to close connection on drop");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.catalog.table_names())
            .field("closed", &self.is_closed())
            .field("cache", &self.cache)
            .finish()
    }
}

/// `[a, b, a, b, b]` → `[a, b, a_2, b_2, b_3]`.
pub fn rename_duplicates(columns: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        let seen = columns[..i].iter().filter(|c| *c == col).count();
        if seen == 0 {
            out.push(col.clone());
        } else {
            out.push(format!("{col}_{}", seen + 1));
        }
    }
    out
}
