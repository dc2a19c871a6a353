//! Cache configuration that the facade and CLI serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memoize cacheable operations.
    pub enabled: bool,

    /// Run the eager population sweep when the database is opened.
    pub populate: bool,

    /// Per-entry cap in megabytes.
    pub max_item_size_mb: f64,

    /// Aggregate cap in megabytes.
    pub max_dict_size_mb: f64,

    /// The sweep skips mode/unique/value_counts on tables with at least this many rows.
    pub sweep_row_limit: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            populate: false,
            max_item_size_mb: 2.0,
            max_dict_size_mb: 100.0,
            sweep_row_limit: 1_000_000,
        }
    }
}

impl CacheConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DBFRAME_CACHE`: enable memoization (`true`/`false`)
    /// - `DBFRAME_POPULATE_CACHE`: run the sweep on open
    /// - `DBFRAME_MAX_ITEM_SIZE_MB`: per-entry cap
    /// - `DBFRAME_MAX_DICT_SIZE_MB`: aggregate cap
    /// - `DBFRAME_SWEEP_ROW_LIMIT`: row threshold for the expensive sweep operations
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("DBFRAME_CACHE") {
            if let Some(v) = parse_flag(&s) {
                cfg.enabled = v;
            }
        }

        if let Ok(s) = std::env::var("DBFRAME_POPULATE_CACHE") {
            if let Some(v) = parse_flag(&s) {
                cfg.populate = v;
            }
        }

        if let Ok(s) = std::env::var("DBFRAME_MAX_ITEM_SIZE_MB") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.max_item_size_mb = v;
            }
        }

        if let Ok(s) = std::env::var("DBFRAME_MAX_DICT_SIZE_MB") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.max_dict_size_mb = v;
            }
        }

        if let Ok(s) = std::env::var("DBFRAME_SWEEP_ROW_LIMIT") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.sweep_row_limit = v;
            }
        }

        cfg
    }

    /// A config with memoization switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("max_item_size_mb", self.max_item_size_mb),
            ("max_dict_size_mb", self.max_dict_size_mb),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a non-negative number, got {v}"
                )));
            }
        }
        Ok(())
    }

    pub fn max_item_bytes(&self) -> usize {
        mb_to_bytes(self.max_item_size_mb)
    }

    pub fn max_dict_bytes(&self) -> usize {
        mb_to_bytes(self.max_dict_size_mb)
    }
}

fn mb_to_bytes(mb: f64) -> usize {
    if !mb.is_finite() || mb <= 0.0 {
        return 0;
    }
    (mb * BYTES_PER_MB).round() as usize
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
