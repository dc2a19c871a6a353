//! Forward, contiguous row ranges `[start, end)`.

use std::ops::{Bound, RangeBounds};

use dbframe_core::types::Value;
use dbframe_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    start: i64,
    /// `None` runs to the end of the result.
    end: Option<i64>,
}

impl RowRange {
    /// `[start, end)`. Negative bounds are rejected; `end < start` is empty.
    pub fn new(start: i64, end: Option<i64>) -> Result<Self> {
        if start < 0 {
            return Err(Error::Range(format!("negative start {start}")));
        }
        if let Some(e) = end {
            if e < 0 {
                return Err(Error::Range(format!("negative end {e}")));
            }
        }
        Ok(Self {
            start,
            end: end.map(|e| e.max(start)),
        })
    }

    /// Slice with an explicit step; only a step of 1 is contiguous.
    pub fn with_step(start: i64, end: Option<i64>, step: i64) -> Result<Self> {
        if step != 1 {
            return Err(Error::Range(format!(
                "step {step} is not supported, ranges must be contiguous"
            )));
        }
        Self::new(start, end)
    }

    /// From any Rust range over `i64`, e.g. `2..5`, `8..`, `..=3`.
    pub fn from_bounds<R: RangeBounds<i64>>(bounds: R) -> Result<Self> {
        let start = match bounds.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match bounds.end_bound() {
            Bound::Included(&e) => Some(e.saturating_add(1)),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };
        Self::new(start, end)
    }

    /// The single row at `index`.
    pub fn single(index: i64) -> Result<Self> {
        if index < 0 {
            return Err(Error::Range(format!("negative index {index}")));
        }
        Self::new(index, Some(index.saturating_add(1)))
    }

    pub fn all() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    /// Row count when bounded.
    pub fn len(&self) -> Option<i64> {
        self.end.map(|e| e - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Apply `inner`, given relative to this range, and return the absolute range.
    pub fn compose(&self, inner: RowRange) -> RowRange {
        let start = self.start.saturating_add(inner.start);
        let inner_end = inner.end.map(|e| self.start.saturating_add(e));
        let end = match (self.end, inner_end) {
            (None, e) | (e, None) => e,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        RowRange {
            start,
            end: end.map(|e| e.max(start)),
        }
    }

    /// Bound parameters for `LIMIT ? OFFSET ?`; an open end is `LIMIT -1`.
    pub fn limit_offset(&self) -> [Value; 2] {
        [
            Value::Int(self.len().unwrap_or(-1)),
            Value::Int(self.start),
        ]
    }
}

impl Default for RowRange {
    fn default() -> Self {
        Self::all()
    }
}
