//! Hit/miss/admission counters and peak tracking.
//!
//! Cheap atomics only; the snapshot is what gets logged or printed.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::budget::Rejection;

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    admitted: AtomicU64,
    rejected_item: AtomicU64,
    rejected_budget: AtomicU64,
    peak_bytes: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub admitted: u64,
    pub rejected_item: u64,
    pub rejected_budget: u64,
    pub peak_bytes: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an admission and the total bytes in use right after it.
    pub fn record_admitted(&self, used_bytes: usize) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        let mut cur = self.peak_bytes.load(Ordering::Relaxed);
        while used_bytes > cur {
            match self.peak_bytes.compare_exchange(
                cur,
                used_bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            used_bytes,
            peak = self.peak_bytes.load(Ordering::Relaxed),
            "cache usage"
        );
    }

    pub fn record_rejected(&self, why: &Rejection) {
        match why {
            Rejection::ItemTooLarge { .. } => self.rejected_item.fetch_add(1, Ordering::Relaxed),
            Rejection::OverBudget { .. } => self.rejected_budget.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_item: self.rejected_item.load(Ordering::Relaxed),
            rejected_budget: self.rejected_budget.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes(),
        }
    }
}
