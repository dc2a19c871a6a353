//! Admission-controlled memoization.
//!
//! A value is stored iff its estimated size fits under the per-item cap and
//! the running total stays within the aggregate cap. Nothing is evicted to
//! make room; a rejected value is handed back to the caller uncached.
//!
//! The entry map is guarded by a mutex and the running total by the
//! [`ByteBudget`] CAS. Insertion is insert-if-absent under the map lock, so
//! two callers racing on the same key account its bytes once. Computations run
//! with no lock held, so a computation may itself consult the cache.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dbframe_core::config::CacheConfig;
use dbframe_core::types::CachedValue;
use dbframe_core::Result;

use crate::budget::{ByteBudget, Rejection, Reservation};
use crate::digest::{CacheDigest, DigestBuilder};
use crate::key::CacheKey;
use crate::sizing::EstimateSize;
use crate::tracking::{CacheStats, CacheStatsSnapshot};

/// Outcome of offering a value to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { size: usize },
    /// The key was already cached; the stored value is kept unchanged.
    Present,
    Rejected(Rejection),
    Disabled,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

struct Entry {
    value: CachedValue,
    reservation: Reservation,
}

pub struct BoundedCache {
    enabled: bool,
    budget: ByteBudget,
    entries: Mutex<BTreeMap<CacheKey, Entry>>,
    stats: CacheStats,
}

impl BoundedCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        let mut cache = Self::with_limits(cfg.max_item_bytes(), cfg.max_dict_bytes());
        cache.enabled = cfg.enabled;
        cache
    }

    /// Enabled cache with explicit byte limits.
    pub fn with_limits(max_item_bytes: usize, max_dict_bytes: usize) -> Self {
        Self {
            enabled: true,
            budget: ByteBudget::new(max_item_bytes, max_dict_bytes),
            entries: Mutex::new(BTreeMap::new()),
            stats: CacheStats::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CacheKey, Entry>> {
        // Entries are only ever inserted whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the stored value, if any.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }
        let found = self.lock().get(key).map(|e| e.value.clone());
        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.enabled && self.lock().contains_key(key)
    }

    /// Offer a freshly computed value. Never fails; rejection only means the
    /// value stays uncached.
    pub fn admit(&self, key: CacheKey, value: &CachedValue) -> Admission {
        if !self.enabled {
            return Admission::Disabled;
        }
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return Admission::Present;
        }
        let size = value.estimated_size();
        match self.budget.try_reserve(size) {
            Ok(reservation) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %key, size, "cache admit");
                entries.insert(
                    key,
                    Entry {
                        value: value.clone(),
                        reservation,
                    },
                );
                self.stats.record_admitted(self.budget.used_bytes());
                Admission::Admitted { size }
            }
            Err(why) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %key, reason = %why, "cache reject");
                self.stats.record_rejected(&why);
                Admission::Rejected(why)
            }
        }
    }

    /// Return the cached value for `key`, or run `compute`, offer its result
    /// and return it whether or not it was admitted.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<CachedValue>
    where
        F: FnOnce() -> Result<CachedValue>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.admit(key, &value);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sum of the estimated sizes of all stored entries.
    pub fn total_bytes(&self) -> usize {
        self.budget.used_bytes()
    }

    pub fn max_item_bytes(&self) -> usize {
        self.budget.max_item_bytes()
    }

    pub fn max_dict_bytes(&self) -> usize {
        self.budget.capacity_bytes()
    }

    /// Keys in canonical order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().keys().cloned().collect()
    }

    /// `(key, value, size)` for every entry in key order.
    pub fn snapshot(&self) -> Vec<(CacheKey, CachedValue, usize)> {
        self.lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone(), e.reservation.bytes()))
            .collect()
    }

    /// Digest of the full cache content. Equal digests mean equal contents.
    pub fn content_digest(&self) -> Result<CacheDigest> {
        let entries = self.lock();
        let mut digest = DigestBuilder::new();
        for (key, entry) in entries.iter() {
            digest.entry(key, &entry.value, entry.reservation.bytes())?;
        }
        Ok(digest.finish())
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.len())
            .field("budget", &self.budget)
            .finish()
    }
}
