//! Byte budget with a per-item cap and an aggregate cap, plus the RAII
//! reservation handed out on successful admission.
//!
//! The running total is an atomic updated by compare-and-swap, so concurrent
//! reservations can never push it past capacity. Dropping a [`Reservation`]
//! returns its bytes (this only happens when the owning cache is dropped).

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Why a value was refused. Never surfaced as an error; the caller simply
/// keeps the value uncached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ItemTooLarge {
        size: usize,
        max_item: usize,
    },
    OverBudget {
        size: usize,
        used: usize,
        capacity: usize,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ItemTooLarge { size, max_item } => {
                write!(f, "item of {size} bytes exceeds per-item cap of {max_item}")
            }
            Rejection::OverBudget {
                size,
                used,
                capacity,
            } => write!(
                f,
                "item of {size} bytes does not fit: {used} of {capacity} bytes already used"
            ),
        }
    }
}

/// Shared inner state for the budget.
struct BudgetInner {
    capacity: usize,
    max_item: usize,
    used: AtomicUsize,
}

impl BudgetInner {
    fn try_reserve(&self, bytes: usize) -> Result<(), Rejection> {
        if bytes > self.max_item {
            return Err(Rejection::ItemTooLarge {
                size: bytes,
                max_item: self.max_item,
            });
        }
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return Err(Rejection::OverBudget {
                    size: bytes,
                    used: cur,
                    capacity: self.capacity,
                });
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Clone)]
pub struct ByteBudget {
    inner: Arc<BudgetInner>,
}

impl ByteBudget {
    pub fn new(max_item_bytes: usize, capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                capacity: capacity_bytes,
                max_item: max_item_bytes,
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// Reserve `bytes` iff `bytes <= max_item` and `used + bytes <= capacity`.
    pub fn try_reserve(&self, bytes: usize) -> Result<Reservation, Rejection> {
        self.inner.try_reserve(bytes)?;
        Ok(Reservation {
            inner: Arc::clone(&self.inner),
            bytes,
        })
    }

    pub fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    pub fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    pub fn max_item_bytes(&self) -> usize {
        self.inner.max_item
    }
}

impl fmt::Debug for ByteBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBudget")
            .field("used", &self.used_bytes())
            .field("capacity", &self.inner.capacity)
            .field("max_item", &self.inner.max_item)
            .finish()
    }
}

/// Bytes accounted to one cache entry. Dropping it returns them to the budget.
pub struct Reservation {
    inner: Arc<BudgetInner>,
    bytes: usize,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation").field("bytes", &self.bytes).finish()
    }
}
