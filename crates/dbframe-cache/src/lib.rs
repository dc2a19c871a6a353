#![forbid(unsafe_code)]
//! dbframe-cache: deterministic size estimation and the bounded result cache.
//!
//! Every computed property the facade memoizes flows through
//! [`BoundedCache`]. Admission is decided purely from the estimated byte
//! size of the value against a per-item cap and an aggregate cap; nothing is
//! ever evicted to make room.
//!
//! No database access lives here. Computations are passed in as closures.

pub mod budget;
pub mod cache;
pub mod digest;
pub mod key;
pub mod sizing;
pub mod tracking;

pub use budget::{ByteBudget, Rejection, Reservation};
pub use cache::{Admission, BoundedCache};
pub use digest::{CacheDigest, DigestBuilder};
pub use key::{CacheKey, KeyArg, Owner};
pub use sizing::EstimateSize;
pub use tracking::{CacheStats, CacheStatsSnapshot};
