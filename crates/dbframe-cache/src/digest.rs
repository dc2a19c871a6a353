//! Content digests over cache entries.
//!
//! Each entry feeds its key, its accounted size and its value into one blake3
//! hasher. Variable-length fields are length-prefixed, so neighbouring entries
//! cannot run together and produce the same byte stream.

use std::fmt;

use blake3::Hasher;
use serde::Serialize;

use dbframe_core::types::CachedValue;
use dbframe_core::Result;

use crate::key::CacheKey;

/// Fingerprint of a cache's full content. Equal digests mean equal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheDigest([u8; 32]);

impl CacheDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for CacheDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Accumulates entries in the order they are offered; callers feed them in
/// key order.
#[derive(Default)]
pub struct DigestBuilder {
    hasher: Hasher,
    entries: u64,
}

impl DigestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, key: &CacheKey, value: &CachedValue, size: usize) -> Result<()> {
        self.field(&serde_json::to_vec(key)?);
        self.field(value.category().as_bytes());
        self.field(&serde_json::to_vec(value)?);
        self.hasher.update(&(size as u64).to_le_bytes());
        self.entries += 1;
        Ok(())
    }

    pub fn finish(mut self) -> CacheDigest {
        self.hasher.update(&self.entries.to_le_bytes());
        CacheDigest(self.hasher.finalize().into())
    }

    fn field(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}
