//! Deterministic byte-size estimates for cacheable values.
//!
//! Sizes come from fixed per-category rules, never from inspecting the heap.
//! Containers have no header cost, so the estimate of a concatenation is
//! exactly the sum of the estimates of its parts.

use dbframe_core::types::{CachedValue, Value};

pub const NULL_BYTES: usize = 1;
pub const BOOL_BYTES: usize = 1;
pub const INT_BYTES: usize = 8;
pub const FLOAT_BYTES: usize = 8;
/// Per-element bookkeeping in sequences and mappings.
pub const SLOT_BYTES: usize = 8;
/// Width of the count stored beside each key in a counts mapping.
pub const COUNT_BYTES: usize = 8;

pub trait EstimateSize {
    fn estimated_size(&self) -> usize;
}

impl EstimateSize for Value {
    fn estimated_size(&self) -> usize {
        match self {
            Value::Null => NULL_BYTES,
            Value::Bool(_) => BOOL_BYTES,
            Value::Int(_) => INT_BYTES,
            Value::Float(_) => FLOAT_BYTES,
            Value::Text(s) => s.len(),
            Value::Blob(b) => b.len(),
        }
    }
}

impl EstimateSize for CachedValue {
    fn estimated_size(&self) -> usize {
        match self {
            CachedValue::Scalar(v) => v.estimated_size(),
            CachedValue::Sequence(items) => items.iter().fold(0usize, |acc, v| {
                acc.saturating_add(v.estimated_size().saturating_add(SLOT_BYTES))
            }),
            CachedValue::Counts(pairs) => pairs.iter().fold(0usize, |acc, (k, _)| {
                acc.saturating_add(k.estimated_size() + COUNT_BYTES + SLOT_BYTES)
            }),
            CachedValue::Record(fields) => fields.iter().fold(0usize, |acc, (name, v)| {
                acc.saturating_add(name.len() + v.estimated_size() + SLOT_BYTES)
            }),
        }
    }
}
