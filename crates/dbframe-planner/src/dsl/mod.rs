//! Declarative query documents.

pub mod yaml;
