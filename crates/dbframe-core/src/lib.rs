#![forbid(unsafe_code)]
//! dbframe-core: values, schema handles, the error taxonomy and configuration
//! shared by every other dbframe crate.
//!
//! No I/O lives here. The IO crate maps driver errors into
//! [`Error::QueryExecution`] and everything else builds on these types.

pub mod config;
pub mod error;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
