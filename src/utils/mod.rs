//! Shared utilities: decimal helpers, map flattening and bounded gathering.

pub mod decimal;
pub mod flatten;
pub mod gather;

pub use flatten::{flatten, flatten_value, join_path, KeyPath};
pub use gather::{gather, try_gather, DEFAULT_GATHER_LIMIT};
