//! Configuration types
//!
//! Engine tuning knobs, stored as postcard binary data when persisted.

pub mod types;

pub use types::*;
