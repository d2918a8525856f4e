//! Analysis modules.
//!
//! Aggregation helpers over issue entries and the snapshot comparator.

pub mod aggregator;
pub mod comparator;

pub use aggregator::*;
pub use comparator::{compare, ComparisonResult};
