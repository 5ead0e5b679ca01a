//! Aggregation modules.
//!
//! Grouping, statistics and ranking of validated records.

pub mod aggregator;
pub mod statistics;

pub use aggregator::*;
