//! Stats module - Aggregation and statistical calculations

pub mod aggregator;
pub mod calculator;
pub mod crosstab;

pub use aggregator::{Aggregate, AggregateError, Aggregator, GroupField};
pub use calculator::CONFIDENCE_LEVEL;
pub use crosstab::{CrossTab, CrossTabulator};
