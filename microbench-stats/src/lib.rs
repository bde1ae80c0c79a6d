#![warn(missing_docs)]
//! microbench Statistics
//!
//! Summary statistics over per-call timing values:
//! - Mean, median and sample standard deviation
//! - Min / max
//! - Percentiles by linear interpolation between nearest ranks

mod percentiles;
mod summary;

pub use percentiles::{Percentiles, compute_percentile, compute_percentiles};
pub use summary::{SummaryStatistics, compute_summary};
