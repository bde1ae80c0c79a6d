//! Percentile Computation
//!
//! Percentiles over raw values, interpolated between nearest ranks.

use serde::{Deserialize, Serialize};

/// Percentiles reported for every benchmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Compute a single percentile from values
///
/// Uses linear interpolation between nearest ranks. Empty input yields `0.0`.
///
/// ```
/// use microbench_stats::compute_percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_percentile(&values, 50.0), 3.0);
/// assert_eq!(compute_percentile(&values, 100.0), 5.0);
/// ```
pub fn compute_percentile(values: &[f64], percentile: f64) -> f64 {
    match values {
        [] => 0.0,
        [only] => *only,
        _ => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            percentile_of_sorted(&sorted, percentile)
        }
    }
}

pub(crate) fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let p = (percentile / 100.0).clamp(0.0, 1.0);

    let rank = p * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let fraction = rank - lower as f64;

    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Compute all reported percentiles
pub fn compute_percentiles(values: &[f64]) -> Percentiles {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Percentiles {
        p50: percentile_of_sorted(&sorted, 50.0),
        p90: percentile_of_sorted(&sorted, 90.0),
        p99: percentile_of_sorted(&sorted, 99.0),
    }
}
