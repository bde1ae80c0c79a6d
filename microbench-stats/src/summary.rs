//! Summary Statistics
//!
//! One summary per benchmark, computed over every timed value of every
//! worker process. Warmup values never reach this module.

use serde::{Deserialize, Serialize};

use crate::percentiles::{Percentiles, percentile_of_sorted};

/// Summary of per-call timings, all in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation (n - 1); zero below two values
    pub std_dev: f64,
    /// Fastest value
    pub min: f64,
    /// Slowest value
    pub max: f64,
    /// Tail percentiles
    pub percentiles: Percentiles,
    /// Number of values summarized
    pub sample_count: usize,
}

/// Summarize `values`; empty input gives an all-zero summary.
pub fn compute_summary(values: &[f64]) -> SummaryStatistics {
    if values.is_empty() {
        return SummaryStatistics::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    let percentiles = Percentiles {
        p50: percentile_of_sorted(&sorted, 50.0),
        p90: percentile_of_sorted(&sorted, 90.0),
        p99: percentile_of_sorted(&sorted, 99.0),
    };

    SummaryStatistics {
        mean,
        median: percentiles.p50,
        std_dev,
        min: sorted[0],
        max: sorted[n - 1],
        percentiles,
        sample_count: n,
    }
}

impl SummaryStatistics {
    /// Coefficient of variation in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_summary() {
        let summary = compute_summary(&[3.0, 1.0, 5.0, 2.0, 4.0]);

        assert!((summary.mean - 3.0).abs() < 1e-12);
        assert!((summary.median - 3.0).abs() < 1e-12);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.sample_count, 5);
        // sqrt(10 / 4)
        assert!((summary.std_dev - 1.581_138_830_084).abs() < 1e-9);
    }

    #[test]
    fn test_outliers_are_kept() {
        let summary = compute_summary(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        assert!(summary.mean > 15.0);
        assert_eq!(summary.max, 100.0);
        assert!(summary.percentiles.p99 > 90.0);
    }

    #[test]
    fn test_single_value() {
        let summary = compute_summary(&[2.5e-9]);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.min, summary.max);
        assert_eq!(summary.median, 2.5e-9);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let summary = compute_summary(&[100.0; 5]);
        assert!(summary.coefficient_of_variation().abs() < f64::EPSILON);
        assert_eq!(compute_summary(&[]).coefficient_of_variation(), 0.0);
    }

    #[test]
    fn test_empty_values() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.mean, 0.0);
    }
}
