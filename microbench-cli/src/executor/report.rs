//! Report Building
//!
//! Turns benchmark outcomes into report entries with their statistics.

use microbench_report::{BenchmarkEntry, BenchmarkStatus, FailureInfo, Report, ReportMeta};
use microbench_stats::compute_summary;

use super::execution::BenchmarkOutcome;

/// Report entry for one outcome; statistics cover timed values only
pub fn build_entry(outcome: &BenchmarkOutcome) -> BenchmarkEntry {
    let failure = match &outcome.error {
        Some(e) => Some(FailureInfo {
            kind: e.kind().to_string(),
            message: e.message(),
        }),
        None if outcome.values.is_empty() => Some(FailureInfo {
            kind: "empty".to_string(),
            message: "no timed values were collected".to_string(),
        }),
        None => None,
    };

    let status = if failure.is_none() {
        BenchmarkStatus::Passed
    } else {
        BenchmarkStatus::Failed
    };

    BenchmarkEntry {
        name: outcome.name.clone(),
        display_name: outcome.display_name.clone(),
        iterations: outcome.iterations,
        loops: outcome.loops,
        status,
        summary: (!outcome.values.is_empty()).then(|| compute_summary(&outcome.values)),
        values: outcome.values.clone(),
        warmups: outcome.warmups.clone(),
        failure,
    }
}

/// Complete report for a run
pub fn build_report(outcomes: &[BenchmarkOutcome], meta: ReportMeta, total_duration_ms: f64) -> Report {
    let mut report = Report::new(meta);
    for outcome in outcomes {
        report.push(build_entry(outcome));
    }
    report.summary.total_duration_ms = total_duration_ms;
    report
}
