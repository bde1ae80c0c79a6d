//! Human Output
//!
//! One line per benchmark in the familiar form
//! `name: Mean +- std dev: 12.3 ns +- 0.4 ns`. Failures get a line of their
//! own and a count at the end.

use std::fmt::Write;

use crate::report::{BenchmarkStatus, Report};

const UNITS: [(&str, f64); 4] = [("sec", 1.0), ("ms", 1e-3), ("us", 1e-6), ("ns", 1e-9)];

fn unit_for(seconds: f64) -> (&'static str, f64) {
    let magnitude = seconds.abs();
    UNITS
        .iter()
        .copied()
        .find(|(_, scale)| magnitude >= *scale)
        .unwrap_or(UNITS[UNITS.len() - 1])
}

fn three_digits(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 100.0 {
        format!("{:.0}", value)
    } else if magnitude >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Format a duration in seconds with three significant digits
///
/// ```
/// use microbench_report::format_duration;
///
/// assert_eq!(format_duration(1.234e-8), "12.3 ns");
/// assert_eq!(format_duration(0.25), "250 ms");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let (unit, scale) = unit_for(seconds);
    format!("{} {}", three_digits(seconds / scale), unit)
}

/// `Mean +- std dev` with both values in the unit of the mean
pub fn format_mean_std(mean: f64, std_dev: f64) -> String {
    let (unit, scale) = unit_for(mean);
    format!(
        "Mean +- std dev: {} {} +- {} {}",
        three_digits(mean / scale),
        unit,
        three_digits(std_dev / scale),
        unit
    )
}

/// Format a report for terminal display
pub fn format_human_output(report: &Report) -> String {
    if report.results.is_empty() {
        return "No benchmarks found.\n".to_string();
    }

    let mut output = String::new();
    for entry in &report.results {
        match (&entry.status, &entry.summary) {
            (BenchmarkStatus::Passed, Some(summary)) => {
                let _ = writeln!(
                    output,
                    "{}: {}",
                    entry.display_name,
                    format_mean_std(summary.mean, summary.std_dev)
                );
            }
            _ => {
                let reason = entry
                    .failure
                    .as_ref()
                    .map(|f| format!("{}: {}", f.kind, f.message))
                    .unwrap_or_else(|| "no values".to_string());
                let _ = writeln!(output, "{}: FAILED ({})", entry.display_name, reason);
            }
        }
    }

    if report.summary.failed > 0 {
        let _ = writeln!(
            output,
            "\n{} of {} benchmarks failed",
            report.summary.failed, report.summary.total_benchmarks
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{
        BenchmarkEntry, FailureInfo, ReportMeta, RunnerSettings, SCHEMA_VERSION, SystemInfo,
    };
    use microbench_stats::compute_summary;

    fn report() -> Report {
        Report::new(ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "Unknown".to_string(),
                cpu_cores: 1,
            },
            settings: RunnerSettings {
                processes: 1,
                values: 3,
                warmups: 1,
                loops: 0,
                min_time_secs: 0.1,
                in_process: true,
                pin_cpu: None,
            },
        })
    }

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(1.5), "1.50 sec");
        assert_eq!(format_duration(0.0123), "12.3 ms");
        assert_eq!(format_duration(4.56e-6), "4.56 us");
        assert_eq!(format_duration(123.4e-9), "123 ns");
        assert_eq!(format_duration(0.0), "0.00 ns");
    }

    #[test]
    fn test_mean_std_shares_unit() {
        assert_eq!(
            format_mean_std(12.3e-9, 0.4e-9),
            "Mean +- std dev: 12.3 ns +- 0.40 ns"
        );
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(format_human_output(&report()), "No benchmarks found.\n");
    }

    #[test]
    fn test_passed_and_failed_lines() {
        let mut report = report();
        let values = [2e-6, 2e-6, 2e-6];
        report.push(BenchmarkEntry {
            name: "bench_ok".to_string(),
            display_name: "ok".to_string(),
            iterations: 20,
            loops: 4,
            status: BenchmarkStatus::Passed,
            summary: Some(compute_summary(&values)),
            values: values.to_vec(),
            warmups: Vec::new(),
            failure: None,
        });
        report.push(BenchmarkEntry {
            name: "bench_bad".to_string(),
            display_name: "bench_bad".to_string(),
            iterations: 20,
            loops: 0,
            status: BenchmarkStatus::Failed,
            summary: None,
            values: Vec::new(),
            warmups: Vec::new(),
            failure: Some(FailureInfo {
                kind: "panic".to_string(),
                message: "assertion failed".to_string(),
            }),
        });

        let out = format_human_output(&report);
        assert!(out.contains("ok: Mean +- std dev: 2.00 us +- 0.00 us"));
        assert!(out.contains("bench_bad: FAILED (panic: assertion failed)"));
        assert!(out.contains("1 of 2 benchmarks failed"));
    }
}
