//! Report Data Structures

use chrono::{DateTime, Utc};
use microbench_stats::SummaryStatistics;
use serde::{Deserialize, Serialize};

/// Version of the JSON layout below
pub const SCHEMA_VERSION: u32 = 1;

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub results: Vec<BenchmarkEntry>,
    pub summary: ReportSummary,
}

impl Report {
    /// Empty report for a run described by `meta`
    pub fn new(meta: ReportMeta) -> Self {
        Self {
            meta,
            results: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    /// Append an entry and keep the summary counts current
    pub fn push(&mut self, entry: BenchmarkEntry) {
        self.summary.total_benchmarks += 1;
        match entry.status {
            BenchmarkStatus::Passed => self.summary.passed += 1,
            BenchmarkStatus::Failed => self.summary.failed += 1,
        }
        self.results.push(entry);
    }

    /// Look up an entry by benchmark name
    pub fn get(&self, name: &str) -> Option<&BenchmarkEntry> {
        self.results.iter().find(|e| e.name == name)
    }

    /// Whether any benchmark failed
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
    pub settings: RunnerSettings,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
}

/// Measurement settings the run used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Worker processes per benchmark
    pub processes: usize,
    /// Timed values per process
    pub values: usize,
    /// Warmup values per process
    pub warmups: usize,
    /// Fixed outer loop count; `0` means calibrated
    pub loops: u64,
    /// Calibration target per value, in seconds
    pub min_time_secs: f64,
    /// Whether benchmarks ran inside the supervisor process
    pub in_process: bool,
    /// CPU workers were pinned to
    pub pin_cpu: Option<usize>,
}

/// Result for one planned benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    /// Registered name
    pub name: String,
    /// Name used in output
    pub display_name: String,
    /// Inner (unroll) loop count
    pub iterations: u64,
    /// Outer loop count used for every value
    pub loops: u64,
    pub status: BenchmarkStatus,
    /// Per-call statistics over `values`, in seconds
    pub summary: Option<SummaryStatistics>,
    /// Per-call timed values, in seconds
    pub values: Vec<f64>,
    /// Per-call warmup values, in seconds
    pub warmups: Vec<f64>,
    pub failure: Option<FailureInfo>,
}

/// Benchmark execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkStatus {
    Passed,
    Failed,
}

/// Failure information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// `panic`, `worker`, `load`, ...
    pub kind: String,
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_benchmarks: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_duration_ms: f64,
}
