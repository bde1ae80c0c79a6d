#![warn(missing_docs)]
//! microbench Report
//!
//! Report model shared by the supervisor and its output formats:
//! - JSON (machine-readable, pretty-printed)
//! - Human (one `Mean +- std dev` line per benchmark)

mod human;
mod json;
mod report;

pub use human::{format_duration, format_human_output, format_mean_std};
pub use json::{generate_json_report, parse_json_report};
pub use report::{
    BenchmarkEntry, BenchmarkStatus, FailureInfo, Report, ReportMeta, ReportSummary,
    RunnerSettings, SCHEMA_VERSION, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// Pretty-printed JSON report
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
