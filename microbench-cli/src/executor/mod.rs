//! Benchmark Executor
//!
//! In-process measurement and report assembly.
//!
//! ## Module Organization
//!
//! - `execution`: settings, calibration, per-process values, in-process executor
//! - `metadata`: system information for report metadata
//! - `report`: outcome to report conversion

mod execution;
mod metadata;
mod report;

pub use execution::{
    BenchmarkError, BenchmarkOutcome, Executor, MAX_LOOPS, MeasureSettings, ProcessValues,
    apply_cpu_pinning, calibrate_loops, measure_process, progress_bar,
};
pub use metadata::build_report_meta;
pub use report::build_report;
