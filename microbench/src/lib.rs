#![warn(missing_docs)]
//! # microbench
//!
//! Micro-benchmark harness for small pieces of code.
//!
//! A benchmark is a function split into three labeled sections:
//! - **`'init`** runs once before the clock starts being meaningful
//! - **`'bench`** is repeated `iterations` times per loop pass, inline
//! - **`'verify`** runs once after the clock stops and may read the bindings
//!   of the last bench pass
//!
//! Benchmarks are measured in fresh worker processes by default, with loop
//! calibration, warmups and a `Mean +- std dev` summary per benchmark.
//!
//! ## Quick Start
//!
//! ```ignore
//! #[microbench::bench]
//! #[microbench::configure(iterations = 3, name = "add one")]
//! fn bench_add_one() {
//!     'init: {
//!         let x = 1;
//!     }
//!     'bench: {
//!         let y = x + 1;
//!     }
//!     'verify: {
//!         assert_eq!(y, 2);
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     microbench::run()
//! }
//! ```
//!
//! ## Without the macro
//!
//! ```
//! use microbench::{BenchmarkDef, MeasureSettings, Namespace, Runner, Sections, configure};
//!
//! let def = BenchmarkDef::from_sections(
//!     "bench_sum",
//!     Sections::new(
//!         || vec![1_u64, 2, 3],
//!         |v| v.iter().sum::<u64>(),
//!         |_, last| assert_eq!(last, Some(6)),
//!     ),
//! );
//! let def = configure().iterations(5).apply(def).unwrap();
//!
//! let settings = MeasureSettings { processes: 1, values: 2, loops: 8, ..Default::default() };
//! let mut runner = Runner::in_process(settings);
//! let outcomes = runner
//!     .run_namespace(&Namespace::new().with(def), "bench_", None)
//!     .unwrap();
//! assert!(outcomes[0].passed());
//! ```

// Re-export core types
pub use microbench_core::{
    BenchmarkDef, ConfigError, Configure, DEFAULT_ITERATIONS, DEFAULT_PREFIX, Kernel, LoadError,
    LoadedBenchmarks, Namespace, Sections, SourceLocation, SynthesizedUnit, TimingFn, configure,
    load, synthesize, time_sections,
};

// Re-export macros
pub use microbench_macros::{bench, configure};

// Re-export stats
pub use microbench_stats::{SummaryStatistics, compute_summary};

// Re-export report
pub use microbench_report::{
    BenchmarkEntry, BenchmarkStatus, OutputFormat, Report, format_human_output, generate_json_report,
};

// Re-export runner
pub use microbench_cli::{
    BenchmarkError, BenchmarkOutcome, Cli, MeasureSettings, RunError, RunMode, Runner,
    WorkerError, run_namespace, run_namespace_with_cli, run_with_cli,
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
    pub use microbench_core::{Instant, StaticBenchmark};
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{BenchmarkDef, Configure, Namespace, Runner, Sections, bench, configure};
}

/// Run every `#[bench]` function of this binary with the process arguments.
///
/// Call this from your benchmark binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     microbench::run()
/// }
/// ```
pub use microbench_cli::run;
