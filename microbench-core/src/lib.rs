#![warn(missing_docs)]
//! microbench Core - Definitions and Timing Runtime
//!
//! This crate provides the pieces every benchmark passes through:
//! - `BenchmarkDef` and the static `StaticBenchmark` registrations emitted by `#[bench]`
//! - `Sections` and `time_sections`: the init / bench / verify timing shape
//! - `synthesize` + `LoadedBenchmarks`: binding a definition to an unroll count
//!   and making it callable by name
//! - `Configure`: iteration count and display name overrides
//! - `Namespace`: the ordered set of definitions the runner discovers from

mod configure;
mod loader;
mod measure;
mod namespace;
mod sections;
mod synth;

pub use configure::{ConfigError, Configure, configure};
pub use loader::{LoadError, LoadedBenchmarks, TimingFn, load};
pub use measure::{Instant, pin_to_cpu};
pub use namespace::Namespace;
pub use sections::{Kernel, Sections, time_sections};
pub use synth::{SynthesizedUnit, synthesize};

/// Number of times the bench section is repeated per loop pass when a
/// benchmark does not configure its own count.
pub const DEFAULT_ITERATIONS: u64 = 20;

/// Name prefix used for discovery when the caller does not supply one.
pub const DEFAULT_PREFIX: &str = "bench_";

/// Benchmark registered at compile time via `#[bench]`
#[derive(Debug, Clone, Copy)]
pub struct StaticBenchmark {
    /// Function name (discovery key)
    pub name: &'static str,
    /// Display name attached with `#[configure(name = ...)]`
    pub display_name: Option<&'static str>,
    /// Unroll count attached with `#[configure(iterations = ...)]`
    pub iterations: Option<u64>,
    /// Generated timing routine: `(loops, unroll) -> seconds`
    pub timed_fn: fn(u64, u64) -> f64,
    /// Source file path
    pub file: &'static str,
    /// Source line number
    pub line: u32,
    /// Module path
    pub module_path: &'static str,
}

inventory::collect!(StaticBenchmark);

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || for _ in inventory::iter::<StaticBenchmark> {};

/// Where a benchmark was defined
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Source file path
    pub file: String,
    /// Source line number
    pub line: u32,
    /// Module path
    pub module_path: String,
}

/// A named benchmark: its timing kernel plus the metadata the runner resolves.
#[derive(Debug, Clone)]
pub struct BenchmarkDef {
    /// Unique name within a namespace
    pub name: String,
    /// Unroll count override (falls back to [`DEFAULT_ITERATIONS`])
    pub iterations: Option<u64>,
    /// Reporting name override (falls back to `name`)
    pub display_name: Option<String>,
    /// Definition site, when registered by the attribute macro
    pub location: Option<SourceLocation>,
    kernel: Kernel,
}

impl BenchmarkDef {
    /// Create a definition around an existing kernel
    pub fn new(name: impl Into<String>, kernel: Kernel) -> Self {
        Self {
            name: name.into(),
            iterations: None,
            display_name: None,
            location: None,
            kernel,
        }
    }

    /// Create a definition from three section closures
    pub fn from_sections<S, T, I, B, V>(name: impl Into<String>, sections: Sections<I, B, V>) -> Self
    where
        I: Fn() -> S + Send + Sync + 'static,
        B: Fn(&mut S) -> T + Send + Sync + 'static,
        V: Fn(S, Option<T>) + Send + Sync + 'static,
    {
        Self::new(name, sections.into_kernel())
    }

    /// The timing kernel
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Iteration count the runner will use
    pub fn resolved_iterations(&self) -> u64 {
        self.iterations.unwrap_or(DEFAULT_ITERATIONS)
    }

    /// Name the runner reports under
    pub fn resolved_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Run the definition once as an ordinary benchmark: init, one bench pass, verify.
    pub fn invoke(&self) -> f64 {
        self.kernel.time(1, 1)
    }
}

impl From<&StaticBenchmark> for BenchmarkDef {
    fn from(bench: &StaticBenchmark) -> Self {
        Self {
            name: bench.name.to_string(),
            iterations: bench.iterations,
            display_name: bench.display_name.map(str::to_string),
            location: Some(SourceLocation {
                file: bench.file.to_string(),
                line: bench.line,
                module_path: bench.module_path.to_string(),
            }),
            kernel: Kernel::from_fn(bench.timed_fn),
        }
    }
}
