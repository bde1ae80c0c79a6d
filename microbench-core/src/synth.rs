//! Synthesis
//!
//! Binds a benchmark's kernel to its resolved unroll count, producing the
//! one-argument routine `(loops) -> seconds` the measurement layer drives.

use crate::BenchmarkDef;
use crate::sections::Kernel;

/// A timing routine ready to be loaded: kernel plus fixed unroll count.
///
/// Synthesis is deterministic: the same definition and iteration count always
/// produce a unit with the same behaviour, so worker processes can rebuild it
/// independently.
#[derive(Debug, Clone)]
pub struct SynthesizedUnit {
    name: String,
    unroll: u64,
    kernel: Kernel,
}

impl SynthesizedUnit {
    /// Name the unit will be bound under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bench repetitions per loop pass (the inner-loop multiplier)
    pub fn unroll(&self) -> u64 {
        self.unroll
    }

    /// Run `loops` passes and return elapsed seconds
    #[inline]
    pub fn call(&self, loops: u64) -> f64 {
        self.kernel.time(loops, self.unroll)
    }
}

/// Build the timing routine for `def` with `iterations` bench repetitions per pass.
///
/// Zero iterations is accepted: the loop body is skipped while init and
/// verify still run.
pub fn synthesize(def: &BenchmarkDef, iterations: u64) -> SynthesizedUnit {
    tracing::debug!(
        bench = %def.name,
        unroll = iterations,
        "synthesized timing routine"
    );
    SynthesizedUnit {
        name: def.name.clone(),
        unroll: iterations,
        kernel: def.kernel().clone(),
    }
}
