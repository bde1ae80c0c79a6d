//! Sections - The Init / Bench / Verify Timing Shape
//!
//! A benchmark is three parts: one-time setup, the measured work and a
//! one-time check. [`time_sections`] is the generic timing routine every
//! benchmark reduces to:
//!
//! ```text
//! t0 = now
//! state = init()
//! repeat loops:
//!     repeat unroll:
//!         last = bench(&mut state)
//! t1 = now
//! verify(state, last)
//! return t1 - t0
//! ```
//!
//! The closures are monomorphized into the loop, so there is no call
//! boundary between passes. The value produced by the final bench pass is
//! handed to verify; it is `None` only when the loop never ran.

use std::fmt;
use std::hint::black_box;
use std::sync::Arc;

use crate::measure::Instant;

/// Run `init` once, `bench` `loops * unroll` times and `verify` once.
///
/// Returns the seconds elapsed between the start instant (taken before
/// `init`) and the end instant (taken before `verify`). A panic inside
/// `verify` propagates to the caller after the timed loop has completed.
#[inline(always)]
pub fn time_sections<S, T, I, B, V>(loops: u64, unroll: u64, init: I, mut bench: B, verify: V) -> f64
where
    I: FnOnce() -> S,
    B: FnMut(&mut S) -> T,
    V: FnOnce(S, Option<T>),
{
    let t0 = Instant::now();
    let mut state = init();
    let mut last = None;
    for _ in 0..loops {
        for _ in 0..unroll {
            last = Some(black_box(bench(black_box(&mut state))));
        }
    }
    let elapsed = t0.elapsed_secs();
    verify(state, last);
    elapsed
}

/// The three sections of a benchmark, supplied as closures.
pub struct Sections<I, B, V> {
    init: I,
    bench: B,
    verify: V,
}

impl<I, B, V> Sections<I, B, V> {
    /// Bundle init, bench and verify closures
    ///
    /// ```
    /// use microbench_core::Sections;
    ///
    /// let sections = Sections::new(
    ///     || 1_u64,
    ///     |x| *x + 1,
    ///     |_, y| assert_eq!(y, Some(2)),
    /// );
    /// assert!(sections.time(10, 3) >= 0.0);
    /// ```
    pub fn new<S, T>(init: I, bench: B, verify: V) -> Self
    where
        I: Fn() -> S,
        B: Fn(&mut S) -> T,
        V: Fn(S, Option<T>),
    {
        Self {
            init,
            bench,
            verify,
        }
    }

    /// Time these sections for `loops` passes of `unroll` bench repetitions
    #[inline]
    pub fn time<S, T>(&self, loops: u64, unroll: u64) -> f64
    where
        I: Fn() -> S,
        B: Fn(&mut S) -> T,
        V: Fn(S, Option<T>),
    {
        time_sections(loops, unroll, &self.init, &self.bench, &self.verify)
    }

    /// Erase the closure types into a shareable kernel
    pub fn into_kernel<S, T>(self) -> Kernel
    where
        I: Fn() -> S + Send + Sync + 'static,
        B: Fn(&mut S) -> T + Send + Sync + 'static,
        V: Fn(S, Option<T>) + Send + Sync + 'static,
    {
        Kernel::new(move |loops, unroll| self.time(loops, unroll))
    }
}

/// Type-erased timing routine: `(loops, unroll) -> seconds`
#[derive(Clone)]
pub struct Kernel(Arc<dyn Fn(u64, u64) -> f64 + Send + Sync>);

impl Kernel {
    /// Wrap a timing closure
    pub fn new(f: impl Fn(u64, u64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Wrap a generated timing function
    pub fn from_fn(f: fn(u64, u64) -> f64) -> Self {
        Self(Arc::new(f))
    }

    /// Run the routine
    #[inline]
    pub fn time(&self, loops: u64, unroll: u64) -> f64 {
        (self.0)(loops, unroll)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Kernel(..)")
    }
}
