//! Benchmark Execution
//!
//! The measurement steps shared by in-process runs and worker processes:
//! loop calibration, warmup and timed values, panic capture.

use indicatif::{ProgressBar, ProgressStyle};
use microbench_core::{LoadError, LoadedBenchmarks, TimingFn, pin_to_cpu};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use thiserror::Error;

use crate::planner::{ExecutionPlan, PlannedBenchmark};
use crate::supervisor::WorkerError;

/// Upper bound for calibrated outer loops
pub const MAX_LOOPS: u64 = 1 << 32;

/// Measurement settings, resolved from defaults, microbench.toml and flags
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureSettings {
    /// Worker processes (or in-process rounds) per benchmark
    pub processes: usize,
    /// Timed values per process
    pub values: usize,
    /// Warmup values per process
    pub warmups: usize,
    /// Fixed outer loop count; `0` calibrates
    pub loops: u64,
    /// Calibration target per value
    pub min_time: Duration,
    /// CPU to pin the measuring thread to
    pub pin_cpu: Option<usize>,
}

impl Default for MeasureSettings {
    fn default() -> Self {
        Self {
            processes: 20,
            values: 3,
            warmups: 1,
            loops: 0,
            min_time: Duration::from_millis(100),
            pin_cpu: None,
        }
    }
}

impl MeasureSettings {
    /// Half the processes, for a quick look
    pub fn fast(mut self) -> Self {
        self.processes = (self.processes / 2).max(1);
        self
    }

    /// Twice the processes and twice the calibration target
    pub fn rigorous(mut self) -> Self {
        self.processes *= 2;
        self.min_time *= 2;
        self
    }
}

/// Why a benchmark produced no values
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// A section panicked (including failed `verify` assertions)
    #[error("benchmark panicked: {0}")]
    Panicked(String),

    /// Calibration hit [`MAX_LOOPS`] without reaching the time target
    #[error("calibration failed: {loops} loops took only {elapsed:.3e} s")]
    Calibration {
        /// Loop count reached
        loops: u64,
        /// Time the last attempt took
        elapsed: f64,
    },

    /// The timing routine could not be bound
    #[error(transparent)]
    Load(#[from] LoadError),

    /// No timing routine bound under this name
    #[error("benchmark `{0}` was not loaded")]
    NotLoaded(String),

    /// A worker process failed
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl BenchmarkError {
    /// Short failure category used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            BenchmarkError::Panicked(_) => "panic",
            BenchmarkError::Calibration { .. } => "calibration",
            BenchmarkError::Load(_) | BenchmarkError::NotLoaded(_) => "load",
            BenchmarkError::Worker(_) => "worker",
        }
    }

    /// Message without the category prefix
    pub fn message(&self) -> String {
        match self {
            BenchmarkError::Panicked(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Values collected by one process (or in-process round)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessValues {
    /// Outer loop count used for every value
    pub loops: u64,
    /// Per-call warmup values, in seconds
    pub warmups: Vec<f64>,
    /// Per-call timed values, in seconds
    pub values: Vec<f64>,
}

/// Everything measured for one planned benchmark
#[derive(Debug)]
pub struct BenchmarkOutcome {
    /// Registered name
    pub name: String,
    /// Name used in output
    pub display_name: String,
    /// Inner (unroll) loop count
    pub iterations: u64,
    /// Outer loop count (0 if the benchmark failed before calibrating)
    pub loops: u64,
    /// Per-call warmup values of every process, in seconds
    pub warmups: Vec<f64>,
    /// Per-call timed values of every process, in seconds
    pub values: Vec<f64>,
    /// Set when the benchmark failed; values gathered before the failure are kept
    pub error: Option<BenchmarkError>,
}

impl BenchmarkOutcome {
    /// Empty outcome for `planned`
    pub fn new(planned: &PlannedBenchmark) -> Self {
        Self {
            name: planned.name.clone(),
            display_name: planned.display_name.clone(),
            iterations: planned.iterations,
            loops: 0,
            warmups: Vec::new(),
            values: Vec::new(),
            error: None,
        }
    }

    /// Fold in the values of one process
    pub fn absorb(&mut self, process: ProcessValues) {
        self.loops = process.loops;
        self.warmups.extend(process.warmups);
        self.values.extend(process.values);
    }

    /// Whether the benchmark ran to completion
    pub fn passed(&self) -> bool {
        self.error.is_none() && !self.values.is_empty()
    }
}

/// Double the loop count from 1 until one call takes at least `min_time`
pub fn calibrate_loops(timing: &TimingFn, min_time: Duration) -> Result<u64, BenchmarkError> {
    let target = min_time.as_secs_f64();
    let mut loops = 1;
    loop {
        let elapsed = timing(loops);
        if elapsed >= target {
            tracing::debug!(loops, elapsed, "calibrated");
            return Ok(loops);
        }
        if loops >= MAX_LOOPS {
            return Err(BenchmarkError::Calibration { loops, elapsed });
        }
        loops *= 2;
    }
}

/// Per-call seconds; a zero inner count divides by the outer loops only
fn per_call(elapsed: f64, loops: u64, iterations: u64) -> f64 {
    elapsed / (loops.max(1) as f64 * iterations.max(1) as f64)
}

/// One process worth of measurement: calibrate if `loops` is 0, then warmups, then values
pub fn measure_process(
    timing: &TimingFn,
    iterations: u64,
    loops: u64,
    settings: &MeasureSettings,
) -> Result<ProcessValues, BenchmarkError> {
    catch_unwind(AssertUnwindSafe(|| {
        let loops = if loops == 0 {
            calibrate_loops(timing, settings.min_time)?
        } else {
            loops
        };

        let sample = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|_| per_call(timing(loops), loops, iterations))
                .collect()
        };
        let warmups = sample(settings.warmups);
        let values = sample(settings.values);

        Ok(ProcessValues {
            loops,
            warmups,
            values,
        })
    }))
    .unwrap_or_else(|payload| Err(BenchmarkError::Panicked(panic_message(payload.as_ref()))))
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pin the measuring thread if requested; failure only warns.
pub fn apply_cpu_pinning(settings: &MeasureSettings) {
    if let Some(cpu) = settings.pin_cpu {
        match pin_to_cpu(cpu) {
            Ok(()) => tracing::debug!(cpu, "pinned to CPU"),
            Err(e) => tracing::warn!("could not pin to CPU {}: {}", cpu, e),
        }
    }
}

/// Progress bar over the plan; hidden when `visible` is false
pub fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Runs every planned benchmark inside the current process
pub struct Executor {
    settings: MeasureSettings,
    show_progress: bool,
}

impl Executor {
    /// Create an in-process executor
    pub fn new(settings: MeasureSettings, show_progress: bool) -> Self {
        Self {
            settings,
            show_progress,
        }
    }

    /// Execute all planned benchmarks
    pub fn execute(&self, plan: &ExecutionPlan, loaded: &LoadedBenchmarks) -> Vec<BenchmarkOutcome> {
        apply_cpu_pinning(&self.settings);

        let pb = progress_bar(plan.len(), self.show_progress);
        let mut outcomes = Vec::with_capacity(plan.len());
        for planned in &plan.benchmarks {
            pb.set_message(planned.display_name.clone());
            outcomes.push(self.execute_single(planned, loaded));
            pb.inc(1);
        }
        pb.finish_and_clear();
        outcomes
    }

    fn execute_single(&self, planned: &PlannedBenchmark, loaded: &LoadedBenchmarks) -> BenchmarkOutcome {
        let mut outcome = BenchmarkOutcome::new(planned);
        let Some(timing) = loaded.get(&planned.name) else {
            outcome.error = Some(BenchmarkError::NotLoaded(planned.name.clone()));
            return outcome;
        };

        let mut loops = self.settings.loops;
        for round in 0..self.settings.processes {
            match measure_process(&timing, planned.iterations, loops, &self.settings) {
                Ok(values) => {
                    loops = values.loops;
                    outcome.absorb(values);
                }
                Err(e) => {
                    tracing::warn!("{} failed in round {}: {}", planned.name, round + 1, e);
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbench_core::{BenchmarkDef, Sections, synthesize};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn settings() -> MeasureSettings {
        MeasureSettings {
            processes: 2,
            values: 3,
            warmups: 1,
            loops: 4,
            min_time: Duration::from_millis(1),
            pin_cpu: None,
        }
    }

    #[test]
    fn test_fast_and_rigorous() {
        let base = MeasureSettings::default();
        assert_eq!(base.clone().fast().processes, 10);
        let rigorous = base.rigorous();
        assert_eq!(rigorous.processes, 40);
        assert_eq!(rigorous.min_time, Duration::from_millis(200));

        let single = MeasureSettings {
            processes: 1,
            ..MeasureSettings::default()
        };
        assert_eq!(single.fast().processes, 1);
    }

    #[test]
    fn test_calibration_doubles_until_target() {
        // Each loop "takes" one millisecond
        let timing: TimingFn = Arc::new(|loops| loops as f64 * 1e-3);
        assert_eq!(calibrate_loops(&timing, Duration::from_millis(10)).unwrap(), 16);
        assert_eq!(calibrate_loops(&timing, Duration::ZERO).unwrap(), 1);
    }

    #[test]
    fn test_calibration_gives_up() {
        let timing: TimingFn = Arc::new(|_| 0.0);
        let err = calibrate_loops(&timing, Duration::from_millis(1)).err();
        assert!(matches!(err, Some(BenchmarkError::Calibration { loops: MAX_LOOPS, .. })));
    }

    #[test]
    fn test_values_are_per_call() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = calls.clone();
        // elapsed = loops * 2 s regardless of unroll
        let timing: TimingFn = Arc::new(move |loops| {
            seen.fetch_add(1, Ordering::SeqCst);
            loops as f64 * 2.0
        });

        let process = measure_process(&timing, 4, 8, &settings()).unwrap();
        assert_eq!(process.loops, 8);
        assert_eq!(process.warmups, vec![0.5]);
        assert_eq!(process.values, vec![0.5; 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_iterations_divides_by_loops() {
        let timing: TimingFn = Arc::new(|loops| loops as f64);
        let process = measure_process(&timing, 0, 2, &settings()).unwrap();
        assert_eq!(process.values, vec![1.0; 3]);
    }

    #[test]
    fn test_panic_is_captured() {
        let timing: TimingFn = Arc::new(|_| panic!("verify failed: 1 != 2"));
        let err = measure_process(&timing, 1, 1, &settings()).err();
        match err {
            Some(BenchmarkError::Panicked(msg)) => assert!(msg.contains("1 != 2")),
            other => panic!("expected panic, got {:?}", other),
        }
    }

    #[test]
    fn test_executor_collects_every_round() {
        let def = BenchmarkDef::from_sections("bench_sum", Sections::new(|| 3_u64, |x| *x * 2, |_, _| {}));
        let planned = PlannedBenchmark {
            name: def.name.clone(),
            display_name: def.resolved_name().to_string(),
            iterations: 5,
            def: def.clone(),
        };
        let mut loaded = LoadedBenchmarks::new();
        loaded.load(synthesize(&def, 5)).unwrap();
        let plan = ExecutionPlan {
            benchmarks: vec![planned],
        };

        let outcomes = Executor::new(settings(), false).execute(&plan, &loaded);
        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert!(outcome.passed());
        assert_eq!(outcome.loops, 4);
        assert_eq!(outcome.values.len(), 6);
        assert_eq!(outcome.warmups.len(), 2);
    }

    #[test]
    fn test_executor_stops_on_failure() {
        let def = BenchmarkDef::from_sections(
            "bench_bad",
            Sections::new(|| 1_u32, |x| *x + 1, |_, last: Option<u32>| assert_eq!(last, Some(3))),
        );
        let planned = PlannedBenchmark {
            name: def.name.clone(),
            display_name: def.name.clone(),
            iterations: 1,
            def: def.clone(),
        };
        let mut loaded = LoadedBenchmarks::new();
        loaded.load(synthesize(&def, 1)).unwrap();
        let plan = ExecutionPlan {
            benchmarks: vec![planned],
        };

        let outcomes = Executor::new(settings(), false).execute(&plan, &loaded);
        assert!(!outcomes[0].passed());
        assert_eq!(outcomes[0].error.as_ref().map(|e| e.kind()), Some("panic"));
    }
}
